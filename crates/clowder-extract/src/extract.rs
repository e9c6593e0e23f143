//! Raw-record extraction — payload map → [`Candidate`].
//!
//! Pipeline:
//!   RawRecord payload
//!     └─ structured field aliases   → direct candidate fields
//!          └─ parse_master_name()   → back-fill from the free-text cell
//!               └─ normalization    → email_norm / phone_norm
//!
//! Total: a payload with zero usable signal still yields a candidate so the
//! classifier can mark it garbage.

use std::collections::BTreeMap;

use clowder_core::{
  candidate::{Candidate, RoleHint, normalize_email, normalize_phone},
  record::RawRecord,
};

use crate::patterns::parse_master_name;

// ─── Field aliases ───────────────────────────────────────────────────────────

// Sources disagree on header names; each field accepts a small alias set,
// checked in order.
const NAME_KEYS: [&str; 5] =
  ["client_name", "name", "owner_name", "full_name", "contact_name"];
const FIRST_KEYS: [&str; 3] = ["first_name", "fname", "first"];
const LAST_KEYS: [&str; 3] = ["last_name", "lname", "last"];
const EMAIL_KEYS: [&str; 3] = ["email", "email_address", "e_mail"];
const PHONE_KEYS: [&str; 5] =
  ["phone", "phone_number", "telephone", "cell", "mobile"];
const ADDRESS_KEYS: [&str; 4] =
  ["address", "street_address", "addr", "location"];
const CAT_KEYS: [&str; 4] =
  ["cat_name", "animal_name", "pet_name", "patient_name"];
const ROLE_KEYS: [&str; 2] = ["role", "contact_role"];

fn field<'a>(
  payload: &'a BTreeMap<String, String>,
  keys: &[&str],
) -> Option<&'a str> {
  keys
    .iter()
    .find_map(|k| payload.get(*k))
    .map(String::as_str)
    .filter(|v| !v.trim().is_empty())
}

fn role_hint_from_text(text: &str) -> Option<RoleHint> {
  let lowered = text.trim().to_lowercase();
  match lowered.as_str() {
    "owner" | "adopter" | "client" => Some(RoleHint::Owner),
    "trapper" => Some(RoleHint::Trapper),
    "foster" | "foster parent" => Some(RoleHint::FosterParent),
    "alt" | "alternate" | "alt contact" => Some(RoleHint::AltContact),
    _ => None,
  }
}

/// Split a display name into (first, last). `"Last, First"` order is
/// honored when a comma is present.
fn split_name(full: &str) -> (Option<String>, Option<String>) {
  let full = full.trim();
  if let Some((last, first)) = full.split_once(',') {
    return (
      Some(first.trim().to_string()).filter(|s| !s.is_empty()),
      Some(last.trim().to_string()).filter(|s| !s.is_empty()),
    );
  }
  match full.rsplit_once(' ') {
    Some((first, last)) => {
      (Some(first.trim().to_string()), Some(last.trim().to_string()))
    }
    None if full.is_empty() => (None, None),
    None => (Some(full.to_string()), None),
  }
}

// ─── Extraction ──────────────────────────────────────────────────────────────

/// Extract a structured candidate from one raw record. Never fails;
/// unparseable fields stay `None`.
pub fn extract(record: &RawRecord) -> Candidate {
  let payload = &record.payload;
  let mut candidate = Candidate {
    source_system: Some(record.source_system),
    ..Default::default()
  };

  // Structured columns win over anything parsed out of free text.
  candidate.first_name =
    field(payload, &FIRST_KEYS).map(|s| s.trim().to_string());
  candidate.last_name =
    field(payload, &LAST_KEYS).map(|s| s.trim().to_string());
  candidate.email_raw = field(payload, &EMAIL_KEYS).map(str::to_string);
  candidate.phone_raw = field(payload, &PHONE_KEYS).map(str::to_string);
  candidate.address_raw =
    field(payload, &ADDRESS_KEYS).map(|s| s.trim().to_string());
  candidate.cat_name = field(payload, &CAT_KEYS).map(|s| s.trim().to_string());
  candidate.role_hint =
    field(payload, &ROLE_KEYS).and_then(role_hint_from_text);

  // The free-text name cell, run through the master-list cascade.
  if let Some(name_text) = field(payload, &NAME_KEYS) {
    let hit = parse_master_name(name_text);

    if let Some(owner) = hit.owner_name {
      candidate.raw_name = Some(owner.clone());
      if candidate.first_name.is_none() && candidate.last_name.is_none() {
        let (first, last) = split_name(&owner);
        candidate.first_name = first;
        candidate.last_name = last;
      }
    }
    if hit.is_foster {
      // The foster parent is the person behind a foster row.
      if let Some(parent) = hit.foster_parent.clone() {
        candidate.raw_name = Some(parent.clone());
        if candidate.first_name.is_none() && candidate.last_name.is_none() {
          let (first, last) = split_name(&parent);
          candidate.first_name = first;
          candidate.last_name = last;
        }
      }
      candidate.foster_parent = hit.foster_parent;
      candidate.is_foster = true;
      candidate.role_hint = candidate.role_hint.or(Some(RoleHint::FosterParent));
    }
    if hit.is_shelter_intake {
      candidate.shelter_code = hit.shelter_code;
      candidate.shelter_id = hit.shelter_id;
      candidate.is_shelter_intake = true;
    }
    if candidate.cat_name.is_none() {
      candidate.cat_name = hit.cat_name;
    }
    if candidate.phone_raw.is_none() {
      candidate.phone_raw = hit.phone;
    }
    if candidate.address_raw.is_none() {
      candidate.address_raw = hit.address;
    }
    candidate.org_name = hit.org_name;
    candidate.coat_color = hit.coat_color;
    candidate.alt_contact = hit.alt_contact;
    if hit.trapper_alias.is_some() {
      candidate.trapper_alias = hit.trapper_alias;
      candidate.role_hint = candidate.role_hint.or(Some(RoleHint::Trapper));
    }
  }

  // Normalization last, over whichever raw values survived.
  candidate.email_norm =
    candidate.email_raw.as_deref().and_then(normalize_email);
  candidate.phone_norm =
    candidate.phone_raw.as_deref().and_then(normalize_phone);

  candidate
}
