//! Candidate — the structured, normalized view of one raw record.
//!
//! Candidates are derived and ephemeral; they are never persisted as their
//! own rows. All normalization here is idempotent: feeding a normalized
//! value back through yields the same value.

use serde::{Deserialize, Serialize};

use crate::record::SourceSystem;

/// What role the source text suggests this person plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleHint {
  Owner,
  Trapper,
  FosterParent,
  AltContact,
}

/// Structured attributes extracted from one raw record.
///
/// Every field is optional; a record with zero usable signal still yields a
/// candidate so the classifier can mark it garbage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Candidate {
  pub source_system: Option<SourceSystem>,

  // ── Person signals ──────────────────────────────────────────────────────
  pub first_name: Option<String>,
  pub last_name:  Option<String>,
  /// The owner-name text as extracted, before any person/org classification.
  pub raw_name:   Option<String>,
  pub email_raw:  Option<String>,
  pub email_norm: Option<String>,
  pub phone_raw:  Option<String>,
  pub phone_norm: Option<String>,
  pub role_hint:  Option<RoleHint>,
  /// "call <name>" alternate-contact person, when the source row names one.
  pub alt_contact:   Option<String>,
  /// `- Trp <name>` trapper alias fragment.
  pub trapper_alias: Option<String>,

  // ── Cat signals ─────────────────────────────────────────────────────────
  pub cat_name:      Option<String>,
  pub coat_color:    Option<String>,
  pub foster_parent: Option<String>,
  pub shelter_code:  Option<String>,
  pub shelter_id:    Option<String>,

  // ── Place / org signals ─────────────────────────────────────────────────
  pub address_raw: Option<String>,
  pub org_name:    Option<String>,

  // ── Pattern flags ───────────────────────────────────────────────────────
  pub is_foster:         bool,
  pub is_shelter_intake: bool,
}

impl Candidate {
  /// True when the candidate carries at least one durable identifier worth
  /// deduplicating on later.
  pub fn has_contact_signal(&self) -> bool {
    self.email_norm.is_some() || self.phone_norm.is_some()
  }

  /// Best available human label for entity display.
  pub fn display_name(&self) -> Option<String> {
    match (&self.first_name, &self.last_name) {
      (Some(f), Some(l)) => Some(format!("{f} {l}")),
      (Some(f), None) => Some(f.clone()),
      (None, Some(l)) => Some(l.clone()),
      (None, None) => self.raw_name.clone().or_else(|| self.org_name.clone()),
    }
  }

  /// Stable key over the candidate's identifier signals. Used to suppress
  /// re-proposing a human-reviewed (candidate, entity) pair: a changed
  /// identifier produces a different key, which counts as new information.
  pub fn signal_key(&self) -> String {
    format!(
      "{}|{}",
      self.email_norm.as_deref().unwrap_or(""),
      self.phone_norm.as_deref().unwrap_or("")
    )
  }
}

// ─── Normalization ───────────────────────────────────────────────────────────

/// Lower-case and trim an email address. Returns `None` for strings without
/// an `@`, so junk never becomes a blocking key.
pub fn normalize_email(raw: &str) -> Option<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() || !trimmed.contains('@') {
    return None;
  }
  Some(trimmed.to_lowercase())
}

/// Reduce a phone number to bare digits; strip the leading country `1` when
/// eleven digits long. Returns `None` unless exactly ten digits remain.
pub fn normalize_phone(raw: &str) -> Option<String> {
  let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
  let digits = match digits.len() {
    11 if digits.starts_with('1') => digits[1..].to_string(),
    _ => digits,
  };
  if digits.len() == 10 { Some(digits) } else { None }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn email_normalization_is_idempotent() {
    let once = normalize_email(" J.Doe@Example.COM ").unwrap();
    let twice = normalize_email(&once).unwrap();
    assert_eq!(once, "j.doe@example.com");
    assert_eq!(once, twice);
  }

  #[test]
  fn email_without_at_is_rejected() {
    assert_eq!(normalize_email("not-an-email"), None);
    assert_eq!(normalize_email("   "), None);
  }

  #[test]
  fn phone_normalization_is_idempotent() {
    let once = normalize_phone("(555) 123-4567").unwrap();
    let twice = normalize_phone(&once).unwrap();
    assert_eq!(once, "5551234567");
    assert_eq!(once, twice);
  }

  #[test]
  fn phone_leading_country_one_is_stripped() {
    assert_eq!(normalize_phone("1-555-123-4567").unwrap(), "5551234567");
    assert_eq!(normalize_phone("+1 555 123 4567").unwrap(), "5551234567");
  }

  #[test]
  fn phone_wrong_length_is_rejected() {
    assert_eq!(normalize_phone("12345"), None);
    // Eleven digits not starting with 1 is not a NANP number.
    assert_eq!(normalize_phone("25551234567"), None);
  }

  #[test]
  fn signal_key_distinguishes_missing_fields() {
    let with_email = Candidate {
      email_norm: Some("a@b.com".into()),
      ..Default::default()
    };
    let with_phone = Candidate {
      phone_norm: Some("5551234567".into()),
      ..Default::default()
    };
    assert_ne!(with_email.signal_key(), with_phone.signal_key());
  }
}
