//! Master-list name parsing — the free-text "client name" pattern cascade.
//!
//! A single name cell encodes several mutually exclusive shapes. Each shape
//! is a pure function returning `Option<NameHit>`; [`parse_master_name`]
//! tries them in a fixed priority order and stops at the first match.
//! Swapping the order changes which signal (foster vs. organization vs.
//! address) a row is attributed to, so the order is part of the contract.
//!
//! When a shape matched, fields it did not address (phone, quoted cat name,
//! trapper alias) are back-filled from the fallback extractors only if still
//! empty; the attributed owner/foster/org fields are never touched again.

use once_cell::sync::Lazy;
use regex::Regex;

use clowder_core::candidate::normalize_phone;

/// Partial result of one name-pattern match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameHit {
  pub owner_name:    Option<String>,
  pub cat_name:      Option<String>,
  pub foster_parent: Option<String>,
  pub org_name:      Option<String>,
  pub address:       Option<String>,
  pub coat_color:    Option<String>,
  pub phone:         Option<String>,
  pub alt_contact:   Option<String>,
  pub trapper_alias: Option<String>,
  pub shelter_code:  Option<String>,
  pub shelter_id:    Option<String>,
  pub is_foster:         bool,
  pub is_shelter_intake: bool,
}

// ─── Vocabularies ────────────────────────────────────────────────────────────

/// Shelter code tokens seen in intake rows (`SCAS A439019`).
const SHELTER_CODES: [&str; 5] = ["SCAS", "ACC", "HSSV", "SPCA", "SBACS"];

/// Coat colors accepted by the address+color shape.
const COAT_COLORS: [&str; 12] = [
  "black", "white", "orange", "gray", "grey", "tabby", "calico", "tortie",
  "tuxedo", "brown", "tan", "siamese",
];

// ─── Compiled patterns ───────────────────────────────────────────────────────

static FOSTER_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^\s*Foster\s+'([^']+)'\s*\(([^)]+)\)").unwrap()
});

static SHELTER_RE: Lazy<Regex> = Lazy::new(|| {
  let codes = SHELTER_CODES.join("|");
  Regex::new(&format!(r"\b({codes})\s*#?\s*([A-Za-z]?\d{{5,}})\b")).unwrap()
});

static ORG_PHONE_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"^\s*([^']+?)\s*'([^']+)'\s*-\s*call\s*([\d().\- ]{10,})\s*$")
    .unwrap()
});

static ADDRESS_COLOR_RE: Lazy<Regex> = Lazy::new(|| {
  let colors = COAT_COLORS.join("|");
  Regex::new(&format!(
    r"(?i)^\s*(\d+\s+\S[^-]*?)\s+({colors})\b[^-]*-"
  ))
  .unwrap()
});

static ALT_CONTACT_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"^\s*(.+?)\s*-\s*call\s+([A-Za-z][A-Za-z .'-]*?)\s+([\d().\- ]{10,})\s*$",
  )
  .unwrap()
});

static QUOTED_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"'([^']+)'").unwrap());

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}").unwrap()
});

static TRAPPER_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"-\s*Trp\.?\s+([A-Za-z][A-Za-z .'-]*)").unwrap()
});

static PAREN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

static HOUSE_NUMBER_RE: Lazy<Regex> =
  Lazy::new(|| Regex::new(r"^\s*\d+\s+\S").unwrap());

// ─── Pattern 1: foster ───────────────────────────────────────────────────────

/// `Foster 'Mittens' (Alvarez)` — cat in foster care; the parenthetical is
/// the foster parent's name.
pub fn match_foster(name: &str) -> Option<NameHit> {
  let caps = FOSTER_RE.captures(name)?;
  Some(NameHit {
    cat_name:      Some(caps[1].trim().to_string()),
    foster_parent: Some(caps[2].trim().to_string()),
    is_foster:     true,
    ..Default::default()
  })
}

// ─── Pattern 2: shelter intake ───────────────────────────────────────────────

/// `SCAS A439019 'Pepper'` — a known shelter code followed by a 5+-digit
/// intake id. Cat name comes from any quoted substring.
pub fn match_shelter_intake(name: &str) -> Option<NameHit> {
  let caps = SHELTER_RE.captures(name)?;
  let cat_name = QUOTED_RE
    .captures(name)
    .map(|q| q[1].trim().to_string());
  Some(NameHit {
    shelter_code:      Some(caps[1].to_string()),
    shelter_id:        Some(caps[2].to_string()),
    cat_name,
    is_shelter_intake: true,
    ..Default::default()
  })
}

// ─── Pattern 3: organization + phone ─────────────────────────────────────────

/// `Paws Rescue 'Smokey' - call 5551234567`. The org segment must not start
/// with a digit — that shape is an address, not an organization.
pub fn match_org_phone(name: &str) -> Option<NameHit> {
  let caps = ORG_PHONE_RE.captures(name)?;
  let org = caps[1].trim().to_string();
  if org.starts_with(|c: char| c.is_ascii_digit()) {
    return None;
  }
  let phone = normalize_phone(&caps[3])?;
  Some(NameHit {
    org_name: Some(org),
    cat_name: Some(caps[2].trim().to_string()),
    phone:    Some(phone),
    ..Default::default()
  })
}

// ─── Pattern 4: address + coat color ─────────────────────────────────────────

/// `417 Sycamore St orange -` — a bare location sighting; the color word
/// must come from the fixed coat vocabulary.
pub fn match_address_color(name: &str) -> Option<NameHit> {
  let caps = ADDRESS_COLOR_RE.captures(name)?;
  Some(NameHit {
    address:    Some(caps[1].trim().to_string()),
    coat_color: Some(caps[2].to_lowercase()),
    ..Default::default()
  })
}

// ─── Pattern 5: alternate contact ────────────────────────────────────────────

/// `Dana Reyes - call Marco 5559876543` — the record's person plus a
/// different person to actually call. Rejected when the name segment itself
/// looks like a foster/shelter/address row, which prevents double-matching.
pub fn match_alt_contact(name: &str) -> Option<NameHit> {
  let caps = ALT_CONTACT_RE.captures(name)?;
  let owner = caps[1].trim().to_string();
  if match_foster(&owner).is_some()
    || match_shelter_intake(&owner).is_some()
    || HOUSE_NUMBER_RE.is_match(&owner)
  {
    return None;
  }
  let phone = normalize_phone(&caps[3])?;
  Some(NameHit {
    owner_name:  Some(owner),
    alt_contact: Some(caps[2].trim().to_string()),
    phone:       Some(phone),
    ..Default::default()
  })
}

// ─── Pattern 6: fallback ─────────────────────────────────────────────────────

/// First phone-shaped run in the text, normalized.
pub fn fallback_phone(name: &str) -> Option<String> {
  PHONE_RE
    .find(name)
    .and_then(|m| normalize_phone(m.as_str()))
}

/// First quoted substring — by master-list convention, the cat's name.
pub fn fallback_cat_name(name: &str) -> Option<String> {
  QUOTED_RE.captures(name).map(|c| c[1].trim().to_string())
}

/// `- Trp <name>` trapper alias suffix.
pub fn fallback_trapper(name: &str) -> Option<String> {
  TRAPPER_RE
    .captures(name)
    .map(|c| c[1].trim().to_string())
}

/// The owner name is whatever remains after stripping the trapper suffix,
/// quoted segments, parenthetical asides, and any phone run.
pub fn fallback_owner_name(name: &str) -> Option<String> {
  let stripped = TRAPPER_RE.replace(name, "");
  let stripped = QUOTED_RE.replace_all(&stripped, "");
  // Phone before parens: "(559) 123-4567" must go as one unit.
  let stripped = PHONE_RE.replace_all(&stripped, "");
  let stripped = PAREN_RE.replace_all(&stripped, "");
  let owner = stripped
    .trim()
    .trim_matches(|c: char| c == '-' || c == ',' || c.is_whitespace())
    .to_string();
  if owner.is_empty() { None } else { Some(owner) }
}

fn match_fallback(name: &str) -> NameHit {
  NameHit {
    owner_name:    fallback_owner_name(name),
    cat_name:      fallback_cat_name(name),
    phone:         fallback_phone(name),
    trapper_alias: fallback_trapper(name),
    ..Default::default()
  }
}

// ─── Cascade ─────────────────────────────────────────────────────────────────

/// Parse a free-text master-list name cell.
///
/// Priority order is fixed: foster, shelter intake, organization+phone,
/// address+color, alternate contact, fallback. First match wins and its
/// attributed fields are final; the fallback extractors then back-fill
/// phone / cat name / trapper alias only where still empty.
pub fn parse_master_name(name: &str) -> NameHit {
  let shape_matchers: [fn(&str) -> Option<NameHit>; 5] = [
    match_foster,
    match_shelter_intake,
    match_org_phone,
    match_address_color,
    match_alt_contact,
  ];

  let mut hit = shape_matchers
    .iter()
    .find_map(|m| m(name))
    .unwrap_or_else(|| match_fallback(name));

  if hit.phone.is_none() {
    hit.phone = fallback_phone(name);
  }
  if hit.cat_name.is_none() {
    hit.cat_name = fallback_cat_name(name);
  }
  if hit.trapper_alias.is_none() {
    hit.trapper_alias = fallback_trapper(name);
  }
  hit
}

#[cfg(test)]
mod tests {
  use super::*;

  // ── Individual shapes ─────────────────────────────────────────────────────

  #[test]
  fn foster_shape() {
    let hit = match_foster("Foster 'Mittens' (Alvarez)").unwrap();
    assert_eq!(hit.cat_name.as_deref(), Some("Mittens"));
    assert_eq!(hit.foster_parent.as_deref(), Some("Alvarez"));
    assert!(hit.is_foster);
  }

  #[test]
  fn shelter_intake_shape() {
    let hit = match_shelter_intake("SCAS A439019 'Pepper'").unwrap();
    assert_eq!(hit.shelter_code.as_deref(), Some("SCAS"));
    assert_eq!(hit.shelter_id.as_deref(), Some("A439019"));
    assert_eq!(hit.cat_name.as_deref(), Some("Pepper"));
    assert!(hit.is_shelter_intake);
  }

  #[test]
  fn shelter_id_must_be_five_digits() {
    assert!(match_shelter_intake("SCAS 1234").is_none());
  }

  #[test]
  fn org_phone_shape() {
    let hit =
      match_org_phone("Paws Rescue 'Smokey' - call 555-123-4567").unwrap();
    assert_eq!(hit.org_name.as_deref(), Some("Paws Rescue"));
    assert_eq!(hit.cat_name.as_deref(), Some("Smokey"));
    assert_eq!(hit.phone.as_deref(), Some("5551234567"));
  }

  #[test]
  fn org_starting_with_digit_is_rejected() {
    // Looks like an address; must not be read as an organization.
    assert!(match_org_phone("417 Sycamore 'Smokey' - call 5551234567").is_none());
  }

  #[test]
  fn address_color_shape() {
    let hit = match_address_color("417 Sycamore St orange - friendly").unwrap();
    assert_eq!(hit.address.as_deref(), Some("417 Sycamore St"));
    assert_eq!(hit.coat_color.as_deref(), Some("orange"));
  }

  #[test]
  fn address_without_color_word_is_rejected() {
    assert!(match_address_color("417 Sycamore St fluffy -").is_none());
  }

  #[test]
  fn alt_contact_shape() {
    let hit =
      match_alt_contact("Dana Reyes - call Marco 555 987 6543").unwrap();
    assert_eq!(hit.owner_name.as_deref(), Some("Dana Reyes"));
    assert_eq!(hit.alt_contact.as_deref(), Some("Marco"));
    assert_eq!(hit.phone.as_deref(), Some("5559876543"));
  }

  #[test]
  fn alt_contact_rejects_address_shaped_names() {
    assert!(
      match_alt_contact("417 Sycamore St - call Marco 5559876543").is_none()
    );
  }

  // ── Cascade priority ──────────────────────────────────────────────────────

  #[test]
  fn foster_wins_over_everything() {
    let hit = parse_master_name("Foster 'Mittens' (Alvarez)");
    assert!(hit.is_foster);
    assert_eq!(hit.cat_name.as_deref(), Some("Mittens"));
    assert_eq!(hit.foster_parent.as_deref(), Some("Alvarez"));
    // Must not fall through to org/address/fallback attribution.
    assert!(hit.org_name.is_none());
    assert!(hit.address.is_none());
    assert!(hit.owner_name.is_none());
  }

  #[test]
  fn shelter_wins_over_fallback_owner_extraction() {
    let hit = parse_master_name("SCAS 439019");
    assert!(hit.is_shelter_intake);
    assert!(hit.owner_name.is_none());
  }

  #[test]
  fn fallback_collects_independent_signals() {
    let hit = parse_master_name("Rosa Ortiz 'Biscuit' (559) 123-4567 - Trp Lee");
    assert_eq!(hit.owner_name.as_deref(), Some("Rosa Ortiz"));
    assert_eq!(hit.cat_name.as_deref(), Some("Biscuit"));
    assert_eq!(hit.phone.as_deref(), Some("5591234567"));
    assert_eq!(hit.trapper_alias.as_deref(), Some("Lee"));
  }

  #[test]
  fn fallback_backfills_phone_after_foster_match() {
    let hit = parse_master_name("Foster 'Mittens' (Alvarez) 555-123-4567");
    assert!(hit.is_foster);
    assert_eq!(hit.phone.as_deref(), Some("5551234567"));
    // Attribution fields from the winning shape stay untouched.
    assert!(hit.owner_name.is_none());
  }

  #[test]
  fn plain_name_survives_unchanged() {
    let hit = parse_master_name("Jane Doe");
    assert_eq!(hit.owner_name.as_deref(), Some("Jane Doe"));
    assert!(hit.cat_name.is_none());
    assert!(hit.phone.is_none());
  }
}
