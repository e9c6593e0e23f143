//! Name classification — person, organization, site name, address, garbage.
//!
//! Classification is an ordered list of named, pure predicate rules; the
//! first rule that applies tags the candidate. The rules never see the
//! store, only the candidate and these fixed vocabularies.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use clowder_core::candidate::Candidate;

/// What the owner-name text denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameCategory {
  Person,
  Organization,
  SiteName,
  Address,
  Garbage,
}

/// The classifier's verdict for one candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
  pub category:             NameCategory,
  pub should_create_person: bool,
  /// Names exactly which condition decided the outcome, for audit display.
  pub reason:               String,
}

// ─── Vocabularies ────────────────────────────────────────────────────────────

/// Tokens that mark a name as an organization rather than a person.
const ORG_KEYWORDS: [&str; 16] = [
  "rescue",
  "shelter",
  "society",
  "humane",
  "spca",
  "clinic",
  "veterinary",
  "vet ",
  "hospital",
  "animal control",
  "animal services",
  "foundation",
  "sanctuary",
  "adoption",
  " inc",
  " llc",
];

/// Tokens that mark a known feeding site or colony location label.
const SITE_KEYWORDS: [&str; 10] = [
  "colony",
  "park",
  "apartments",
  "apartment complex",
  "trailer",
  "mobile home",
  "campus",
  "barn",
  "marina",
  "depot",
];

static STREET_RE: Lazy<Regex> = Lazy::new(|| {
  Regex::new(
    r"(?i)^\s*\d+\s+.+\b(st|street|ave|avenue|rd|road|blvd|dr|drive|ln|lane|ct|court|way|pl|hwy)\b\.?",
  )
  .unwrap()
});

static LETTER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z]").unwrap());

/// Junk placeholders sources put in mandatory name cells.
const GARBAGE_TOKENS: [&str; 6] =
  ["unknown", "n/a", "na", "none", "?", "no name"];

// ─── Rules ───────────────────────────────────────────────────────────────────

/// One named predicate rule. Pure; independently testable.
pub struct NameRule {
  pub name:     &'static str,
  pub category: NameCategory,
  pub applies:  fn(&str) -> bool,
}

fn is_garbage(name: &str) -> bool {
  let lowered = name.trim().to_lowercase();
  lowered.len() < 2
    || !LETTER_RE.is_match(&lowered)
    || GARBAGE_TOKENS.contains(&lowered.as_str())
}

fn is_organization(name: &str) -> bool {
  let lowered = name.to_lowercase();
  ORG_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

fn is_address(name: &str) -> bool { STREET_RE.is_match(name) }

fn is_site_name(name: &str) -> bool {
  let lowered = name.to_lowercase();
  SITE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// The ordered rule set. Garbage first (junk text can contain any keyword),
/// then organization, then structural address, then site names. Anything
/// that survives is a person.
pub const NAME_RULES: [NameRule; 4] = [
  NameRule {
    name:     "garbage_text",
    category: NameCategory::Garbage,
    applies:  is_garbage,
  },
  NameRule {
    name:     "organization_keyword",
    category: NameCategory::Organization,
    applies:  is_organization,
  },
  NameRule {
    name:     "structural_address",
    category: NameCategory::Address,
    applies:  is_address,
  },
  NameRule {
    name:     "site_keyword",
    category: NameCategory::SiteName,
    applies:  is_site_name,
  },
];

/// Classify bare name text. Returns the category and the winning rule name.
pub fn classify_name(name: &str) -> (NameCategory, &'static str) {
  for rule in &NAME_RULES {
    if (rule.applies)(name) {
      return (rule.category, rule.name);
    }
  }
  (NameCategory::Person, "default_person")
}

// ─── Candidate classification ────────────────────────────────────────────────

/// Classify a candidate and decide whether it deserves its own Person
/// entity. `should_create_person` is false whenever the record has no
/// durable identifier (nothing to dedupe on later) or the name text is not
/// a person's.
pub fn classify(candidate: &Candidate) -> Classification {
  // An org-pattern or address-pattern row classifies from that signal even
  // when the free-text cell parsed clean.
  let name_text = candidate
    .raw_name
    .as_deref()
    .or(candidate.org_name.as_deref())
    .or(candidate.address_raw.as_deref())
    .unwrap_or("");

  let (mut category, mut rule_name) = classify_name(name_text);

  // Pattern-level signals outrank text heuristics: an org-with-phone row is
  // an organization even if its name contains no org keyword, and a bare
  // address row is an address.
  if candidate.org_name.is_some() && category == NameCategory::Person {
    category = NameCategory::Organization;
    rule_name = "org_pattern_signal";
  }
  if candidate.raw_name.is_none()
    && candidate.org_name.is_none()
    && candidate.address_raw.is_some()
    && category == NameCategory::Person
  {
    category = NameCategory::Address;
    rule_name = "address_pattern_signal";
  }

  if category != NameCategory::Person {
    let noun = match category {
      NameCategory::Organization => "organization",
      NameCategory::SiteName => "site name",
      NameCategory::Address => "address",
      _ => "garbage",
    };
    return Classification {
      category,
      should_create_person: false,
      reason: format!("name classifies as {noun} (rule: {rule_name})"),
    };
  }

  if !candidate.has_contact_signal() {
    return Classification {
      category,
      should_create_person: false,
      reason: "no email or phone identifier on record".into(),
    };
  }

  Classification {
    category,
    should_create_person: true,
    reason: "person with durable contact identifier".into(),
  }
}

#[cfg(test)]
mod tests {
  use clowder_core::candidate::Candidate;

  use super::*;

  fn person_candidate(name: &str, phone: Option<&str>) -> Candidate {
    Candidate {
      raw_name:   Some(name.to_string()),
      first_name: Some(name.split(' ').next().unwrap_or(name).to_string()),
      phone_norm: phone.map(str::to_string),
      ..Default::default()
    }
  }

  // ── Individual rules ──────────────────────────────────────────────────────

  #[test]
  fn organization_keywords_classify() {
    assert_eq!(
      classify_name("Valley Oak Cat Rescue").0,
      NameCategory::Organization
    );
    assert_eq!(
      classify_name("Westside Veterinary Clinic").0,
      NameCategory::Organization
    );
  }

  #[test]
  fn street_addresses_classify() {
    assert_eq!(classify_name("417 Sycamore St").0, NameCategory::Address);
    assert_eq!(
      classify_name("1200 E Olive Avenue").0,
      NameCategory::Address
    );
  }

  #[test]
  fn site_names_classify() {
    assert_eq!(
      classify_name("Riverside Park colony").0,
      NameCategory::SiteName
    );
  }

  #[test]
  fn garbage_classifies_first() {
    assert_eq!(classify_name("").0, NameCategory::Garbage);
    assert_eq!(classify_name("n/a").0, NameCategory::Garbage);
    assert_eq!(classify_name("12345").0, NameCategory::Garbage);
  }

  #[test]
  fn ordinary_names_are_people() {
    let (cat, rule) = classify_name("Maria Alvarez");
    assert_eq!(cat, NameCategory::Person);
    assert_eq!(rule, "default_person");
  }

  // ── Candidate-level outcomes ──────────────────────────────────────────────

  #[test]
  fn person_with_phone_creates_person() {
    let verdict = classify(&person_candidate("Maria Alvarez", Some("5551234567")));
    assert_eq!(verdict.category, NameCategory::Person);
    assert!(verdict.should_create_person);
  }

  #[test]
  fn person_without_identifiers_is_held_back() {
    let verdict = classify(&person_candidate("Maria Alvarez", None));
    assert_eq!(verdict.category, NameCategory::Person);
    assert!(!verdict.should_create_person);
    assert!(verdict.reason.contains("no email or phone"));
  }

  #[test]
  fn organization_never_creates_person_even_with_phone() {
    let mut candidate = person_candidate("Valley Oak Cat Rescue", Some("5551234567"));
    candidate.org_name = Some("Valley Oak Cat Rescue".into());
    let verdict = classify(&candidate);
    assert_eq!(verdict.category, NameCategory::Organization);
    assert!(!verdict.should_create_person);
    assert!(verdict.reason.contains("organization"));
  }

  #[test]
  fn bare_address_candidate_is_an_address() {
    let candidate = Candidate {
      address_raw: Some("417 Sycamore St".into()),
      coat_color: Some("orange".into()),
      ..Default::default()
    };
    let verdict = classify(&candidate);
    assert_eq!(verdict.category, NameCategory::Address);
    assert!(!verdict.should_create_person);
  }
}
