//! Household memberships — inferred person↔place groupings.
//!
//! Memberships are recomputed from decisions, not hand-authored; manual
//! review actions may add rows too, flagged by `source` so later inference
//! passes never overwrite them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A member's role within the household at a place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HouseholdRole {
  Resident,
  Owner,
  FosterParent,
  Trapper,
  Caretaker,
}

/// How the membership row came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipSource {
  Inferred,
  Manual,
}

/// One person's membership at one place. Unique on `(person_id, place_id)`;
/// re-linking the same pair upserts role/confidence but a `Manual` row is
/// never downgraded back to `Inferred`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseholdMember {
  pub person_id:  Uuid,
  pub place_id:   Uuid,
  pub role:       HouseholdRole,
  /// In `[0, 1]`.
  pub confidence: f64,
  pub source:     MembershipSource,
}
