//! Canonical entities — the de-duplicated source of truth.
//!
//! An entity holds only identity metadata. Contact identifiers live in the
//! `identifiers` table; everything else (raw payloads, decisions, audit)
//! references entities by id. A merged-away entity is never deleted: it
//! becomes a tombstone whose `merged_into` points at its replacement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of real-world thing a canonical entity represents.
///
/// `PseudoProfile` is the catch-all account created for records that are
/// rejected as people (organizations, bare addresses, garbage names) but must
/// stay traceable to their raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
  Person,
  Cat,
  Place,
  PseudoProfile,
}

/// A canonical entity. All meaningful contact information lives in its
/// identifiers; `display_name` is the best-known human label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub entity_id:    Uuid,
  pub kind:         EntityKind,
  pub display_name: String,
  pub created_at:   DateTime<Utc>,
  /// When set, this entity is a tombstone. The merge graph is a forest and
  /// every chain is collapsed to a single hop on merge, so following this
  /// pointer once always lands on a terminal entity.
  pub merged_into:  Option<Uuid>,
}

impl Entity {
  pub fn is_tombstone(&self) -> bool { self.merged_into.is_some() }
}
