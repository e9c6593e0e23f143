//! The append-only audit log.
//!
//! Every structural mutation — entity creation, merge, identifier
//! attachment, household linkage, review resolution — writes a row here.
//! This is the one piece of history that is never rewritten, even by a
//! later merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::EntityKind;

/// What kind of edit an audit row records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditType {
  Created,
  Merged,
  IdentifierAttached,
  HouseholdLinked,
  ReviewResolved,
}

/// One audit row. Append-only; no update path exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub audit_id:    Uuid,
  pub entity_kind: EntityKind,
  pub entity_id:   Uuid,
  pub edit_type:   EditType,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  /// Reviewer username for human actions, `"engine"` for automatic ones.
  pub actor:       String,
  pub source:      Option<String>,
  pub recorded_at: DateTime<Utc>,
}

/// Input to [`crate::store::EntityStore::append_audit`].
/// `audit_id` and `recorded_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAuditEntry {
  pub entity_kind: EntityKind,
  pub entity_id:   Uuid,
  pub edit_type:   EditType,
  pub old_value:   Option<String>,
  pub new_value:   Option<String>,
  pub actor:       String,
  pub source:      Option<String>,
}
