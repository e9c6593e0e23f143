//! Durable contact identifiers attached to canonical entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::record::SourceSystem;

/// The kind of identifier. Only identifiers with real-world uniqueness
/// participate — names and addresses are scoring signals, not identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
  Email,
  Phone,
}

/// One contact identifier. Uniqueness is enforced on
/// `(entity_id, id_type, value_norm)`; re-attaching the same normalized value
/// keeps the highest confidence seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identifier {
  pub entity_id:     Uuid,
  pub id_type:       IdType,
  pub value_raw:     String,
  pub value_norm:    String,
  /// In `[0, 1]`.
  pub confidence:    f64,
  pub source_system: SourceSystem,
}
