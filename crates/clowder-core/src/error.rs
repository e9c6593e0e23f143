//! Error taxonomy for `clowder-core`.
//!
//! Extraction failures are deliberately absent: extraction is total and
//! degrades unparseable fields to `None`. An unclassifiable candidate is a
//! legitimate `garbage` outcome, not an error.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  #[error("decision not found: {0}")]
  DecisionNotFound(Uuid),

  #[error("decision {decision_id} already resolved by {by} at {at}")]
  AlreadyResolved {
    decision_id: Uuid,
    by:          String,
    at:          DateTime<Utc>,
  },

  #[error("merging {loser} into {winner} would create a cycle")]
  MergeCycleDetected { winner: Uuid, loser: Uuid },

  #[error("invalid matching configuration: {0}")]
  ConfigurationInvalid(String),

  #[error("concurrent write conflict: {0}")]
  PersistenceConflict(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
