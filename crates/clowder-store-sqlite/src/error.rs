//! Error type for `clowder-store-sqlite`.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] clowder_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  /// A stored tag or timestamp failed to decode back into a domain value.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("entity not found: {0}")]
  EntityNotFound(Uuid),

  #[error("entity {0} is already merged")]
  AlreadyMerged(Uuid),

  /// Corrupt merge chain: the forest invariant was violated on disk.
  #[error("merge chain loop detected at {0}")]
  MergeLoop(Uuid),

  #[error("decision not found: {0}")]
  DecisionNotFound(Uuid),

  #[error("decision {decision_id} already resolved by {by} at {at}")]
  AlreadyResolved {
    decision_id: Uuid,
    by:          String,
    at:          DateTime<Utc>,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
