//! Handler for `POST /batches` — the batch trigger.
//!
//! Synchronous: runs the batch to completion and returns the aggregate
//! counters. Safe to call repeatedly and from concurrent triggers.

use std::sync::Arc;

use axum::{Json, extract::State};
use clowder_core::{record::SourceSystem, store::EntityStore};
use clowder_engine::{BatchOutcome, process_batch};
use serde::Deserialize;

use crate::error::ApiError;

/// Upper bound applied when the caller does not pass a limit.
const DEFAULT_BATCH_LIMIT: usize = 200;

#[derive(Debug, Deserialize, Default)]
pub struct BatchBody {
  pub source_system: Option<SourceSystem>,
  pub limit:         Option<usize>,
}

/// `POST /batches` — body: `{"source_system":"master_list","limit":200}`
/// (both fields optional).
pub async fn run<S>(
  State(store): State<Arc<S>>,
  body: Option<Json<BatchBody>>,
) -> Result<Json<BatchOutcome>, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let Json(body) = body.unwrap_or_default();
  let limit = body.limit.unwrap_or(DEFAULT_BATCH_LIMIT);

  let outcome = process_batch(&*store, body.source_system, limit).await?;
  Ok(Json(outcome))
}
