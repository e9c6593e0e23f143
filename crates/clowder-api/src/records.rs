//! Handler for `POST /records` — the ingestion boundary.
//!
//! The engine does not care how the payload was obtained (file upload,
//! webhook, scheduled pull); collaborators post the raw key/value map and
//! the staged record is picked up by the next batch.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use clowder_core::{
  record::{NewRawRecord, RawRecord},
  store::EntityStore,
};
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
  /// False when an identical payload (same content hash) was already staged.
  pub ingested: bool,
  pub record:   Option<RawRecord>,
}

/// `POST /records` — body: a [`NewRawRecord`].
///
/// Returns 201 with the staged record, or 200 with `ingested: false` for a
/// duplicate. Duplicates are acknowledged, never re-staged.
pub async fn ingest<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewRawRecord>,
) -> Result<impl IntoResponse, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let stored = store
    .ingest_raw(body)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let status = if stored.is_some() {
    StatusCode::CREATED
  } else {
    StatusCode::OK
  };
  Ok((
    status,
    Json(IngestResponse { ingested: stored.is_some(), record: stored }),
  ))
}
