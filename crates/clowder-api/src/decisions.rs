//! Handlers for `/decisions` endpoints — the decision queue and the sole
//! human mutation path.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/decisions` | `?status=pending\|reviewed&limit=&offset=` |
//! | `GET`  | `/decisions/:id` | 404 if not found |
//! | `POST` | `/decisions/:id/resolve` | Body: `{"action":"merge","actor":"casey"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use clowder_core::{
  decision::{DecisionStatus, MatchDecision, ReviewAction},
  record::SourceSystem,
  store::{DecisionQuery, EntityStore},
};
use clowder_engine as engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
  pub status:        Option<DecisionStatus>,
  pub source_system: Option<SourceSystem>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

/// `GET /decisions[?status=pending|reviewed][&source_system=...][&limit=...][&offset=...]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<MatchDecision>>, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let query = DecisionQuery {
    status:        params.status,
    source_system: params.source_system,
    limit:         params.limit,
    offset:        params.offset,
  };
  let decisions = store
    .list_decisions(&query)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(decisions))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /decisions/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<MatchDecision>, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let decision = store
    .get_decision(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("decision {id} not found")))?;
  Ok(Json(decision))
}

// ─── Resolve ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolveBody {
  pub action: ReviewAction,
  pub actor:  String,
  pub notes:  Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
  pub decision:  MatchDecision,
  /// The canonical entity the action landed on, when one exists.
  pub entity_id: Option<Uuid>,
}

/// `POST /decisions/:id/resolve`
///
/// Fails 409 with the resolver and timestamp when the decision was already
/// resolved, so the reviewer can re-navigate to current state.
pub async fn resolve_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<ResolveBody>,
) -> Result<Json<ResolveResponse>, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let result =
    engine::resolve(&*store, id, body.action, &body.actor, body.notes).await?;
  Ok(Json(ResolveResponse {
    decision:  result.decision,
    entity_id: result.entity_id,
  }))
}
