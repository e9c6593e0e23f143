//! Handlers for `/entities` endpoints.
//!
//! Every read resolves through the merge chain: asking for a tombstone
//! returns its terminal entity, so collaborators never render stale
//! identities. The response notes when a redirect happened.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use clowder_core::{
  audit::AuditEntry, entity::Entity, identifier::Identifier,
  store::EntityStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct EntityView {
  pub entity:      Entity,
  pub identifiers: Vec<Identifier>,
  /// Set when the requested id was a tombstone and reads were redirected.
  pub resolved_from: Option<Uuid>,
}

/// `GET /entities/:id` — the terminal entity with its identifiers.
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<EntityView>, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  let entity = store
    .resolve_terminal(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;

  let identifiers = store
    .identifiers_for(entity.entity_id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;

  let resolved_from = (entity.entity_id != id).then_some(id);
  Ok(Json(EntityView { entity, identifiers, resolved_from }))
}

/// `GET /entities/:id/audit` — the append-only history for one entity.
///
/// Audit rows are looked up under the id as given, tombstone or not: a merge
/// never rewrites the loser's history.
pub async fn audit<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<AuditEntry>>, ApiError>
where
  S: EntityStore,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  // 404 only when the entity never existed at all.
  store
    .get_entity(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?
    .ok_or_else(|| ApiError::NotFound(format!("entity {id} not found")))?;

  let entries = store
    .audit_for_entity(id)
    .await
    .map_err(|e| ApiError::Store(Box::new(e)))?;
  Ok(Json(entries))
}
