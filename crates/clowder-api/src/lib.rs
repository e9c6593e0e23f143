//! JSON REST API for the Clowder engine.
//!
//! Exposes an axum [`Router`] backed by any
//! [`clowder_core::store::EntityStore`]. This is the decision/review
//! boundary of the engine: ingestion, the decision queue, resolution, batch
//! triggers, and entity reads. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", clowder_api::api_router(store.clone()))
//! ```

pub mod batches;
pub mod decisions;
pub mod entities;
pub mod error;
pub mod records;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use clowder_core::store::EntityStore;

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: EntityStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    // Ingestion
    .route("/records", post(records::ingest::<S>))
    // Decision queue & review
    .route("/decisions", get(decisions::list::<S>))
    .route("/decisions/{id}", get(decisions::get_one::<S>))
    .route("/decisions/{id}/resolve", post(decisions::resolve_one::<S>))
    // Batch trigger
    .route("/batches", post(batches::run::<S>))
    // Entity reads (always through the merge chain)
    .route("/entities/{id}", get(entities::get_one::<S>))
    .route("/entities/{id}/audit", get(entities::audit::<S>))
    .with_state(store)
}
