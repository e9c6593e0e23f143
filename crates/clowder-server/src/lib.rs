//! HTTP server assembly for Clowder.
//!
//! Builds the axum application around [`clowder_api::api_router`] and holds
//! the runtime configuration type. The binary in `main.rs` owns process
//! concerns (CLI, config loading, tracing init).

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use clowder_core::store::EntityStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` with
/// `CLOWDER_`-prefixed environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Maximum records pulled per batch invocation.
  #[serde(default = "default_batch_limit")]
  pub batch_limit: usize,
}

fn default_batch_limit() -> usize { 200 }

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the application router: the engine API under `/api`, with request
/// tracing.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: EntityStore + Clone + Send + Sync + 'static,
  S::Error: std::error::Error + Send + Sync + 'static,
{
  Router::new()
    .nest("/api", clowder_api::api_router(store))
    .layer(TraceLayer::new_for_http())
}
