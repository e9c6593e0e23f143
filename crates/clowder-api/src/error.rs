//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! The review workflow's failure taxonomy is preserved in the HTTP mapping:
//! a reviewer who double-submits sees *who* resolved the decision and
//! *when*, not a generic failure.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use clowder_engine::EngineError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// Already-resolved decisions, merge cycles, lost write races.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error("invalid configuration: {0}")]
  Unprocessable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<EngineError> for ApiError {
  fn from(err: EngineError) -> Self {
    use clowder_core::Error as Core;
    match err {
      EngineError::Core(core) => match core {
        Core::EntityNotFound(_) | Core::DecisionNotFound(_) => {
          ApiError::NotFound(core.to_string())
        }
        Core::AlreadyResolved { .. }
        | Core::MergeCycleDetected { .. }
        | Core::PersistenceConflict(_) => ApiError::Conflict(core.to_string()),
        Core::ConfigurationInvalid(_) => {
          ApiError::Unprocessable(core.to_string())
        }
        Core::Serialization(_) => ApiError::Store(Box::new(core)),
      },
      EngineError::InvalidAction(msg) => ApiError::BadRequest(msg),
      EngineError::Store(inner) => ApiError::Store(inner),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unprocessable(m) => {
        (StatusCode::UNPROCESSABLE_ENTITY, m.clone())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
