//! Engine error type.
//!
//! Domain failures (`AlreadyResolved`, `MergeCycleDetected`, …) surface as
//! [`clowder_core::Error`]; backend failures are boxed so the engine stays
//! generic over the store implementation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error(transparent)]
  Core(#[from] clowder_core::Error),

  #[error("invalid review action: {0}")]
  InvalidAction(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl EngineError {
  /// Box an arbitrary store error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    EngineError::Store(Box::new(err))
  }
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
