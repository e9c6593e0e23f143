//! SQLite backend for the Clowder entity store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! pool without blocking the async runtime. Every write that could
//! double-apply under concurrent batch triggers goes through `INSERT OR
//! IGNORE` / `ON CONFLICT` semantics, so correctness never depends on
//! cross-record locking.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
