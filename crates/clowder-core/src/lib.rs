//! Core types and trait definitions for the Clowder identity-resolution
//! engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod audit;
pub mod candidate;
pub mod config;
pub mod decision;
pub mod entity;
pub mod error;
pub mod household;
pub mod identifier;
pub mod record;
pub mod store;

pub use error::{Error, Result};
