//! Extraction and classification for Clowder.
//!
//! Converts one raw source record into a structured
//! [`clowder_core::candidate::Candidate`] and classifies its name text.
//! Pure and synchronous; no HTTP or database dependencies. Extraction is
//! total — unparseable fields degrade to `None`, they never fail a record.
//!
//! # Quick start
//!
//! ```no_run
//! use clowder_extract::{classify, extract};
//!
//! # fn run(record: &clowder_core::record::RawRecord) {
//! let candidate = extract(record);
//! let verdict = classify(&candidate);
//! println!("{:?}: create person = {}", verdict.category, verdict.should_create_person);
//! # }
//! ```

pub mod classify;
mod extract;
pub mod patterns;

pub use classify::{Classification, NameCategory, classify};
pub use extract::extract;
