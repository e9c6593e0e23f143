//! Raw source records — the append-only ingestion boundary.
//!
//! A raw record is an opaque key/value payload plus provenance. Records are
//! never updated or deleted; a re-submitted payload with the same content
//! hash is silently ignored at ingestion time.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// The external system a record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSystem {
  ClinicExport,
  ShelterFeed,
  VolunteerRoster,
  MasterList,
  IntakeForm,
  ChipRegistry,
}

/// An ingested source record. Immutable once stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
  pub record_id:        Uuid,
  pub source_system:    SourceSystem,
  /// The row/record id in the originating system, verbatim.
  pub source_record_id: String,
  /// Opaque field map. A `BTreeMap` so iteration (and hashing) is
  /// deterministic regardless of how the payload was assembled.
  pub payload:          BTreeMap<String, String>,
  /// SHA-256 over source system, source record id, and the sorted payload.
  pub content_hash:     String,
  pub received_at:      DateTime<Utc>,
}

/// Input to [`crate::store::EntityStore::ingest_raw`].
/// `record_id`, `content_hash`, and `received_at` are assigned by the store.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRawRecord {
  pub source_system:    SourceSystem,
  pub source_record_id: String,
  pub payload:          BTreeMap<String, String>,
}

impl NewRawRecord {
  /// Deterministic content hash: same source + same payload → same hash.
  ///
  /// Stable across payload insertion order thanks to `BTreeMap` iteration
  /// order.
  pub fn content_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_system_tag(self.source_system).as_bytes());
    hasher.update([0u8]);
    hasher.update(self.source_record_id.as_bytes());
    for (key, value) in &self.payload {
      hasher.update([0u8]);
      hasher.update(key.as_bytes());
      hasher.update([b'=']);
      hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
  }
}

/// The snake_case tag for a source system; matches the serde representation.
pub fn source_system_tag(s: SourceSystem) -> &'static str {
  match s {
    SourceSystem::ClinicExport => "clinic_export",
    SourceSystem::ShelterFeed => "shelter_feed",
    SourceSystem::VolunteerRoster => "volunteer_roster",
    SourceSystem::MasterList => "master_list",
    SourceSystem::IntakeForm => "intake_form",
    SourceSystem::ChipRegistry => "chip_registry",
  }
}
