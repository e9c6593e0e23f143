//! The `EntityStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `clowder-store-sqlite`). The engine and API layers depend on this
//! abstraction, not on any concrete backend.
//!
//! Correctness under concurrent batch triggers comes from the write
//! semantics required here — content-hash dedup at ingestion, at-most-one
//! decision per record, conflict-keeping upserts for identifiers and
//! household rows — not from any cross-record locking.

use std::future::Future;

use uuid::Uuid;

use crate::{
  audit::{AuditEntry, NewAuditEntry},
  config::MatchConfig,
  decision::{
    DecisionStatus, MatchDecision, NewMatchDecision, ReviewAction,
  },
  entity::{Entity, EntityKind},
  household::HouseholdMember,
  identifier::{IdType, Identifier},
  record::{NewRawRecord, RawRecord, SourceSystem},
};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`EntityStore::list_decisions`].
#[derive(Debug, Clone, Default)]
pub struct DecisionQuery {
  pub status:        Option<DecisionStatus>,
  pub source_system: Option<SourceSystem>,
  pub limit:         Option<usize>,
  pub offset:        Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Clowder persistence backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait EntityStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Raw records ───────────────────────────────────────────────────────

  /// Persist a raw record. Returns `None` when a record with the same
  /// content hash already exists (the duplicate is ignored, not an error).
  fn ingest_raw(
    &self,
    input: NewRawRecord,
  ) -> impl Future<Output = Result<Option<RawRecord>, Self::Error>> + Send + '_;

  /// Raw records with no match decision yet, oldest first, up to `limit`.
  fn fetch_unprocessed(
    &self,
    source: Option<SourceSystem>,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<RawRecord>, Self::Error>> + Send + '_;

  // ── Entities ──────────────────────────────────────────────────────────

  /// Create and persist a new canonical entity.
  fn add_entity(
    &self,
    kind: EntityKind,
    display_name: String,
  ) -> impl Future<Output = Result<Entity, Self::Error>> + Send + '_;

  /// Retrieve an entity by id, tombstone or not. `None` if unknown.
  fn get_entity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// Follow `merged_into` from `id` to the terminal entity. `None` if `id`
  /// is unknown. Chains are collapsed to one hop on merge, but this helper
  /// loops regardless so reads stay correct mid-merge.
  fn resolve_terminal(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + '_;

  /// Exact display-name lookup among terminal entities of `kind`. Used to
  /// dedupe cats and places, which carry no email/phone identifiers.
  fn find_by_display_name<'a>(
    &'a self,
    kind: EntityKind,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Entity>, Self::Error>> + Send + 'a;

  /// Point `loser` at `winner`. The caller (engine) is responsible for the
  /// cycle check and for re-pointing existing chains beforehand.
  fn set_merged_into(
    &self,
    loser: Uuid,
    winner: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Re-point every entity whose `merged_into` is `old_target` at
  /// `new_target`; returns how many rows moved. Keeps every chain at one
  /// hop.
  fn repoint_merged(
    &self,
    old_target: Uuid,
    new_target: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Identifiers ───────────────────────────────────────────────────────

  /// Upsert an identifier. On `(entity_id, id_type, value_norm)` conflict
  /// the row keeps the highest confidence seen. Returns `true` when a new
  /// row was inserted.
  fn attach_identifier(
    &self,
    ident: Identifier,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn identifiers_for(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Identifier>, Self::Error>> + Send + '_;

  /// Entity ids holding this normalized identifier value. Indexed; this is
  /// the blocking query and must stay cheap.
  fn find_entities_by_identifier<'a>(
    &'a self,
    id_type: IdType,
    value_norm: &'a str,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + 'a;

  // ── Decisions ─────────────────────────────────────────────────────────

  /// Persist a decision. At most one decision exists per raw record; if one
  /// already does (a concurrent batch won the race), the existing row is
  /// returned unchanged and `input` is discarded.
  fn record_decision(
    &self,
    input: NewMatchDecision,
  ) -> impl Future<Output = Result<MatchDecision, Self::Error>> + Send + '_;

  fn get_decision(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MatchDecision>, Self::Error>> + Send + '_;

  fn list_decisions<'a>(
    &'a self,
    query: &'a DecisionQuery,
  ) -> impl Future<Output = Result<Vec<MatchDecision>, Self::Error>> + Send + 'a;

  /// Set the review fields, exactly once. Errs when the decision does not
  /// exist or was already reviewed (the check and write are atomic).
  fn mark_reviewed(
    &self,
    decision_id: Uuid,
    action: ReviewAction,
    actor: String,
    notes: Option<String>,
  ) -> impl Future<Output = Result<MatchDecision, Self::Error>> + Send + '_;

  // ── Pair suppression ──────────────────────────────────────────────────

  /// Record that a reviewer kept `signal_key` separate from `entity_id`.
  /// Idempotent.
  fn suppress_pair<'a>(
    &'a self,
    signal_key: &'a str,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn is_pair_suppressed<'a>(
    &'a self,
    signal_key: &'a str,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  // ── Households ────────────────────────────────────────────────────────

  /// Upsert a membership row. A `Manual` row is never overwritten by an
  /// `Inferred` one.
  fn upsert_household_member(
    &self,
    member: HouseholdMember,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn household_for_person(
    &self,
    person_id: Uuid,
  ) -> impl Future<Output = Result<Vec<HouseholdMember>, Self::Error>> + Send + '_;

  // ── Audit ─────────────────────────────────────────────────────────────

  fn append_audit(
    &self,
    input: NewAuditEntry,
  ) -> impl Future<Output = Result<AuditEntry, Self::Error>> + Send + '_;

  fn audit_for_entity(
    &self,
    entity_id: Uuid,
  ) -> impl Future<Output = Result<Vec<AuditEntry>, Self::Error>> + Send + '_;

  // ── Matching configuration ────────────────────────────────────────────

  /// Validate and persist a full configuration snapshot. Invalid
  /// configurations are rejected before any row is touched.
  fn save_match_config<'a>(
    &'a self,
    config: &'a MatchConfig,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Load the current snapshot; falls back to [`MatchConfig::default`]
  /// when nothing has been seeded yet.
  fn load_match_config(
    &self,
  ) -> impl Future<Output = Result<MatchConfig, Self::Error>> + Send + '_;
}
