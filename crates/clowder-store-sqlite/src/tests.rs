//! Integration tests for `SqliteStore` against an in-memory database,
//! including full engine flows (batch processing, review resolution, entity
//! merging) driven through the real store.

use std::collections::BTreeMap;

use clowder_core::{
  config::{FsParameter, MatchConfig, MatchField, ThresholdConfig},
  decision::{DecisionStatus, DecisionType, ReviewAction},
  entity::EntityKind,
  household::{HouseholdMember, HouseholdRole, MembershipSource},
  identifier::{IdType, Identifier},
  record::{NewRawRecord, SourceSystem},
  store::{DecisionQuery, EntityStore},
};
use clowder_engine::{EngineError, merge_entities, process_batch, resolve};
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn record(
  source: SourceSystem,
  source_record_id: &str,
  pairs: &[(&str, &str)],
) -> NewRawRecord {
  NewRawRecord {
    source_system:    source,
    source_record_id: source_record_id.into(),
    payload:          pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect::<BTreeMap<_, _>>(),
  }
}

/// A config where only email is compared, calibrated so an email agreement
/// contributes exactly 12.0 (m/u = 4096 → log2 = 12).
fn email_only_config(upper: f64, lower: f64) -> MatchConfig {
  MatchConfig {
    thresholds: vec![ThresholdConfig {
      source_system:   None,
      upper_threshold: upper,
      lower_threshold: lower,
    }],
    parameters: vec![FsParameter {
      field:         MatchField::Email,
      m_probability: 0.8192,
      u_probability: 0.0002,
    }],
    name_similarity_floor: 0.88,
  }
}

fn email_identifier(entity_id: Uuid, norm: &str) -> Identifier {
  Identifier {
    entity_id,
    id_type: IdType::Email,
    value_raw: norm.to_string(),
    value_norm: norm.to_string(),
    confidence: 1.0,
    source_system: SourceSystem::MasterList,
  }
}

// ─── Raw records ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn ingest_and_fetch_unprocessed() {
  let s = store().await;

  let stored = s
    .ingest_raw(record(
      SourceSystem::IntakeForm,
      "r-1",
      &[("name", "Jane Doe"), ("email", "jane@example.com")],
    ))
    .await
    .unwrap();
  assert!(stored.is_some());

  let staged = s.fetch_unprocessed(None, 100).await.unwrap();
  assert_eq!(staged.len(), 1);
  assert_eq!(staged[0].source_record_id, "r-1");
}

#[tokio::test]
async fn duplicate_content_hash_is_ignored() {
  let s = store().await;
  let input =
    record(SourceSystem::IntakeForm, "r-1", &[("name", "Jane Doe")]);

  assert!(s.ingest_raw(input.clone()).await.unwrap().is_some());
  assert!(s.ingest_raw(input).await.unwrap().is_none());

  let staged = s.fetch_unprocessed(None, 100).await.unwrap();
  assert_eq!(staged.len(), 1);
}

#[tokio::test]
async fn fetch_unprocessed_honors_source_and_limit() {
  let s = store().await;
  for i in 0..5 {
    s.ingest_raw(record(
      SourceSystem::IntakeForm,
      &format!("intake-{i}"),
      &[("name", &format!("Person {i}"))],
    ))
    .await
    .unwrap();
  }
  s.ingest_raw(record(
    SourceSystem::ShelterFeed,
    "shelter-1",
    &[("name", "Shelter Person")],
  ))
  .await
  .unwrap();

  let intake = s
    .fetch_unprocessed(Some(SourceSystem::IntakeForm), 3)
    .await
    .unwrap();
  assert_eq!(intake.len(), 3);
  assert!(
    intake
      .iter()
      .all(|r| r.source_system == SourceSystem::IntakeForm)
  );

  let all = s.fetch_unprocessed(None, 100).await.unwrap();
  assert_eq!(all.len(), 6);
}

// ─── Entities & identifiers ──────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_entity() {
  let s = store().await;
  let entity = s
    .add_entity(EntityKind::Person, "Jane Doe".into())
    .await
    .unwrap();

  let fetched = s.get_entity(entity.entity_id).await.unwrap().unwrap();
  assert_eq!(fetched.entity_id, entity.entity_id);
  assert_eq!(fetched.kind, EntityKind::Person);
  assert!(fetched.merged_into.is_none());
}

#[tokio::test]
async fn attach_identifier_is_upsert_keeping_highest_confidence() {
  let s = store().await;
  let entity = s
    .add_entity(EntityKind::Person, "Jane Doe".into())
    .await
    .unwrap();

  let mut ident = email_identifier(entity.entity_id, "jane@example.com");
  ident.confidence = 0.6;
  assert!(s.attach_identifier(ident.clone()).await.unwrap());

  // Same normalized value again: no new row, confidence raised.
  ident.confidence = 0.9;
  assert!(!s.attach_identifier(ident.clone()).await.unwrap());

  // Lower confidence never wins.
  ident.confidence = 0.1;
  assert!(!s.attach_identifier(ident).await.unwrap());

  let idents = s.identifiers_for(entity.entity_id).await.unwrap();
  assert_eq!(idents.len(), 1);
  assert_eq!(idents[0].confidence, 0.9);
}

#[tokio::test]
async fn find_entities_by_identifier_hits_normalized_value() {
  let s = store().await;
  let entity = s
    .add_entity(EntityKind::Person, "Jane Doe".into())
    .await
    .unwrap();
  s.attach_identifier(email_identifier(entity.entity_id, "jane@example.com"))
    .await
    .unwrap();

  let hits = s
    .find_entities_by_identifier(IdType::Email, "jane@example.com")
    .await
    .unwrap();
  assert_eq!(hits, vec![entity.entity_id]);

  let misses = s
    .find_entities_by_identifier(IdType::Email, "other@example.com")
    .await
    .unwrap();
  assert!(misses.is_empty());
}

// ─── Merge chains ────────────────────────────────────────────────────────────

#[tokio::test]
async fn merge_collapses_chains_to_one_hop() {
  let s = store().await;
  let a = s.add_entity(EntityKind::Person, "A".into()).await.unwrap();
  let b = s.add_entity(EntityKind::Person, "B".into()).await.unwrap();
  let c = s.add_entity(EntityKind::Person, "C".into()).await.unwrap();

  merge_entities(&s, a.entity_id, b.entity_id, "reviewer").await.unwrap();
  // Merging into a tombstone resolves to its terminal first.
  merge_entities(&s, b.entity_id, c.entity_id, "reviewer").await.unwrap();

  let b_row = s.get_entity(b.entity_id).await.unwrap().unwrap();
  let c_row = s.get_entity(c.entity_id).await.unwrap().unwrap();
  assert_eq!(b_row.merged_into, Some(a.entity_id));
  assert_eq!(c_row.merged_into, Some(a.entity_id));

  let terminal = s.resolve_terminal(c.entity_id).await.unwrap().unwrap();
  assert_eq!(terminal.entity_id, a.entity_id);
}

#[tokio::test]
async fn merging_the_terminal_repoints_existing_tombstones() {
  let s = store().await;
  let a = s.add_entity(EntityKind::Person, "A".into()).await.unwrap();
  let b = s.add_entity(EntityKind::Person, "B".into()).await.unwrap();
  let d = s.add_entity(EntityKind::Person, "D".into()).await.unwrap();

  merge_entities(&s, a.entity_id, b.entity_id, "reviewer").await.unwrap();
  merge_entities(&s, d.entity_id, a.entity_id, "reviewer").await.unwrap();

  // B pointed at A; after A lost to D every chain is one hop to D.
  let a_row = s.get_entity(a.entity_id).await.unwrap().unwrap();
  let b_row = s.get_entity(b.entity_id).await.unwrap().unwrap();
  assert_eq!(a_row.merged_into, Some(d.entity_id));
  assert_eq!(b_row.merged_into, Some(d.entity_id));
}

#[tokio::test]
async fn merge_cycle_is_rejected_without_corruption() {
  let s = store().await;
  let a = s.add_entity(EntityKind::Person, "A".into()).await.unwrap();
  let b = s.add_entity(EntityKind::Person, "B".into()).await.unwrap();

  merge_entities(&s, a.entity_id, b.entity_id, "reviewer").await.unwrap();

  // B's terminal is A; merging A into B would close a loop.
  let err = merge_entities(&s, b.entity_id, a.entity_id, "reviewer")
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Core(clowder_core::Error::MergeCycleDetected { .. })
  ));

  // Original state untouched.
  let a_row = s.get_entity(a.entity_id).await.unwrap().unwrap();
  assert!(a_row.merged_into.is_none());
}

#[tokio::test]
async fn self_merge_is_rejected() {
  let s = store().await;
  let a = s.add_entity(EntityKind::Person, "A".into()).await.unwrap();
  let err = merge_entities(&s, a.entity_id, a.entity_id, "reviewer")
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Core(clowder_core::Error::MergeCycleDetected { .. })
  ));
}

#[tokio::test]
async fn merge_unions_identifiers_keeping_highest_confidence() {
  let s = store().await;
  let winner = s.add_entity(EntityKind::Person, "W".into()).await.unwrap();
  let loser = s.add_entity(EntityKind::Person, "L".into()).await.unwrap();

  let mut shared = email_identifier(winner.entity_id, "both@example.com");
  shared.confidence = 0.5;
  s.attach_identifier(shared).await.unwrap();

  let mut from_loser = email_identifier(loser.entity_id, "both@example.com");
  from_loser.confidence = 0.95;
  s.attach_identifier(from_loser).await.unwrap();
  s.attach_identifier(email_identifier(loser.entity_id, "only@example.com"))
    .await
    .unwrap();

  merge_entities(&s, winner.entity_id, loser.entity_id, "reviewer")
    .await
    .unwrap();

  let idents = s.identifiers_for(winner.entity_id).await.unwrap();
  assert_eq!(idents.len(), 2);
  let shared = idents
    .iter()
    .find(|i| i.value_norm == "both@example.com")
    .unwrap();
  assert_eq!(shared.confidence, 0.95);
}

// ─── Batch processing ────────────────────────────────────────────────────────

#[tokio::test]
async fn new_entity_for_unmatched_person() {
  let s = store().await;
  s.ingest_raw(record(
    SourceSystem::IntakeForm,
    "r-1",
    &[("name", "Jane Doe"), ("email", "J.Doe@Example.com")],
  ))
  .await
  .unwrap();

  let outcome = process_batch(&s, None, 100).await.unwrap();
  assert_eq!(outcome.processed, 1);
  assert_eq!(outcome.succeeded, 1);
  assert_eq!(outcome.errors, 0);

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  assert_eq!(decisions.len(), 1);
  let decision = &decisions[0];
  assert_eq!(decision.decision_type, DecisionType::NewEntity);
  assert_eq!(decision.extracted_email.as_deref(), Some("j.doe@example.com"));

  let person = s
    .get_entity(decision.entity_id.unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(person.kind, EntityKind::Person);
  let idents = s.identifiers_for(person.entity_id).await.unwrap();
  assert_eq!(idents.len(), 1);
  assert_eq!(idents[0].value_norm, "j.doe@example.com");
}

#[tokio::test]
async fn rerun_is_idempotent() {
  let s = store().await;
  s.ingest_raw(record(
    SourceSystem::IntakeForm,
    "r-1",
    &[("name", "Jane Doe"), ("phone", "555-123-4567")],
  ))
  .await
  .unwrap();

  let first = process_batch(&s, None, 100).await.unwrap();
  assert_eq!(first.processed, 1);

  // Already-decided records are naturally skipped.
  let second = process_batch(&s, None, 100).await.unwrap();
  assert_eq!(second.processed, 0);

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  assert_eq!(decisions.len(), 1);
}

#[tokio::test]
async fn email_agreement_above_upper_auto_matches() {
  let s = store().await;
  s.save_match_config(&email_only_config(10.0, 4.0)).await.unwrap();

  let existing = s
    .add_entity(EntityKind::Person, "Jane Doe".into())
    .await
    .unwrap();
  s.attach_identifier(email_identifier(existing.entity_id, "j.doe@example.com"))
    .await
    .unwrap();

  s.ingest_raw(record(
    SourceSystem::IntakeForm,
    "r-1",
    &[("name", "Jane Doe"), ("email", "J.Doe@Example.com")],
  ))
  .await
  .unwrap();

  process_batch(&s, None, 100).await.unwrap();

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  let decision = &decisions[0];
  assert_eq!(decision.decision_type, DecisionType::AutoMatch);
  assert_eq!(decision.top_entity_id, Some(existing.entity_id));
  assert!((decision.top_score.unwrap() - 12.0).abs() < 1e-9);

  // The new record's email lands as a deduplicated identifier.
  let idents = s.identifiers_for(existing.entity_id).await.unwrap();
  assert_eq!(idents.len(), 1);
}

#[tokio::test]
async fn raising_upper_threshold_demotes_to_review() {
  let s = store().await;
  // Same agreement weight (12.0), stricter gate.
  s.save_match_config(&email_only_config(13.0, 4.0)).await.unwrap();

  let existing = s
    .add_entity(EntityKind::Person, "Jane Doe".into())
    .await
    .unwrap();
  s.attach_identifier(email_identifier(existing.entity_id, "j.doe@example.com"))
    .await
    .unwrap();

  s.ingest_raw(record(
    SourceSystem::IntakeForm,
    "r-1",
    &[("name", "Jane Doe"), ("email", "J.Doe@Example.com")],
  ))
  .await
  .unwrap();

  process_batch(&s, None, 100).await.unwrap();

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  let decision = &decisions[0];
  assert_eq!(decision.decision_type, DecisionType::ReviewNeeded);
  // Review decisions touch no canonical entity.
  assert!(decision.entity_id.is_none());
  assert_eq!(decision.candidates_evaluated, 1);
  assert!(!decision.breakdown.is_empty());
}

#[tokio::test]
async fn organization_record_is_rejected_into_pseudo_profile() {
  let s = store().await;
  s.ingest_raw(record(
    SourceSystem::MasterList,
    "r-1",
    &[
      ("client_name", "Valley Oak Cat Rescue"),
      ("phone", "555-123-4567"),
    ],
  ))
  .await
  .unwrap();

  process_batch(&s, None, 100).await.unwrap();

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  let decision = &decisions[0];
  assert_eq!(decision.decision_type, DecisionType::Rejected);

  let pseudo = s
    .get_entity(decision.entity_id.unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(pseudo.kind, EntityKind::PseudoProfile);
  assert_eq!(pseudo.display_name, "Valley Oak Cat Rescue");
  // Pseudo-profiles never enter the blocking index.
  assert!(s.identifiers_for(pseudo.entity_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn garbage_record_without_signal_is_rejected() {
  let s = store().await;
  s.ingest_raw(record(SourceSystem::MasterList, "r-1", &[("client_name", "n/a")]))
    .await
    .unwrap();

  let outcome = process_batch(&s, None, 100).await.unwrap();
  assert_eq!(outcome.succeeded, 1);

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  assert_eq!(decisions[0].decision_type, DecisionType::Rejected);
}

#[tokio::test]
async fn foster_row_creates_person_cat_and_household_free_entities() {
  let s = store().await;
  s.ingest_raw(record(
    SourceSystem::MasterList,
    "r-1",
    &[
      ("client_name", "Foster 'Mittens' (Alvarez)"),
      ("phone", "555-123-4567"),
    ],
  ))
  .await
  .unwrap();

  process_batch(&s, None, 100).await.unwrap();

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  let decision = &decisions[0];
  assert_eq!(decision.decision_type, DecisionType::NewEntity);
  assert_eq!(decision.extracted_name.as_deref(), Some("Alvarez"));

  // The cat came along as a side entity, deduped by name.
  let cat = s
    .find_by_display_name(EntityKind::Cat, "Mittens")
    .await
    .unwrap();
  assert!(cat.is_some());
}

// ─── Review workflow ─────────────────────────────────────────────────────────

async fn pending_review_decision(s: &SqliteStore) -> (Uuid, Uuid) {
  s.save_match_config(&email_only_config(13.0, 4.0)).await.unwrap();
  let existing = s
    .add_entity(EntityKind::Person, "Jane Doe".into())
    .await
    .unwrap();
  s.attach_identifier(email_identifier(existing.entity_id, "j.doe@example.com"))
    .await
    .unwrap();
  s.ingest_raw(record(
    SourceSystem::IntakeForm,
    "r-review",
    &[("name", "Jane Doe"), ("email", "j.doe@example.com")],
  ))
  .await
  .unwrap();
  process_batch(s, None, 100).await.unwrap();

  let pending = s
    .list_decisions(&DecisionQuery {
      status: Some(DecisionStatus::Pending),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(pending.len(), 1);
  (pending[0].decision_id, existing.entity_id)
}

#[tokio::test]
async fn resolve_merge_applies_identifiers_and_marks_reviewed() {
  let s = store().await;
  let (decision_id, entity_id) = pending_review_decision(&s).await;

  let result = resolve(
    &s,
    decision_id,
    ReviewAction::Merge,
    "casey",
    Some("same person, new intake".into()),
  )
  .await
  .unwrap();

  assert_eq!(result.entity_id, Some(entity_id));
  assert!(result.decision.is_reviewed());
  assert_eq!(result.decision.reviewed_by.as_deref(), Some("casey"));
  assert_eq!(result.decision.review_action, Some(ReviewAction::Merge));

  let reviewed = s
    .list_decisions(&DecisionQuery {
      status: Some(DecisionStatus::Reviewed),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(reviewed.len(), 1);
}

#[tokio::test]
async fn resolve_double_submit_reports_already_resolved() {
  let s = store().await;
  let (decision_id, _) = pending_review_decision(&s).await;

  resolve(&s, decision_id, ReviewAction::Merge, "casey", None)
    .await
    .unwrap();

  let err = resolve(&s, decision_id, ReviewAction::Merge, "casey", None)
    .await
    .unwrap_err();
  match err {
    EngineError::Core(clowder_core::Error::AlreadyResolved {
      by, ..
    }) => assert_eq!(by, "casey"),
    other => panic!("expected AlreadyResolved, got {other:?}"),
  }
}

#[tokio::test]
async fn resolve_unknown_decision_reports_not_found() {
  let s = store().await;
  let err = resolve(&s, Uuid::new_v4(), ReviewAction::Reject, "casey", None)
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    EngineError::Core(clowder_core::Error::DecisionNotFound(_))
  ));
}

#[tokio::test]
async fn keep_separate_suppresses_the_pair_for_future_batches() {
  let s = store().await;
  let (decision_id, entity_id) = pending_review_decision(&s).await;

  resolve(&s, decision_id, ReviewAction::KeepSeparate, "casey", None)
    .await
    .unwrap();
  assert!(
    s.is_pair_suppressed("j.doe@example.com|", entity_id)
      .await
      .unwrap()
  );

  // A new record with the same identifier signal must not be re-proposed
  // for review: the suppressed pair falls through to a new entity.
  s.ingest_raw(record(
    SourceSystem::IntakeForm,
    "r-again",
    &[
      ("name", "Jane Doe"),
      ("email", "j.doe@example.com"),
      ("note", "second submission"),
    ],
  ))
  .await
  .unwrap();
  process_batch(&s, None, 100).await.unwrap();

  let decisions = s.list_decisions(&DecisionQuery::default()).await.unwrap();
  let latest = decisions
    .iter()
    .find(|d| !d.is_reviewed())
    .expect("new decision");
  assert_eq!(latest.decision_type, DecisionType::NewEntity);
}

#[tokio::test]
async fn reject_discards_the_candidate_entirely() {
  let s = store().await;
  let (decision_id, _) = pending_review_decision(&s).await;

  let result = resolve(&s, decision_id, ReviewAction::Reject, "casey", None)
    .await
    .unwrap();
  assert!(result.entity_id.is_none());

  // No person was created for the candidate.
  let people = s
    .find_by_display_name(EntityKind::Person, "Jane Doe")
    .await
    .unwrap();
  // Only the pre-existing entity remains terminal under that name.
  assert!(people.is_some());
}

// ─── Households ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn manual_household_rows_survive_inference() {
  let s = store().await;
  let person = s.add_entity(EntityKind::Person, "P".into()).await.unwrap();
  let place = s.add_entity(EntityKind::Place, "417 Sycamore St".into())
    .await
    .unwrap();

  s.upsert_household_member(HouseholdMember {
    person_id:  person.entity_id,
    place_id:   place.entity_id,
    role:       HouseholdRole::Owner,
    confidence: 1.0,
    source:     MembershipSource::Manual,
  })
  .await
  .unwrap();

  // A later inference pass must not downgrade the manual row.
  s.upsert_household_member(HouseholdMember {
    person_id:  person.entity_id,
    place_id:   place.entity_id,
    role:       HouseholdRole::Resident,
    confidence: 0.5,
    source:     MembershipSource::Inferred,
  })
  .await
  .unwrap();

  let members = s.household_for_person(person.entity_id).await.unwrap();
  assert_eq!(members.len(), 1);
  assert_eq!(members[0].source, MembershipSource::Manual);
  assert_eq!(members[0].role, HouseholdRole::Owner);
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[tokio::test]
async fn match_config_round_trips() {
  let s = store().await;
  let mut config = MatchConfig::default();
  config.thresholds.push(ThresholdConfig {
    source_system:   Some(SourceSystem::ShelterFeed),
    upper_threshold: 14.0,
    lower_threshold: 6.0,
  });
  s.save_match_config(&config).await.unwrap();

  let loaded = s.load_match_config().await.unwrap();
  assert_eq!(loaded.thresholds.len(), 2);
  assert_eq!(loaded.parameters.len(), 4);
  assert_eq!(loaded.name_similarity_floor, 0.88);
  assert_eq!(
    loaded
      .thresholds_for(SourceSystem::ShelterFeed)
      .unwrap()
      .upper_threshold,
    14.0
  );
}

#[tokio::test]
async fn invalid_config_is_rejected_at_write_time() {
  let s = store().await;
  let mut config = MatchConfig::default();
  config.parameters[0].u_probability = 0.0;

  let err = s.save_match_config(&config).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(clowder_core::Error::ConfigurationInvalid(_))
  ));

  // Nothing was persisted; loading still yields the defaults.
  let loaded = s.load_match_config().await.unwrap();
  assert_eq!(loaded.parameters.len(), 4);
  loaded.validate().unwrap();
}

#[tokio::test]
async fn unseeded_store_falls_back_to_default_config() {
  let s = store().await;
  let loaded = s.load_match_config().await.unwrap();
  loaded.validate().unwrap();
  assert!(!loaded.parameters.is_empty());
}
