//! The batch driver and per-record decision state machine.
//!
//! Batches are discrete and re-triggerable: each invocation loads a fresh
//! configuration snapshot, pulls a bounded slice of unprocessed records, and
//! runs every record to an independent conclusion. One record's failure
//! increments the error counter and never aborts its siblings. Re-running a
//! batch is a no-op for already-decided records because their decision row
//! already exists.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use clowder_core::{
  audit::{EditType, NewAuditEntry},
  candidate::{Candidate, RoleHint},
  config::MatchConfig,
  decision::{DecisionType, MatchDecision, NewMatchDecision},
  entity::{Entity, EntityKind},
  household::{HouseholdMember, HouseholdRole, MembershipSource},
  identifier::{IdType, Identifier},
  record::{RawRecord, SourceSystem, source_system_tag},
  store::EntityStore,
};
use clowder_extract::{classify, extract};

use crate::{
  blocker::block,
  decide::{Band, band, pick_best},
  error::{EngineError, Result},
  scorer::{ScoreBreakdown, score},
};

/// Confidence recorded on household rows the engine infers on its own.
const INFERRED_HOUSEHOLD_CONFIDENCE: f64 = 0.75;

/// Actor string for engine-originated audit rows.
pub const ENGINE_ACTOR: &str = "engine";

/// Aggregate counters returned by [`process_batch`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
  pub processed: usize,
  pub succeeded: usize,
  pub errors:    usize,
}

// ─── Batch driver ────────────────────────────────────────────────────────────

/// Process up to `limit` staged records. Safe to call repeatedly and from
/// concurrent triggers; per-record idempotency comes from the store's
/// at-most-one-decision-per-record write semantics.
pub async fn process_batch<S: EntityStore>(
  store: &S,
  source: Option<SourceSystem>,
  limit: usize,
) -> Result<BatchOutcome> {
  let config = store.load_match_config().await.map_err(EngineError::store)?;
  config.validate().map_err(EngineError::Core)?;

  let records = store
    .fetch_unprocessed(source, limit)
    .await
    .map_err(EngineError::store)?;

  let mut outcome = BatchOutcome::default();
  for record in records {
    outcome.processed += 1;
    match process_record(store, &config, &record).await {
      Ok(decision) => {
        outcome.succeeded += 1;
        tracing::debug!(
          record_id = %record.record_id,
          decision = ?decision.decision_type,
          score = ?decision.top_score,
          "record decided"
        );
      }
      Err(err) => {
        outcome.errors += 1;
        tracing::warn!(
          record_id = %record.record_id,
          error = %err,
          "record failed; continuing batch"
        );
      }
    }
  }

  tracing::info!(
    processed = outcome.processed,
    succeeded = outcome.succeeded,
    errors = outcome.errors,
    "batch complete"
  );
  Ok(outcome)
}

// ─── Per-record state machine ────────────────────────────────────────────────

/// Run one staged record through extract → classify → block → score →
/// decide, persisting the decision and any canonical writes it implies.
pub async fn process_record<S: EntityStore>(
  store: &S,
  config: &MatchConfig,
  record: &RawRecord,
) -> Result<MatchDecision> {
  let candidate = extract(record);
  let verdict = classify(&candidate);

  // Not person material: persist a pseudo-profile so the raw data stays
  // traceable, and record the rejection. Expected outcome, not an error.
  if !verdict.should_create_person {
    let pseudo = store
      .add_entity(
        EntityKind::PseudoProfile,
        pseudo_display_name(&candidate),
      )
      .await
      .map_err(EngineError::store)?;
    audit_created(store, &pseudo, record.source_system, &verdict.reason)
      .await?;
    return record_decision(
      store,
      record,
      &candidate,
      DecisionType::Rejected,
      0,
      None,
      None,
      Vec::new(),
      Some(pseudo.entity_id),
    )
    .await;
  }

  let profiles = block(store, &candidate).await?;
  if profiles.is_empty() {
    return decide_new_entity(store, record, &candidate, 0).await;
  }

  let evaluated = profiles.len() as u32;
  let scored: Vec<_> = profiles
    .into_iter()
    .map(|p| {
      let breakdown = score(&candidate, &p, config);
      (p, breakdown)
    })
    .collect();

  // pick_best is only None on an empty pool, which was handled above.
  let Some(best_index) = pick_best(&scored) else {
    return decide_new_entity(store, record, &candidate, 0).await;
  };
  let (best_profile, best_breakdown) = &scored[best_index];
  let thresholds = config.thresholds_for(record.source_system)?;

  match band(best_breakdown.total, thresholds) {
    Band::AboveUpper => {
      decide_auto_match(
        store,
        record,
        &candidate,
        evaluated,
        &best_profile.entity,
        best_breakdown,
      )
      .await
    }
    Band::BelowLower => {
      decide_new_entity(store, record, &candidate, evaluated).await
    }
    Band::Between => {
      // A reviewer already kept this exact pair separate; without new
      // identifier signal it must not be re-proposed.
      let suppressed = store
        .is_pair_suppressed(
          &candidate.signal_key(),
          best_profile.entity.entity_id,
        )
        .await
        .map_err(EngineError::store)?;
      if suppressed {
        tracing::debug!(
          entity_id = %best_profile.entity.entity_id,
          "review pair suppressed by earlier keep_separate"
        );
        return decide_new_entity(store, record, &candidate, evaluated).await;
      }
      record_decision(
        store,
        record,
        &candidate,
        DecisionType::ReviewNeeded,
        evaluated,
        Some(best_profile.entity.entity_id),
        Some(best_breakdown.total),
        best_breakdown.fields.clone(),
        None,
      )
      .await
    }
  }
}

// ─── Outcome arms ────────────────────────────────────────────────────────────

async fn decide_new_entity<S: EntityStore>(
  store: &S,
  record: &RawRecord,
  candidate: &Candidate,
  evaluated: u32,
) -> Result<MatchDecision> {
  let display = candidate
    .display_name()
    .unwrap_or_else(|| "unnamed person".to_string());
  let person = store
    .add_entity(EntityKind::Person, display)
    .await
    .map_err(EngineError::store)?;
  audit_created(store, &person, record.source_system, "new entity from record")
    .await?;

  attach_candidate_identifiers(store, &person, candidate, record.source_system)
    .await?;
  apply_side_entities(store, candidate, &person, record.source_system).await?;

  record_decision(
    store,
    record,
    candidate,
    DecisionType::NewEntity,
    evaluated,
    None,
    None,
    Vec::new(),
    Some(person.entity_id),
  )
  .await
}

async fn decide_auto_match<S: EntityStore>(
  store: &S,
  record: &RawRecord,
  candidate: &Candidate,
  evaluated: u32,
  winner: &Entity,
  breakdown: &ScoreBreakdown,
) -> Result<MatchDecision> {
  attach_candidate_identifiers(store, winner, candidate, record.source_system)
    .await?;
  apply_side_entities(store, candidate, winner, record.source_system).await?;

  record_decision(
    store,
    record,
    candidate,
    DecisionType::AutoMatch,
    evaluated,
    Some(winner.entity_id),
    Some(breakdown.total),
    breakdown.fields.clone(),
    Some(winner.entity_id),
  )
  .await
}

#[allow(clippy::too_many_arguments)]
async fn record_decision<S: EntityStore>(
  store: &S,
  record: &RawRecord,
  candidate: &Candidate,
  decision_type: DecisionType,
  candidates_evaluated: u32,
  top_entity_id: Option<Uuid>,
  top_score: Option<f64>,
  breakdown: Vec<clowder_core::decision::FieldContribution>,
  entity_id: Option<Uuid>,
) -> Result<MatchDecision> {
  store
    .record_decision(NewMatchDecision {
      record_id: record.record_id,
      source_system: record.source_system,
      extracted_name: candidate.display_name(),
      extracted_email: candidate.email_norm.clone(),
      extracted_phone: candidate.phone_norm.clone(),
      candidates_evaluated,
      top_entity_id,
      top_score,
      decision_type,
      breakdown,
      entity_id,
    })
    .await
    .map_err(EngineError::store)
}

// ─── Canonical-write helpers ─────────────────────────────────────────────────

/// Attach the candidate's observed identifiers to `entity`. Upsert-idempotent;
/// audit rows are written only for genuinely new identifier rows.
async fn attach_candidate_identifiers<S: EntityStore>(
  store: &S,
  entity: &Entity,
  candidate: &Candidate,
  source: SourceSystem,
) -> Result<()> {
  let pairs = [
    (IdType::Email, &candidate.email_raw, &candidate.email_norm),
    (IdType::Phone, &candidate.phone_raw, &candidate.phone_norm),
  ];
  for (id_type, raw, norm) in pairs {
    let Some(norm) = norm.clone() else { continue };
    let inserted = store
      .attach_identifier(Identifier {
        entity_id: entity.entity_id,
        id_type,
        value_raw: raw.clone().unwrap_or_else(|| norm.clone()),
        value_norm: norm.clone(),
        confidence: 1.0,
        source_system: source,
      })
      .await
      .map_err(EngineError::store)?;
    if inserted {
      store
        .append_audit(NewAuditEntry {
          entity_kind: entity.kind,
          entity_id:   entity.entity_id,
          edit_type:   EditType::IdentifierAttached,
          old_value:   None,
          new_value:   Some(norm),
          actor:       ENGINE_ACTOR.to_string(),
          source:      Some(source_system_tag(source).to_string()),
        })
        .await
        .map_err(EngineError::store)?;
    }
  }
  Ok(())
}

/// Cats and places carry no email/phone, so they are deduped by display name
/// instead of being scored.
async fn find_or_create<S: EntityStore>(
  store: &S,
  kind: EntityKind,
  name: &str,
  source: SourceSystem,
) -> Result<Entity> {
  if let Some(existing) = store
    .find_by_display_name(kind, name)
    .await
    .map_err(EngineError::store)?
  {
    return Ok(existing);
  }
  let created = store
    .add_entity(kind, name.to_string())
    .await
    .map_err(EngineError::store)?;
  audit_created(store, &created, source, "side entity from record").await?;
  Ok(created)
}

/// Secondary writes of a successful person outcome: the record's cat, its
/// place, and the inferred household membership.
async fn apply_side_entities<S: EntityStore>(
  store: &S,
  candidate: &Candidate,
  person: &Entity,
  source: SourceSystem,
) -> Result<()> {
  if let Some(cat_name) = candidate.cat_name.as_deref() {
    find_or_create(store, EntityKind::Cat, cat_name, source).await?;
  }

  if let Some(address) = candidate.address_raw.as_deref() {
    let place = find_or_create(store, EntityKind::Place, address, source).await?;
    store
      .upsert_household_member(HouseholdMember {
        person_id:  person.entity_id,
        place_id:   place.entity_id,
        role:       household_role(candidate.role_hint),
        confidence: INFERRED_HOUSEHOLD_CONFIDENCE,
        source:     MembershipSource::Inferred,
      })
      .await
      .map_err(EngineError::store)?;
    store
      .append_audit(NewAuditEntry {
        entity_kind: EntityKind::Person,
        entity_id:   person.entity_id,
        edit_type:   EditType::HouseholdLinked,
        old_value:   None,
        new_value:   Some(place.entity_id.to_string()),
        actor:       ENGINE_ACTOR.to_string(),
        source:      Some(source_system_tag(source).to_string()),
      })
      .await
      .map_err(EngineError::store)?;
  }
  Ok(())
}

fn household_role(hint: Option<RoleHint>) -> HouseholdRole {
  match hint {
    Some(RoleHint::Owner) => HouseholdRole::Owner,
    Some(RoleHint::Trapper) => HouseholdRole::Trapper,
    Some(RoleHint::FosterParent) => HouseholdRole::FosterParent,
    Some(RoleHint::AltContact) | None => HouseholdRole::Resident,
  }
}

fn pseudo_display_name(candidate: &Candidate) -> String {
  candidate
    .org_name
    .clone()
    .or_else(|| candidate.raw_name.clone())
    .or_else(|| candidate.address_raw.clone())
    .unwrap_or_else(|| "unclassified record".to_string())
}

async fn audit_created<S: EntityStore>(
  store: &S,
  entity: &Entity,
  source: SourceSystem,
  note: &str,
) -> Result<()> {
  store
    .append_audit(NewAuditEntry {
      entity_kind: entity.kind,
      entity_id:   entity.entity_id,
      edit_type:   EditType::Created,
      old_value:   None,
      new_value:   Some(note.to_string()),
      actor:       ENGINE_ACTOR.to_string(),
      source:      Some(source_system_tag(source).to_string()),
    })
    .await
    .map_err(EngineError::store)?;
  Ok(())
}
