//! The human review and merge workflow.
//!
//! `resolve` is the sole mutation entry point exposed for human action. It
//! is guarded twice against double-submits: a read check here that produces
//! the rich `AlreadyResolved { by, at }` error, and the store's atomic
//! set-once semantics on the review columns underneath.

use uuid::Uuid;

use clowder_core::{
  Error as CoreError,
  audit::{EditType, NewAuditEntry},
  decision::{MatchDecision, ReviewAction},
  entity::{Entity, EntityKind},
  household::{HouseholdMember, HouseholdRole, MembershipSource},
  identifier::{IdType, Identifier},
  record::source_system_tag,
  store::EntityStore,
};

use crate::error::{EngineError, Result};

/// What a resolution did, for display back to the reviewer.
#[derive(Debug, Clone)]
pub struct ResolveResult {
  pub decision:  MatchDecision,
  /// The canonical entity the action landed on, when one exists.
  pub entity_id: Option<Uuid>,
}

// ─── Resolution ──────────────────────────────────────────────────────────────

/// Apply a reviewer's action to a pending decision.
pub async fn resolve<S: EntityStore>(
  store: &S,
  decision_id: Uuid,
  action: ReviewAction,
  actor: &str,
  notes: Option<String>,
) -> Result<ResolveResult> {
  let decision = store
    .get_decision(decision_id)
    .await
    .map_err(EngineError::store)?
    .ok_or(CoreError::DecisionNotFound(decision_id))?;

  if let (Some(at), Some(by)) =
    (decision.reviewed_at, decision.reviewed_by.clone())
  {
    return Err(CoreError::AlreadyResolved { decision_id, by, at }.into());
  }

  let entity_id = match action {
    ReviewAction::Merge => Some(apply_merge(store, &decision, actor).await?),
    ReviewAction::KeepSeparate => {
      Some(apply_keep_separate(store, &decision).await?)
    }
    ReviewAction::AddToHousehold => {
      Some(apply_add_to_household(store, &decision, actor).await?)
    }
    // The candidate is discarded entirely: no entity, no merge.
    ReviewAction::Reject => None,
  };

  // Atomic set-once write; a concurrent resolver loses here even if both
  // passed the read check above.
  let reviewed = store
    .mark_reviewed(decision_id, action, actor.to_string(), notes)
    .await
    .map_err(EngineError::store)?;

  if let Some(id) = entity_id {
    if let Some(entity) = store.get_entity(id).await.map_err(EngineError::store)?
    {
      store
        .append_audit(NewAuditEntry {
          entity_kind: entity.kind,
          entity_id:   id,
          edit_type:   EditType::ReviewResolved,
          old_value:   Some(format!("{:?}", decision.decision_type)),
          new_value:   Some(format!("{action:?}")),
          actor:       actor.to_string(),
          source:      None,
        })
        .await
        .map_err(EngineError::store)?;
    }
  }

  Ok(ResolveResult { decision: reviewed, entity_id })
}

// ─── Action arms ─────────────────────────────────────────────────────────────

async fn apply_merge<S: EntityStore>(
  store: &S,
  decision: &MatchDecision,
  actor: &str,
) -> Result<Uuid> {
  let top = decision.top_entity_id.ok_or_else(|| {
    EngineError::InvalidAction("merge requires a match target".into())
  })?;
  let winner = store
    .resolve_terminal(top)
    .await
    .map_err(EngineError::store)?
    .ok_or(CoreError::EntityNotFound(top))?;

  match decision.entity_id {
    // The decision had already produced its own entity (e.g. a new-entity
    // call being corrected): fold that entity into the winner.
    Some(loser_id) if loser_id != winner.entity_id => {
      merge_entities(store, winner.entity_id, loser_id, actor).await?;
    }
    // Review-needed decisions created nothing; merging means applying the
    // candidate's identifiers to the winner.
    _ => {
      attach_decision_identifiers(store, &winner, decision).await?;
    }
  }
  Ok(winner.entity_id)
}

async fn apply_keep_separate<S: EntityStore>(
  store: &S,
  decision: &MatchDecision,
) -> Result<Uuid> {
  let top = decision.top_entity_id.ok_or_else(|| {
    EngineError::InvalidAction("keep_separate requires a match target".into())
  })?;
  let terminal = store
    .resolve_terminal(top)
    .await
    .map_err(EngineError::store)?
    .ok_or(CoreError::EntityNotFound(top))?;

  store
    .suppress_pair(&decision.signal_key(), terminal.entity_id)
    .await
    .map_err(EngineError::store)?;
  Ok(terminal.entity_id)
}

async fn apply_add_to_household<S: EntityStore>(
  store: &S,
  decision: &MatchDecision,
  actor: &str,
) -> Result<Uuid> {
  let top = decision.top_entity_id.ok_or_else(|| {
    EngineError::InvalidAction("add_to_household requires a match target".into())
  })?;
  let target = store
    .resolve_terminal(top)
    .await
    .map_err(EngineError::store)?
    .ok_or(CoreError::EntityNotFound(top))?;

  // The place: the target itself, or the target person's primary place.
  let place_id = match target.kind {
    EntityKind::Place => target.entity_id,
    EntityKind::Person => {
      let memberships = store
        .household_for_person(target.entity_id)
        .await
        .map_err(EngineError::store)?;
      memberships
        .into_iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .map(|m| m.place_id)
        .ok_or_else(|| {
          EngineError::InvalidAction(
            "target person has no known place to join".into(),
          )
        })?
    }
    _ => {
      return Err(EngineError::InvalidAction(format!(
        "cannot add to household of a {:?} entity",
        target.kind
      )));
    }
  };

  let person = match decision.entity_id {
    Some(id) => store
      .resolve_terminal(id)
      .await
      .map_err(EngineError::store)?
      .ok_or(CoreError::EntityNotFound(id))?,
    None => person_from_decision(store, decision, actor).await?,
  };

  store
    .upsert_household_member(HouseholdMember {
      person_id:  person.entity_id,
      place_id,
      role:       HouseholdRole::Resident,
      confidence: 1.0,
      source:     MembershipSource::Manual,
    })
    .await
    .map_err(EngineError::store)?;
  store
    .append_audit(NewAuditEntry {
      entity_kind: EntityKind::Person,
      entity_id:   person.entity_id,
      edit_type:   EditType::HouseholdLinked,
      old_value:   None,
      new_value:   Some(place_id.to_string()),
      actor:       actor.to_string(),
      source:      None,
    })
    .await
    .map_err(EngineError::store)?;

  Ok(person.entity_id)
}

// ─── Entity merge ────────────────────────────────────────────────────────────

/// Fold `loser` into `winner`: tombstone the loser, collapse every chain to
/// one hop, and union identifiers. Rejects merges that would create a cycle
/// or re-merge an already-merged entity; on rejection nothing is written.
pub async fn merge_entities<S: EntityStore>(
  store: &S,
  winner_id: Uuid,
  loser_id: Uuid,
  actor: &str,
) -> Result<()> {
  if winner_id == loser_id {
    return Err(
      CoreError::MergeCycleDetected { winner: winner_id, loser: loser_id }
        .into(),
    );
  }

  let winner = store
    .resolve_terminal(winner_id)
    .await
    .map_err(EngineError::store)?
    .ok_or(CoreError::EntityNotFound(winner_id))?;

  // The loser must still be terminal; and if the winner's chain ends at the
  // loser, pointing the loser back would close a cycle.
  if winner.entity_id == loser_id {
    return Err(
      CoreError::MergeCycleDetected { winner: winner_id, loser: loser_id }
        .into(),
    );
  }
  let loser = store
    .get_entity(loser_id)
    .await
    .map_err(EngineError::store)?
    .ok_or(CoreError::EntityNotFound(loser_id))?;
  if let Some(already) = loser.merged_into {
    return Err(
      CoreError::PersistenceConflict(format!(
        "entity {loser_id} is already merged into {already}"
      ))
      .into(),
    );
  }

  // Union identifiers first; the upsert keeps the highest confidence on
  // conflict, so this is safe to replay.
  for ident in store
    .identifiers_for(loser.entity_id)
    .await
    .map_err(EngineError::store)?
  {
    let inserted = store
      .attach_identifier(Identifier { entity_id: winner.entity_id, ..ident })
      .await
      .map_err(EngineError::store)?;
    if inserted {
      tracing::debug!(
        winner = %winner.entity_id,
        loser = %loser.entity_id,
        "identifier carried over by merge"
      );
    }
  }

  store
    .set_merged_into(loser.entity_id, winner.entity_id)
    .await
    .map_err(EngineError::store)?;

  // Re-point any chain that ended at the loser, keeping every tombstone one
  // hop from its terminal.
  let repointed = store
    .repoint_merged(loser.entity_id, winner.entity_id)
    .await
    .map_err(EngineError::store)?;
  if repointed > 0 {
    tracing::debug!(count = repointed, "merge chains collapsed to terminal");
  }

  store
    .append_audit(NewAuditEntry {
      entity_kind: loser.kind,
      entity_id:   loser.entity_id,
      edit_type:   EditType::Merged,
      old_value:   None,
      new_value:   Some(winner.entity_id.to_string()),
      actor:       actor.to_string(),
      source:      None,
    })
    .await
    .map_err(EngineError::store)?;

  Ok(())
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Attach a decision's extracted identifiers to an entity. Raw values were
/// not retained on the decision row, so the normalized form stands in.
async fn attach_decision_identifiers<S: EntityStore>(
  store: &S,
  entity: &Entity,
  decision: &MatchDecision,
) -> Result<()> {
  let pairs = [
    (IdType::Email, decision.extracted_email.clone()),
    (IdType::Phone, decision.extracted_phone.clone()),
  ];
  for (id_type, value) in pairs {
    let Some(norm) = value else { continue };
    store
      .attach_identifier(Identifier {
        entity_id: entity.entity_id,
        id_type,
        value_raw: norm.clone(),
        value_norm: norm,
        confidence: 1.0,
        source_system: decision.source_system,
      })
      .await
      .map_err(EngineError::store)?;
  }
  Ok(())
}

/// Materialise a Person entity from a decision's extracted signals, for
/// actions that need one where the engine created none.
async fn person_from_decision<S: EntityStore>(
  store: &S,
  decision: &MatchDecision,
  actor: &str,
) -> Result<Entity> {
  let display = decision
    .extracted_name
    .clone()
    .unwrap_or_else(|| "unnamed person".to_string());
  let person = store
    .add_entity(EntityKind::Person, display)
    .await
    .map_err(EngineError::store)?;
  store
    .append_audit(NewAuditEntry {
      entity_kind: person.kind,
      entity_id:   person.entity_id,
      edit_type:   EditType::Created,
      old_value:   None,
      new_value:   Some("person created during review".to_string()),
      actor:       actor.to_string(),
      source:      Some(source_system_tag(decision.source_system).to_string()),
    })
    .await
    .map_err(EngineError::store)?;
  attach_decision_identifiers(store, &person, decision).await?;
  Ok(person)
}
