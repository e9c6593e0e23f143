//! Blocking — cheap candidate generation before scoring.
//!
//! Narrows the comparison set with indexed lookups on normalized email and
//! phone, each queried independently, unioned, and de-duplicated. Every hit
//! is resolved to its terminal entity first: the scorer never sees a
//! tombstone. With neither identifier present, blocking returns empty and
//! the scorer is never invoked — a candidate with zero discriminating
//! signal can only become `new_entity` or `review_needed` downstream.

use std::collections::HashSet;

use uuid::Uuid;

use clowder_core::{
  candidate::Candidate,
  entity::{Entity, EntityKind},
  identifier::{IdType, Identifier},
  store::EntityStore,
};

use crate::error::{EngineError, Result};

/// An existing canonical entity plus everything the scorer compares against.
/// Assembled here so scoring stays a pure function.
#[derive(Debug, Clone)]
pub struct EntityProfile {
  pub entity:      Entity,
  pub identifiers: Vec<Identifier>,
  /// Display names of places this person belongs to, for address scoring.
  pub place_names: Vec<String>,
}

/// Generate the candidate set of existing entities worth scoring.
pub async fn block<S: EntityStore>(
  store: &S,
  candidate: &Candidate,
) -> Result<Vec<EntityProfile>> {
  let mut hits: Vec<Uuid> = Vec::new();

  if let Some(email) = candidate.email_norm.as_deref() {
    hits.extend(
      store
        .find_entities_by_identifier(IdType::Email, email)
        .await
        .map_err(EngineError::store)?,
    );
  }
  if let Some(phone) = candidate.phone_norm.as_deref() {
    hits.extend(
      store
        .find_entities_by_identifier(IdType::Phone, phone)
        .await
        .map_err(EngineError::store)?,
    );
  }

  if hits.is_empty() {
    return Ok(Vec::new());
  }

  let mut seen: HashSet<Uuid> = HashSet::new();
  let mut profiles = Vec::new();

  for id in hits {
    let Some(terminal) = store
      .resolve_terminal(id)
      .await
      .map_err(EngineError::store)?
    else {
      // Identifier row pointing at a vanished entity; skip, don't fail the
      // whole record.
      tracing::warn!(%id, "blocking hit references unknown entity");
      continue;
    };
    if !seen.insert(terminal.entity_id) {
      continue;
    }

    let identifiers = store
      .identifiers_for(terminal.entity_id)
      .await
      .map_err(EngineError::store)?;

    let mut place_names = Vec::new();
    if terminal.kind == EntityKind::Person {
      for member in store
        .household_for_person(terminal.entity_id)
        .await
        .map_err(EngineError::store)?
      {
        if let Some(place) = store
          .get_entity(member.place_id)
          .await
          .map_err(EngineError::store)?
        {
          place_names.push(place.display_name);
        }
      }
    }

    profiles.push(EntityProfile { entity: terminal, identifiers, place_names });
  }

  Ok(profiles)
}
