//! The Fellegi–Sunter scorer.
//!
//! For each configured comparison field with values on both sides, adds
//! `log2(m/u)` on agreement or `log2((1-m)/(1-u))` on disagreement. A field
//! missing on either side contributes exactly zero — missing data is
//! uninformative, not penalized. Per-field contributions are retained in
//! the breakdown for review display, never discarded after summation.

use strsim::jaro_winkler;

use clowder_core::{
  candidate::Candidate,
  config::{MatchConfig, MatchField},
  decision::{FieldContribution, FieldOutcome},
  identifier::IdType,
};

use crate::blocker::EntityProfile;

/// The scorer's output for one (candidate, entity) pair.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
  pub total:  f64,
  pub fields: Vec<FieldContribution>,
}

/// Presence/agreement state of one field across the pair.
enum Comparison {
  Missing,
  Agrees,
  Disagrees,
}

fn compare_identifier(
  candidate_value: Option<&str>,
  profile: &EntityProfile,
  id_type: IdType,
) -> Comparison {
  let entity_values: Vec<&str> = profile
    .identifiers
    .iter()
    .filter(|i| i.id_type == id_type)
    .map(|i| i.value_norm.as_str())
    .collect();

  match (candidate_value, entity_values.is_empty()) {
    (None, _) | (Some(_), true) => Comparison::Missing,
    (Some(v), false) => {
      if entity_values.contains(&v) {
        Comparison::Agrees
      } else {
        Comparison::Disagrees
      }
    }
  }
}

fn compare_name(
  candidate: &Candidate,
  profile: &EntityProfile,
  floor: f64,
) -> Comparison {
  let Some(name) = candidate.display_name() else {
    return Comparison::Missing;
  };
  let entity_name = profile.entity.display_name.trim();
  if entity_name.is_empty() {
    return Comparison::Missing;
  }
  let similarity =
    jaro_winkler(&name.to_lowercase(), &entity_name.to_lowercase());
  if similarity >= floor {
    Comparison::Agrees
  } else {
    Comparison::Disagrees
  }
}

fn compare_address(
  candidate: &Candidate,
  profile: &EntityProfile,
  floor: f64,
) -> Comparison {
  let Some(address) = candidate.address_raw.as_deref() else {
    return Comparison::Missing;
  };
  if profile.place_names.is_empty() {
    return Comparison::Missing;
  }
  let address = address.to_lowercase();
  let best = profile
    .place_names
    .iter()
    .map(|p| jaro_winkler(&address, &p.to_lowercase()))
    .fold(0.0_f64, f64::max);
  if best >= floor {
    Comparison::Agrees
  } else {
    Comparison::Disagrees
  }
}

/// Score one candidate against one blocked entity profile.
pub fn score(
  candidate: &Candidate,
  profile: &EntityProfile,
  config: &MatchConfig,
) -> ScoreBreakdown {
  let mut fields = Vec::new();
  let mut total = 0.0;

  for field in MatchField::ALL {
    // Fields without calibrated parameters are not compared at all.
    let Some(params) = config.parameter(field) else { continue };

    let comparison = match field {
      MatchField::Email => compare_identifier(
        candidate.email_norm.as_deref(),
        profile,
        IdType::Email,
      ),
      MatchField::Phone => compare_identifier(
        candidate.phone_norm.as_deref(),
        profile,
        IdType::Phone,
      ),
      MatchField::Name => {
        compare_name(candidate, profile, config.name_similarity_floor)
      }
      MatchField::Address => {
        compare_address(candidate, profile, config.name_similarity_floor)
      }
    };

    let (outcome, weight) = match comparison {
      Comparison::Missing => (FieldOutcome::Missing, 0.0),
      Comparison::Agrees => {
        (FieldOutcome::Agreement, params.agreement_weight())
      }
      Comparison::Disagrees => {
        (FieldOutcome::Disagreement, params.disagreement_weight())
      }
    };

    total += weight;
    fields.push(FieldContribution { field, outcome, weight });
  }

  ScoreBreakdown { total, fields }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;
  use clowder_core::{
    candidate::Candidate,
    config::MatchConfig,
    decision::FieldOutcome,
    entity::{Entity, EntityKind},
    identifier::{IdType, Identifier},
    record::SourceSystem,
  };
  use uuid::Uuid;

  use super::*;

  fn profile(
    name: &str,
    email: Option<&str>,
    phone: Option<&str>,
  ) -> EntityProfile {
    let entity_id = Uuid::new_v4();
    let mut identifiers = Vec::new();
    if let Some(e) = email {
      identifiers.push(Identifier {
        entity_id,
        id_type: IdType::Email,
        value_raw: e.to_string(),
        value_norm: e.to_string(),
        confidence: 1.0,
        source_system: SourceSystem::MasterList,
      });
    }
    if let Some(p) = phone {
      identifiers.push(Identifier {
        entity_id,
        id_type: IdType::Phone,
        value_raw: p.to_string(),
        value_norm: p.to_string(),
        confidence: 1.0,
        source_system: SourceSystem::MasterList,
      });
    }
    EntityProfile {
      entity: Entity {
        entity_id,
        kind: EntityKind::Person,
        display_name: name.to_string(),
        created_at: Utc::now(),
        merged_into: None,
      },
      identifiers,
      place_names: vec![],
    }
  }

  fn candidate(email: Option<&str>, phone: Option<&str>) -> Candidate {
    Candidate {
      first_name: Some("Maria".into()),
      last_name:  Some("Alvarez".into()),
      email_norm: email.map(str::to_string),
      phone_norm: phone.map(str::to_string),
      ..Default::default()
    }
  }

  #[test]
  fn email_agreement_adds_positive_weight() {
    let config = MatchConfig::default();
    let p = profile("Maria Alvarez", Some("m@example.com"), None);
    let breakdown = score(&candidate(Some("m@example.com"), None), &p, &config);

    let email = breakdown
      .fields
      .iter()
      .find(|f| f.field == MatchField::Email)
      .unwrap();
    assert_eq!(email.outcome, FieldOutcome::Agreement);
    assert!(email.weight > 0.0);
    assert!(breakdown.total > 0.0);
  }

  #[test]
  fn email_disagreement_subtracts() {
    let config = MatchConfig::default();
    let p = profile("Maria Alvarez", Some("other@example.com"), None);
    let breakdown = score(&candidate(Some("m@example.com"), None), &p, &config);

    let email = breakdown
      .fields
      .iter()
      .find(|f| f.field == MatchField::Email)
      .unwrap();
    assert_eq!(email.outcome, FieldOutcome::Disagreement);
    assert!(email.weight < 0.0);
  }

  #[test]
  fn missing_field_contributes_exactly_zero() {
    let config = MatchConfig::default();
    // Phone present on candidate only vs. absent on both sides: everything
    // else identical, so totals must be identical too.
    let p = profile("Maria Alvarez", Some("m@example.com"), None);

    let with_phone =
      score(&candidate(Some("m@example.com"), Some("5551234567")), &p, &config);
    let without_phone =
      score(&candidate(Some("m@example.com"), None), &p, &config);

    let phone_of = |b: &ScoreBreakdown| {
      b.fields
        .iter()
        .find(|f| f.field == MatchField::Phone)
        .map(|f| f.weight)
        .unwrap()
    };
    assert_eq!(phone_of(&with_phone), 0.0);
    assert_eq!(phone_of(&without_phone), 0.0);
    assert_eq!(with_phone.total, without_phone.total);
  }

  #[test]
  fn scores_differ_only_by_the_phone_field_weight() {
    let config = MatchConfig::default();
    let p = profile(
      "Maria Alvarez",
      Some("m@example.com"),
      Some("5551234567"),
    );

    let with_phone =
      score(&candidate(Some("m@example.com"), Some("5551234567")), &p, &config);
    let without_phone =
      score(&candidate(Some("m@example.com"), None), &p, &config);

    let phone_weight = config
      .parameter(MatchField::Phone)
      .unwrap()
      .agreement_weight();
    assert!(
      (with_phone.total - without_phone.total - phone_weight).abs() < 1e-9
    );
  }

  #[test]
  fn close_names_agree_distant_names_do_not() {
    let config = MatchConfig::default();
    let close = profile("Maria Alvarez", None, Some("5551234567"));
    let distant = profile("Robert Chen", None, Some("5551234567"));
    let c = candidate(None, Some("5551234567"));

    let name_outcome = |p: &EntityProfile| {
      score(&c, p, &config)
        .fields
        .into_iter()
        .find(|f| f.field == MatchField::Name)
        .unwrap()
        .outcome
    };
    assert_eq!(name_outcome(&close), FieldOutcome::Agreement);
    assert_eq!(name_outcome(&distant), FieldOutcome::Disagreement);
  }

  #[test]
  fn breakdown_retains_every_configured_field() {
    let config = MatchConfig::default();
    let p = profile("Maria Alvarez", Some("m@example.com"), None);
    let breakdown = score(&candidate(Some("m@example.com"), None), &p, &config);
    assert_eq!(breakdown.fields.len(), config.parameters.len());
  }
}
