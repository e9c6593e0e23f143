//! Matching configuration — thresholds and Fellegi–Sunter parameters.
//!
//! The engine receives a validated, immutable [`MatchConfig`] snapshot per
//! batch invocation and never mutates it. Writes go through the
//! administrative surface only, which validates before persisting.

use serde::{Deserialize, Serialize};

use crate::{
  error::{Error, Result},
  record::{SourceSystem, source_system_tag},
};

/// A comparison field the scorer knows how to evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
  Email,
  Phone,
  Name,
  Address,
}

impl MatchField {
  pub const ALL: [MatchField; 4] = [
    MatchField::Email,
    MatchField::Phone,
    MatchField::Name,
    MatchField::Address,
  ];
}

/// Per-field Fellegi–Sunter probabilities.
///
/// `m_probability`: chance two records for the *same* entity agree on this
/// field. `u_probability`: chance two records for *different* entities agree
/// by coincidence. Both strictly in (0, 1) — enforced at write time, so the
/// weight computations below are always defined.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsParameter {
  pub field:         MatchField,
  pub m_probability: f64,
  pub u_probability: f64,
}

impl FsParameter {
  /// Log-likelihood ratio added when both sides agree.
  pub fn agreement_weight(&self) -> f64 {
    (self.m_probability / self.u_probability).log2()
  }

  /// Log-likelihood ratio added when both sides are present but disagree.
  /// Negative for any usefully-calibrated field.
  pub fn disagreement_weight(&self) -> f64 {
    ((1.0 - self.m_probability) / (1.0 - self.u_probability)).log2()
  }
}

/// Upper/lower decision thresholds, optionally scoped to one source system.
/// A row with `source_system: None` is the fallback for all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
  #[serde(default)]
  pub source_system:   Option<SourceSystem>,
  pub upper_threshold: f64,
  pub lower_threshold: f64,
}

/// The complete, versioned matching configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
  pub thresholds: Vec<ThresholdConfig>,
  pub parameters: Vec<FsParameter>,
  /// Jaro–Winkler similarity at or above which two names count as agreeing.
  #[serde(default = "default_name_similarity_floor")]
  pub name_similarity_floor: f64,
}

fn default_name_similarity_floor() -> f64 { 0.88 }

impl MatchConfig {
  /// Validate every invariant the scorer and decision engine rely on.
  /// Rejected configurations never reach the engine.
  pub fn validate(&self) -> Result<()> {
    for p in &self.parameters {
      if !(p.m_probability > 0.0 && p.m_probability < 1.0) {
        return Err(Error::ConfigurationInvalid(format!(
          "m_probability for {:?} must lie strictly in (0,1), got {}",
          p.field, p.m_probability
        )));
      }
      if !(p.u_probability > 0.0 && p.u_probability < 1.0) {
        return Err(Error::ConfigurationInvalid(format!(
          "u_probability for {:?} must lie strictly in (0,1), got {}",
          p.field, p.u_probability
        )));
      }
    }
    for t in &self.thresholds {
      if !(t.upper_threshold > t.lower_threshold) {
        let scope = t
          .source_system
          .map(source_system_tag)
          .unwrap_or("default");
        return Err(Error::ConfigurationInvalid(format!(
          "upper_threshold must exceed lower_threshold for {scope}: {} <= {}",
          t.upper_threshold, t.lower_threshold
        )));
      }
    }
    if self.thresholds.iter().all(|t| t.source_system.is_some()) {
      return Err(Error::ConfigurationInvalid(
        "a default threshold row (no source_system) is required".into(),
      ));
    }
    if !(self.name_similarity_floor > 0.0 && self.name_similarity_floor <= 1.0)
    {
      return Err(Error::ConfigurationInvalid(format!(
        "name_similarity_floor must lie in (0,1], got {}",
        self.name_similarity_floor
      )));
    }
    Ok(())
  }

  /// The threshold row governing `source`: the source-specific row when one
  /// exists, the default row otherwise. Errs only on a config that skipped
  /// [`MatchConfig::validate`].
  pub fn thresholds_for(&self, source: SourceSystem) -> Result<&ThresholdConfig> {
    self
      .thresholds
      .iter()
      .find(|t| t.source_system == Some(source))
      .or_else(|| self.thresholds.iter().find(|t| t.source_system.is_none()))
      .ok_or_else(|| {
        Error::ConfigurationInvalid(
          "no threshold row applies and no default row exists".into(),
        )
      })
  }

  pub fn parameter(&self, field: MatchField) -> Option<&FsParameter> {
    self.parameters.iter().find(|p| p.field == field)
  }
}

impl Default for MatchConfig {
  /// Conservative starting calibration; operators are expected to replace
  /// these through the administrative surface.
  fn default() -> Self {
    MatchConfig {
      thresholds: vec![ThresholdConfig {
        source_system:   None,
        upper_threshold: 10.0,
        lower_threshold: 4.0,
      }],
      parameters: vec![
        FsParameter {
          field:         MatchField::Email,
          m_probability: 0.95,
          u_probability: 0.001,
        },
        FsParameter {
          field:         MatchField::Phone,
          m_probability: 0.9,
          u_probability: 0.005,
        },
        FsParameter {
          field:         MatchField::Name,
          m_probability: 0.85,
          u_probability: 0.01,
        },
        FsParameter {
          field:         MatchField::Address,
          m_probability: 0.7,
          u_probability: 0.02,
        },
      ],
      name_similarity_floor: 0.88,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_validates() {
    MatchConfig::default().validate().unwrap();
  }

  #[test]
  fn out_of_range_m_probability_is_rejected() {
    let mut cfg = MatchConfig::default();
    cfg.parameters[0].m_probability = 1.0;
    assert!(matches!(
      cfg.validate(),
      Err(Error::ConfigurationInvalid(_))
    ));
  }

  #[test]
  fn inverted_thresholds_are_rejected() {
    let mut cfg = MatchConfig::default();
    cfg.thresholds[0].upper_threshold = 3.0;
    cfg.thresholds[0].lower_threshold = 5.0;
    assert!(matches!(
      cfg.validate(),
      Err(Error::ConfigurationInvalid(_))
    ));
  }

  #[test]
  fn missing_default_threshold_row_is_rejected() {
    let mut cfg = MatchConfig::default();
    cfg.thresholds[0].source_system = Some(SourceSystem::MasterList);
    assert!(matches!(
      cfg.validate(),
      Err(Error::ConfigurationInvalid(_))
    ));
  }

  #[test]
  fn source_specific_thresholds_shadow_the_default() {
    let mut cfg = MatchConfig::default();
    cfg.thresholds.push(ThresholdConfig {
      source_system:   Some(SourceSystem::ShelterFeed),
      upper_threshold: 14.0,
      lower_threshold: 6.0,
    });
    cfg.validate().unwrap();

    assert_eq!(
      cfg
        .thresholds_for(SourceSystem::ShelterFeed)
        .unwrap()
        .upper_threshold,
      14.0
    );
    assert_eq!(
      cfg
        .thresholds_for(SourceSystem::MasterList)
        .unwrap()
        .upper_threshold,
      10.0
    );
  }

  #[test]
  fn agreement_weight_is_positive_for_sane_parameters() {
    let p = FsParameter {
      field:         MatchField::Email,
      m_probability: 0.95,
      u_probability: 0.001,
    };
    assert!(p.agreement_weight() > 0.0);
    assert!(p.disagreement_weight() < 0.0);
  }
}
