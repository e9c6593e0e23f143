//! Match decisions — the audit trail of the engine itself.
//!
//! One decision row is written for every processed record, whatever the
//! outcome, so an auditor can always reconstruct why a record ended up where
//! it did. A decision is immutable once created except for the review
//! fields, which may be set exactly once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{config::MatchField, record::SourceSystem};

/// The engine's verdict for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
  AutoMatch,
  NewEntity,
  ReviewNeeded,
  Rejected,
}

/// The action a reviewer took on a `ReviewNeeded` decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
  Merge,
  KeepSeparate,
  AddToHousehold,
  Reject,
}

/// Filter for listing decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionStatus {
  Pending,
  Reviewed,
}

/// How one comparison field contributed to a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOutcome {
  Agreement,
  Disagreement,
  /// Value absent on either side; contributes exactly zero.
  Missing,
}

/// One field's contribution, retained for transparency in review display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldContribution {
  pub field:   MatchField,
  pub outcome: FieldOutcome,
  pub weight:  f64,
}

/// The persisted decision for one raw record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchDecision {
  pub decision_id:          Uuid,
  pub record_id:            Uuid,
  pub source_system:        SourceSystem,

  // Extracted identity signals, kept for review display and suppression.
  pub extracted_name:       Option<String>,
  pub extracted_email:      Option<String>,
  pub extracted_phone:      Option<String>,

  pub candidates_evaluated: u32,
  pub top_entity_id:        Option<Uuid>,
  pub top_score:            Option<f64>,
  pub decision_type:        DecisionType,
  pub breakdown:            Vec<FieldContribution>,
  /// The entity created or matched by this decision, when the outcome
  /// touched one (`auto_match`, `new_entity`, pseudo-profile on `rejected`).
  pub entity_id:            Option<Uuid>,
  pub created_at:           DateTime<Utc>,

  // Review fields; settable exactly once.
  pub reviewed_at:          Option<DateTime<Utc>>,
  pub reviewed_by:          Option<String>,
  pub review_action:        Option<ReviewAction>,
  pub review_notes:         Option<String>,
}

impl MatchDecision {
  pub fn is_reviewed(&self) -> bool { self.reviewed_at.is_some() }

  /// Suppression key for this decision's candidate signals; mirrors
  /// [`crate::candidate::Candidate::signal_key`].
  pub fn signal_key(&self) -> String {
    format!(
      "{}|{}",
      self.extracted_email.as_deref().unwrap_or(""),
      self.extracted_phone.as_deref().unwrap_or("")
    )
  }
}

/// Input to [`crate::store::EntityStore::record_decision`].
/// `decision_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMatchDecision {
  pub record_id:            Uuid,
  pub source_system:        SourceSystem,
  pub extracted_name:       Option<String>,
  pub extracted_email:      Option<String>,
  pub extracted_phone:      Option<String>,
  pub candidates_evaluated: u32,
  pub top_entity_id:        Option<Uuid>,
  pub top_score:            Option<f64>,
  pub decision_type:        DecisionType,
  pub breakdown:            Vec<FieldContribution>,
  pub entity_id:            Option<Uuid>,
}
