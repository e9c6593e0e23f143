//! Threshold banding and best-candidate selection.
//!
//! Pure helpers for the decision state machine in [`crate::batch`]. Kept
//! separate so the threshold contract is independently testable.

use clowder_core::config::ThresholdConfig;

use crate::{blocker::EntityProfile, scorer::ScoreBreakdown};

/// Where a score lands relative to the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
  /// `score >= upper_threshold` — safe to merge automatically.
  AboveUpper,
  /// `score <= lower_threshold` — clearly a different entity.
  BelowLower,
  /// Strictly between — a human has to look.
  Between,
}

pub fn band(score: f64, thresholds: &ThresholdConfig) -> Band {
  if score >= thresholds.upper_threshold {
    Band::AboveUpper
  } else if score <= thresholds.lower_threshold {
    Band::BelowLower
  } else {
    Band::Between
  }
}

/// Index of the best-scoring profile. Highest total wins; ties break on
/// earliest entity creation time so re-runs are deterministic.
pub fn pick_best(scored: &[(EntityProfile, ScoreBreakdown)]) -> Option<usize> {
  let mut best: Option<usize> = None;
  for (i, (profile, breakdown)) in scored.iter().enumerate() {
    let better = match best {
      None => true,
      Some(j) => {
        let (best_profile, best_breakdown) = &scored[j];
        breakdown.total > best_breakdown.total
          || (breakdown.total == best_breakdown.total
            && profile.entity.created_at < best_profile.entity.created_at)
      }
    };
    if better {
      best = Some(i);
    }
  }
  best
}
