//! Penalty aggregation and sub-score composition
//!
//! Turns an [`AttemptTally`] into the total score and the five sub-scores.
//! Every output is clamped to [0, 100] no matter how large the penalty gets.

use crate::tally::AttemptTally;
use crate::types::{PenaltyKind, Rubric, Subscores};
use serde::{Deserialize, Serialize};

/// Upper bound of every score
pub const MAX_SCORE: f64 = 100.0;

/// One weighted term of the total penalty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyItem {
    pub kind: PenaltyKind,
    /// Scaled quantity the weight multiplies
    pub quantity: f64,
    pub weight: f64,
    pub penalty: f64,
}

/// Clamp a score into [0, 100]; NaN becomes 0
pub fn clamp_score(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_SCORE)
}

/// Seconds spent beyond the rubric's expected time
pub fn time_over_seconds(tally: &AttemptTally, rubric: &Rubric) -> f64 {
    (tally.duration_seconds as f64 - rubric.expected_time_seconds).max(0.0)
}

/// Quantity a penalty kind's weight is multiplied by
///
/// Time over, erratic moves and forbidden contact are scaled down so one unit
/// means ten seconds, ten moves and one second of contact respectively.
fn penalty_quantity(kind: PenaltyKind, tally: &AttemptTally, rubric: &Rubric) -> f64 {
    match kind {
        PenaltyKind::ForbiddenHit => tally.forbidden_hits as f64,
        PenaltyKind::WrongAction => tally.wrong_actions as f64,
        PenaltyKind::StepOmitted => tally.steps_omitted as f64,
        PenaltyKind::TimeOver => time_over_seconds(tally, rubric) / 10.0,
        PenaltyKind::WrongInstrument => tally.wrong_instrument as f64,
        PenaltyKind::ErraticMove => tally.erratic_moves as f64 / 10.0,
        PenaltyKind::ForbiddenContact => tally.forbidden_contact_ms / 1000.0,
        PenaltyKind::ForcefulAction => tally.forceful_actions as f64,
    }
}

/// Itemize the penalty for every recognized infraction kind
pub fn assess_penalties(tally: &AttemptTally, rubric: &Rubric) -> Vec<PenaltyItem> {
    PenaltyKind::ALL
        .into_iter()
        .map(|kind| {
            let quantity = penalty_quantity(kind, tally, rubric);
            let weight = rubric.penalties.weight(kind);
            PenaltyItem {
                kind,
                quantity,
                weight,
                penalty: quantity * weight,
            }
        })
        .collect()
}

/// Total score: `clamp(100 - sum(penalties))`
pub fn compute_total(items: &[PenaltyItem]) -> f64 {
    let total_penalty: f64 = items.iter().map(|item| item.penalty).sum();
    clamp_score(MAX_SCORE - total_penalty)
}

/// Sub-scores, each an independently weighted view of the tally
///
/// ```text
/// precision           = 100 - forbidden_hits*10 - wrong_actions*5
/// efficiency          = 100 - (time_over / expected_time) * 50
/// safety              = 100 - forbidden_hits*15 - (forbidden_contact_ms/1000)*2
/// protocol_adherence  = 100 - (steps_omitted / total_steps) * 100
/// instrument_handling = 100 - wrong_instrument*12 - erratic_moves/10
/// ```
pub fn compute_subscores(tally: &AttemptTally, rubric: &Rubric) -> Subscores {
    let time_over = time_over_seconds(tally, rubric);
    let expected_time = rubric.expected_time_seconds.max(1.0);
    let total_steps = tally.total_steps.max(1) as f64;

    Subscores {
        precision: clamp_score(
            MAX_SCORE - tally.forbidden_hits as f64 * 10.0 - tally.wrong_actions as f64 * 5.0,
        ),
        efficiency: clamp_score(MAX_SCORE - (time_over / expected_time) * 50.0),
        safety: clamp_score(
            MAX_SCORE
                - tally.forbidden_hits as f64 * 15.0
                - (tally.forbidden_contact_ms / 1000.0) * 2.0,
        ),
        protocol_adherence: clamp_score(
            MAX_SCORE - (tally.steps_omitted as f64 / total_steps) * 100.0,
        ),
        instrument_handling: clamp_score(
            MAX_SCORE - tally.wrong_instrument as f64 * 12.0 - tally.erratic_moves as f64 / 10.0,
        ),
    }
}
