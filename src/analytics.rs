//! Per-procedure score aggregation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A completed attempt's total, as kept by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredAttempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainee_id: Option<String>,
    pub procedure_id: String,
    pub total: f64,
}

/// Aggregate totals for one procedure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSummary {
    pub procedure_id: String,
    pub attempts: u32,
    pub average_total: f64,
    pub best_total: f64,
    pub worst_total: f64,
}

/// Summarize attempts per procedure, sorted by procedure id
///
/// Attempts with a non-finite total are skipped.
pub fn summarize_by_procedure(attempts: &[ScoredAttempt]) -> Vec<ProcedureSummary> {
    let mut groups: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for attempt in attempts.iter().filter(|a| a.total.is_finite()) {
        groups
            .entry(attempt.procedure_id.as_str())
            .or_default()
            .push(attempt.total);
    }

    groups
        .into_iter()
        .map(|(procedure_id, totals)| {
            let sum: f64 = totals.iter().sum();
            ProcedureSummary {
                procedure_id: procedure_id.to_string(),
                attempts: totals.len() as u32,
                average_total: sum / totals.len() as f64,
                best_total: totals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                worst_total: totals.iter().copied().fold(f64::INFINITY, f64::min),
            }
        })
        .collect()
}
