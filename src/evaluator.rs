//! Attempt evaluation
//!
//! Orchestrates ingestion, the event fold, penalty aggregation, sub-scores and
//! feedback into a single [`ScoreResult`]. Evaluation is a pure function of the
//! attempt, the procedure and the configuration: it reads no clock, performs
//! no I/O and never fails. Malformed input degrades to neutral defaults.

use crate::config::EvaluatorConfig;
use crate::feedback::generate_feedback;
use crate::schema::{EvaluationFlag, EventKind, RawEventAdapter};
use crate::scoring::{assess_penalties, compute_subscores, compute_total, time_over_seconds, PenaltyItem};
use crate::tally::{tally_attempt, AttemptTally};
use crate::types::{Attempt, Procedure, ScoreBreakdown, ScoreResult};

/// Score an attempt with the default configuration
pub fn evaluate(attempt: &Attempt, procedure: &Procedure) -> ScoreResult {
    AttemptEvaluator::new().evaluate(attempt, procedure)
}

/// A score together with what ingestion had to repair and the itemized penalty
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub result: ScoreResult,
    pub flags: Vec<EvaluationFlag>,
    pub penalties: Vec<PenaltyItem>,
}

/// Evaluator bound to a configuration
#[derive(Debug, Clone, Default)]
pub struct AttemptEvaluator {
    config: EvaluatorConfig,
}

impl AttemptEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// Score an attempt against a procedure
    pub fn evaluate(&self, attempt: &Attempt, procedure: &Procedure) -> ScoreResult {
        self.evaluate_detailed(attempt, procedure).result
    }

    /// Score an attempt and keep the ingestion flags and penalty items
    pub fn evaluate_detailed(&self, attempt: &Attempt, procedure: &Procedure) -> Evaluation {
        let log = RawEventAdapter::ingest(&attempt.events);
        let duration_seconds = attempt.effective_duration_seconds();

        let tally = tally_attempt(&log.events, procedure, duration_seconds, &self.config);
        let time_over = time_over_seconds(&tally, &procedure.rubric);

        let penalties = assess_penalties(&tally, &procedure.rubric);
        let total = compute_total(&penalties);
        let subscores = compute_subscores(&tally, &procedure.rubric);
        let scored_events = log
            .events
            .iter()
            .filter(|e| !matches!(e.kind, EventKind::Unknown { .. }))
            .count();
        let feedback = generate_feedback(&tally, time_over, scored_events, &self.config);

        let algorithm_version = procedure
            .rubric
            .version
            .clone()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| self.config.default_algorithm_version.clone());

        tracing::debug!(
            procedure = procedure.id.as_deref().unwrap_or("-"),
            events = log.events.len(),
            total,
            steps_omitted = tally.steps_omitted,
            wrong_instrument = tally.wrong_instrument,
            "evaluated attempt"
        );

        Evaluation {
            result: ScoreResult {
                total,
                subscores,
                breakdown: breakdown_from(&tally, time_over),
                feedback,
                algorithm_version,
            },
            flags: log.flags,
            penalties,
        }
    }
}

fn breakdown_from(tally: &AttemptTally, time_over_seconds: f64) -> ScoreBreakdown {
    ScoreBreakdown {
        forbidden_hits: tally.forbidden_hits,
        target_hits: tally.target_hits,
        wrong_actions: tally.wrong_actions,
        forbidden_contact_ms: tally.forbidden_contact_ms,
        forceful_actions: tally.forceful_actions,
        steps_completed: tally.steps_completed,
        steps_omitted: tally.steps_omitted,
        time_over_seconds,
        wrong_instrument: tally.wrong_instrument,
        erratic_moves: tally.erratic_moves,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::{positive_sentence, FeedbackCondition, Locale};
    use crate::schema::RawEvent;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn two_step_procedure() -> Procedure {
        Procedure::from_json(
            r#"{
                "steps": [{"id": 1, "title": "Open"}, {"id": 2, "title": "Close"}],
                "rubric": {"expected_time_seconds": 120}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_scenario_mixed_infractions() {
        let attempt = Attempt::new(
            150,
            vec![
                RawEvent::new("hit", 100, json!({"zone": "forbidden"})),
                RawEvent::new("step_completed", 200, json!({"step_id": 1})),
                RawEvent::new("error", 250, json!({})),
            ],
        );

        let result = evaluate(&attempt, &two_step_procedure());
        assert_eq!(result.breakdown.steps_omitted, 1);
        assert_eq!(result.breakdown.forbidden_hits, 1);
        assert_eq!(result.breakdown.wrong_actions, 1);
        assert_eq!(result.breakdown.time_over_seconds, 30.0);
        assert!(result.total < 100.0);
        assert!(result.subscores.protocol_adherence < 100.0);
        assert!(!result.feedback.is_empty());
        // 6 + 4 + 5 + 3 penalty points
        assert_eq!(result.total, 82.0);
    }

    #[test]
    fn test_scenario_all_steps_under_time() {
        let attempt = Attempt::new(
            100,
            vec![
                RawEvent::new("step_completed", 100, json!({"step_id": 1})),
                RawEvent::new("step_completed", 200, json!({"step_id": 2})),
            ],
        );

        let result = evaluate(&attempt, &two_step_procedure());
        assert!(result.total >= 90.0);
        assert_eq!(result.subscores.protocol_adherence, 100.0);
        assert_eq!(result.breakdown.steps_omitted, 0);
    }

    #[test]
    fn test_scenario_empty_log() {
        let attempt = Attempt::new(0, vec![]);
        let result = evaluate(&attempt, &Procedure::default());
        assert_eq!(result.total, 100.0);
        assert_eq!(result.feedback, vec![positive_sentence(Locale::En).to_string()]);
        assert_eq!(result.algorithm_version, "v1");
    }

    #[test]
    fn test_algorithm_version_from_rubric() {
        let procedure =
            Procedure::from_json(r#"{"rubric": {"version": "rules_v2"}}"#).unwrap();
        let result = evaluate(&Attempt::default(), &procedure);
        assert_eq!(result.algorithm_version, "rules_v2");
    }

    #[test]
    fn test_configured_default_version() {
        let evaluator = AttemptEvaluator::with_config(EvaluatorConfig {
            default_algorithm_version: "rules_v3".to_string(),
            ..Default::default()
        });
        let result = evaluator.evaluate(&Attempt::default(), &Procedure::default());
        assert_eq!(result.algorithm_version, "rules_v3");
    }

    #[test]
    fn test_detailed_reports_flags_and_penalties() {
        let attempt = Attempt::new(
            60,
            vec![
                RawEvent::new("hit", 500, json!({"zone": "target"})),
                RawEvent::new("warp", 100, json!({})),
            ],
        );

        let evaluation = AttemptEvaluator::new().evaluate_detailed(&attempt, &two_step_procedure());
        assert!(evaluation.flags.contains(&EvaluationFlag::EventsReordered));
        assert!(evaluation.flags.contains(&EvaluationFlag::UnknownEventTypes));
        assert_eq!(evaluation.penalties.len(), 8);
        assert_eq!(evaluation.result.breakdown.target_hits, 1);
    }

    #[test]
    fn test_malformed_payloads_never_fail() {
        let attempt = Attempt::new(
            -5,
            vec![
                RawEvent::new("contact_duration", -40, json!("garbage")),
                RawEvent::new("action", 10, json!({"intensity": "high", "tool": 7})),
                RawEvent::new("step_completed", 20, json!({"step_id": null})),
            ],
        );

        let result = evaluate(&attempt, &two_step_procedure());
        assert_eq!(result.breakdown.forbidden_contact_ms, 0.0);
        assert_eq!(result.breakdown.forceful_actions, 0);
        assert_eq!(result.breakdown.steps_omitted, 2);
        assert_eq!(result.breakdown.time_over_seconds, 0.0);
    }

    #[test]
    fn test_unrecognized_events_do_not_trigger_target_note() {
        let attempt = Attempt::new(
            0,
            vec![
                RawEvent::new("heartbeat", 0, json!({})),
                RawEvent::new("", 5, json!({})),
            ],
        );
        let result = evaluate(&attempt, &Procedure::default());
        assert_eq!(result.feedback, vec![positive_sentence(Locale::En).to_string()]);
    }

    #[test]
    fn test_feedback_follows_locale() {
        let evaluator =
            AttemptEvaluator::with_config(EvaluatorConfig::default().with_locale(Locale::Es));
        let attempt = Attempt::new(
            10,
            vec![RawEvent::new("hit", 0, json!({"zone": "forbidden"}))],
        );

        let result = evaluator.evaluate(&attempt, &two_step_procedure());
        assert_eq!(
            result.feedback[0],
            FeedbackCondition::ForbiddenHit.sentence(Locale::Es)
        );
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let attempt = Attempt::new(
            140,
            vec![
                RawEvent::new("tool_select", 0, json!({"tool": "SCALPEL"})),
                RawEvent::new("action", 10, json!({"intensity": 9})),
                RawEvent::new("contact_duration", 20, json!({"zone": "forbidden", "duration_ms": 750})),
            ],
        );
        let procedure = two_step_procedure();

        let first = serde_json::to_string(&evaluate(&attempt, &procedure)).unwrap();
        let second = serde_json::to_string(&evaluate(&attempt, &procedure)).unwrap();
        assert_eq!(first, second);
    }
}
