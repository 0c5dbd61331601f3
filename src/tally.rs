//! Event classification and step/instrument matching
//!
//! A single fold over the time-ordered event log. The accumulator carries the
//! infraction counters, the set of steps completed so far, the rolling
//! current tool and the index of the first step still pending, so instrument
//! checks see the procedure state as it was at each action.

use crate::config::EvaluatorConfig;
use crate::schema::{EventKind, SimEvent, ZoneKind};
use crate::types::{Procedure, ProcedureStep, StepId};
use std::collections::BTreeSet;

/// Counters extracted from one attempt's event log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttemptTally {
    pub forbidden_hits: u32,
    pub target_hits: u32,
    pub wrong_actions: u32,
    /// Summed dwell time inside the forbidden zone (ms)
    pub forbidden_contact_ms: f64,
    pub forceful_actions: u32,
    pub move_events: u32,
    /// Distinct step ids reported complete (including ids the procedure does not define)
    pub completed_steps: BTreeSet<StepId>,
    pub wrong_instrument: u32,
    /// Number of procedure steps, never less than 1
    pub total_steps: u32,
    pub steps_completed: u32,
    pub steps_omitted: u32,
    /// Move events in excess of the allowed motion density
    pub erratic_moves: u32,
    /// Elapsed seconds the tally was computed against
    pub duration_seconds: u64,
}

/// Fold accumulator threaded through the event scan
struct ScanState<'p> {
    steps: &'p [ProcedureStep],
    forceful_threshold: f64,
    pending: usize,
    current_tool: Option<String>,
    tally: AttemptTally,
}

impl<'p> ScanState<'p> {
    fn new(steps: &'p [ProcedureStep], forceful_threshold: f64) -> Self {
        Self {
            steps,
            forceful_threshold,
            pending: 0,
            current_tool: None,
            tally: AttemptTally::default(),
        }
    }

    fn apply(mut self, event: &SimEvent) -> Self {
        match &event.kind {
            EventKind::Hit { zone } => match zone {
                Some(ZoneKind::Forbidden) => self.tally.forbidden_hits += 1,
                Some(ZoneKind::Target) => self.tally.target_hits += 1,
                _ => {}
            },
            EventKind::Error { .. } => self.tally.wrong_actions += 1,
            EventKind::ContactDuration {
                zone: Some(ZoneKind::Forbidden),
                duration_ms,
            } => self.tally.forbidden_contact_ms += duration_ms,
            EventKind::ContactDuration { .. } => {}
            EventKind::StepCompleted { step_id: Some(id) } => {
                self.tally.completed_steps.insert(id.clone());
                self.advance_pending();
            }
            EventKind::StepCompleted { step_id: None } => {}
            EventKind::ToolSelect { tool } => {
                if let Some(tool) = tool {
                    self.current_tool = Some(tool.clone());
                }
            }
            EventKind::Action {
                tool, intensity, ..
            } => {
                if *intensity >= self.forceful_threshold {
                    self.tally.forceful_actions += 1;
                }
                if let Some(tool) = tool {
                    self.current_tool = Some(tool.clone());
                }
                self.check_instrument();
            }
            EventKind::Move => self.tally.move_events += 1,
            EventKind::Unknown { .. } => {}
        }
        self
    }

    /// Skip past every leading step that is already complete
    fn advance_pending(&mut self) {
        while let Some(step) = self.steps.get(self.pending) {
            if !self.tally.completed_steps.contains(&step.id) {
                break;
            }
            self.pending += 1;
        }
    }

    fn check_instrument(&mut self) {
        let (Some(tool), Some(step)) = (self.current_tool.as_deref(), self.steps.get(self.pending))
        else {
            return;
        };
        if step.instruments.is_empty() {
            return;
        }
        if !step.instruments.iter().any(|expected| expected == tool) {
            self.tally.wrong_instrument += 1;
        }
    }
}

/// Classify events and match them against the procedure's steps
pub fn tally_attempt(
    events: &[SimEvent],
    procedure: &Procedure,
    duration_seconds: u64,
    config: &EvaluatorConfig,
) -> AttemptTally {
    let state = events.iter().fold(
        ScanState::new(&procedure.steps, config.forceful_intensity_threshold),
        ScanState::apply,
    );
    let mut tally = state.tally;

    tally.duration_seconds = duration_seconds;
    tally.total_steps = (procedure.steps.len() as u32).max(1);
    tally.steps_completed = procedure
        .steps
        .iter()
        .filter(|step| tally.completed_steps.contains(&step.id))
        .count() as u32;
    // `total_steps` only guards the adherence ratio; an empty procedure omits nothing
    tally.steps_omitted = (procedure.steps.len() as u32).saturating_sub(tally.steps_completed);
    tally.erratic_moves = compute_erratic_moves(
        tally.move_events,
        duration_seconds,
        config.max_moves_per_second,
    );

    tally
}

/// Move events beyond `max_moves_per_second` per elapsed second
///
/// Formula: `max(moves - duration_seconds * max_moves_per_second, 0)`
fn compute_erratic_moves(move_events: u32, duration_seconds: u64, max_moves_per_second: f64) -> u32 {
    let allowed = duration_seconds as f64 * max_moves_per_second;
    (move_events as f64 - allowed).max(0.0).ceil() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{RawEvent, RawEventAdapter};
    use serde_json::json;

    fn procedure() -> Procedure {
        Procedure::from_json(
            r#"{
                "steps": [
                    {"id": 1, "title": "Incision", "instruments": ["SCALPEL"], "actions": ["CUT"]},
                    {"id": 2, "title": "Identify", "instruments": ["FORCEPS"], "actions": ["GRAB"]},
                    {"id": 3, "title": "Close", "instruments": ["NEEDLE_DRIVER"], "actions": ["SUTURE"]}
                ]
            }"#,
        )
        .unwrap()
    }

    fn tally(events: Vec<RawEvent>, duration_seconds: u64) -> AttemptTally {
        let log = RawEventAdapter::ingest(&events);
        tally_attempt(
            &log.events,
            &procedure(),
            duration_seconds,
            &EvaluatorConfig::default(),
        )
    }

    #[test]
    fn test_zone_classification() {
        let t = tally(
            vec![
                RawEvent::new("hit", 10, json!({"zone": "forbidden"})),
                RawEvent::new("hit", 20, json!({"zone": "target"})),
                RawEvent::new("hit", 30, json!({"zone": "target"})),
                RawEvent::new("hit", 40, json!({"zone": "elsewhere"})),
                RawEvent::new("hit", 50, json!({})),
                RawEvent::new("error", 60, json!({"code": "WRONG_ACTION"})),
            ],
            60,
        );
        assert_eq!(t.forbidden_hits, 1);
        assert_eq!(t.target_hits, 2);
        assert_eq!(t.wrong_actions, 1);
    }

    #[test]
    fn test_forbidden_contact_sums_only_forbidden_zone() {
        let t = tally(
            vec![
                RawEvent::new("contact_duration", 10, json!({"zone": "forbidden", "duration_ms": 1500})),
                RawEvent::new("contact_duration", 20, json!({"zone": "target", "duration_ms": 9000})),
                RawEvent::new("contact_duration", 30, json!({"zone": "forbidden", "duration_ms": 500})),
            ],
            60,
        );
        assert_eq!(t.forbidden_contact_ms, 2000.0);
        assert_eq!(t.forbidden_hits, 0);
    }

    #[test]
    fn test_forceful_threshold_inclusive() {
        let t = tally(
            vec![
                RawEvent::new("action", 10, json!({"intensity": 7.9})),
                RawEvent::new("action", 20, json!({"intensity": 8})),
                RawEvent::new("action", 30, json!({"intensity": 10})),
            ],
            60,
        );
        assert_eq!(t.forceful_actions, 2);
    }

    #[test]
    fn test_duplicate_step_completion_collapses() {
        let t = tally(
            vec![
                RawEvent::new("step_completed", 10, json!({"step_id": 1})),
                RawEvent::new("step_completed", 20, json!({"step_id": 1})),
                RawEvent::new("step_completed", 30, json!({"step_id": "1"})),
            ],
            60,
        );
        assert_eq!(t.completed_steps.len(), 1);
        assert_eq!(t.steps_completed, 1);
        assert_eq!(t.steps_omitted, 2);
        assert_eq!(t.total_steps, 3);
    }

    #[test]
    fn test_unknown_step_ids_do_not_count() {
        let t = tally(
            vec![RawEvent::new("step_completed", 10, json!({"step_id": 99}))],
            60,
        );
        assert_eq!(t.steps_completed, 0);
        assert_eq!(t.steps_omitted, 3);
    }

    #[test]
    fn test_wrong_instrument_follows_pending_step() {
        let t = tally(
            vec![
                // pending step 1 expects SCALPEL
                RawEvent::new("action", 10, json!({"tool": "SCALPEL"})),
                RawEvent::new("step_completed", 20, json!({"step_id": 1})),
                // pending step 2 expects FORCEPS
                RawEvent::new("action", 30, json!({"tool": "SCALPEL"})),
                RawEvent::new("action", 40, json!({"tool": "FORCEPS"})),
            ],
            60,
        );
        assert_eq!(t.wrong_instrument, 1);
    }

    #[test]
    fn test_current_tool_from_tool_select() {
        let t = tally(
            vec![
                RawEvent::new("tool_select", 5, json!({"tool": "FORCEPS"})),
                // no explicit tool: falls back to FORCEPS, step 1 wants SCALPEL
                RawEvent::new("action", 10, json!({"type": "CUT"})),
                RawEvent::new("tool_select", 15, json!({"tool": "SCALPEL"})),
                RawEvent::new("action", 20, json!({"type": "CUT"})),
            ],
            60,
        );
        assert_eq!(t.wrong_instrument, 1);
    }

    #[test]
    fn test_explicit_tool_updates_current_tool() {
        let t = tally(
            vec![
                RawEvent::new("action", 10, json!({"tool": "CAUTERY"})),
                RawEvent::new("action", 20, json!({})),
            ],
            60,
        );
        assert_eq!(t.wrong_instrument, 2);
    }

    #[test]
    fn test_no_tool_known_means_no_check() {
        let t = tally(vec![RawEvent::new("action", 10, json!({"intensity": 2}))], 60);
        assert_eq!(t.wrong_instrument, 0);
    }

    #[test]
    fn test_no_check_once_all_steps_complete() {
        let t = tally(
            vec![
                RawEvent::new("step_completed", 10, json!({"step_id": 1})),
                RawEvent::new("step_completed", 20, json!({"step_id": 2})),
                RawEvent::new("step_completed", 30, json!({"step_id": 3})),
                RawEvent::new("action", 40, json!({"tool": "CAUTERY"})),
            ],
            60,
        );
        assert_eq!(t.wrong_instrument, 0);
        assert_eq!(t.steps_omitted, 0);
    }

    #[test]
    fn test_pending_step_skips_out_of_order_completions() {
        let t = tally(
            vec![
                RawEvent::new("step_completed", 10, json!({"step_id": 2})),
                // step 1 is still the first pending step
                RawEvent::new("action", 20, json!({"tool": "FORCEPS"})),
                RawEvent::new("step_completed", 30, json!({"step_id": 1})),
                // 1 and 2 both done: step 3 is pending
                RawEvent::new("action", 40, json!({"tool": "NEEDLE_DRIVER"})),
            ],
            60,
        );
        assert_eq!(t.wrong_instrument, 1);
    }

    #[test]
    fn test_empty_instrument_list_is_unconstrained() {
        let procedure = Procedure::from_json(r#"{"steps": [{"id": "a"}]}"#).unwrap();
        let log = RawEventAdapter::ingest(&[RawEvent::new("action", 0, json!({"tool": "ANY"}))]);
        let t = tally_attempt(&log.events, &procedure, 10, &EvaluatorConfig::default());
        assert_eq!(t.wrong_instrument, 0);
    }

    #[test]
    fn test_empty_procedure_guards_total_steps() {
        let procedure = Procedure::default();
        let t = tally_attempt(&[], &procedure, 0, &EvaluatorConfig::default());
        assert_eq!(t.total_steps, 1);
        assert_eq!(t.steps_completed, 0);
        assert_eq!(t.steps_omitted, 0);
    }

    #[test]
    fn test_erratic_moves() {
        assert_eq!(compute_erratic_moves(10, 2, 6.0), 0);
        assert_eq!(compute_erratic_moves(12, 2, 6.0), 0);
        assert_eq!(compute_erratic_moves(20, 2, 6.0), 8);
        assert_eq!(compute_erratic_moves(5, 0, 6.0), 5);
        assert_eq!(compute_erratic_moves(20, 3, 6.5), 1);
    }

    #[test]
    fn test_move_events_counted() {
        let events = (0..30)
            .map(|i| RawEvent::new("move", i * 10, json!({"x": 0.1, "y": 1.0, "z": 0.2})))
            .collect();
        let t = tally(events, 4);
        assert_eq!(t.move_events, 30);
        assert_eq!(t.erratic_moves, 6);
    }
}
