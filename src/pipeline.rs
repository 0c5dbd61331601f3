//! Pipeline orchestration
//!
//! Public entry points that take attempt and procedure JSON, run the
//! evaluator and hand back the encoded score report.

use crate::baseline::TraineeProgress;
use crate::config::EvaluatorConfig;
use crate::encoder::ScoreReportEncoder;
use crate::error::ScoreError;
use crate::evaluator::AttemptEvaluator;
use crate::types::{Attempt, Procedure};

/// Score one attempt and return the report JSON.
///
/// Stateless: no progress context is attached.
///
/// # Example
/// ```ignore
/// let report_json = score_attempt_json(&attempt_json, &procedure_json)?;
/// ```
pub fn score_attempt_json(attempt_json: &str, procedure_json: &str) -> Result<String, ScoreError> {
    let attempt = Attempt::from_json(attempt_json)?;
    let procedure = Procedure::from_json(procedure_json)?;

    let evaluation = AttemptEvaluator::new().evaluate_detailed(&attempt, &procedure);
    ScoreReportEncoder::new().encode_to_json(&attempt, &procedure, &evaluation, None)
}

/// Stateful processor that tracks each trainee's progress across attempts.
///
/// Attempts are grouped by `trainee_id`; those without one share a single window.
pub struct ScoringProcessor {
    evaluator: AttemptEvaluator,
    progress: TraineeProgress,
    encoder: ScoreReportEncoder,
}

impl Default for ScoringProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringProcessor {
    pub fn new() -> Self {
        Self::with_config(EvaluatorConfig::default())
    }

    pub fn with_config(config: EvaluatorConfig) -> Self {
        Self {
            evaluator: AttemptEvaluator::with_config(config),
            progress: TraineeProgress::default(),
            encoder: ScoreReportEncoder::new(),
        }
    }

    /// Processor with a specific progress window size
    pub fn with_progress_window(mut self, window_size: usize) -> Self {
        self.progress = TraineeProgress::new(window_size);
        self
    }

    /// Score an attempt, fold it into its trainee's window and return the report JSON
    pub fn process(&mut self, attempt_json: &str, procedure_json: &str) -> Result<String, ScoreError> {
        let attempt = Attempt::from_json(attempt_json)?;
        let procedure = Procedure::from_json(procedure_json)?;
        self.process_attempt(&attempt, &procedure)
    }

    pub fn process_attempt(
        &mut self,
        attempt: &Attempt,
        procedure: &Procedure,
    ) -> Result<String, ScoreError> {
        let evaluation = self.evaluator.evaluate_detailed(attempt, procedure);
        let progress = self
            .progress
            .update_and_contextualize(attempt.trainee_id.as_deref(), &evaluation.result);
        self.encoder
            .encode_to_json(attempt, procedure, &evaluation, Some(progress))
    }

    /// Load progress state from JSON
    pub fn load_progress(&mut self, json: &str) -> Result<(), ScoreError> {
        self.progress =
            TraineeProgress::from_json(json).map_err(|e| ScoreError::ParseError(e.to_string()))?;
        Ok(())
    }

    /// Save progress state to JSON
    pub fn save_progress(&self) -> Result<String, ScoreError> {
        self.progress
            .to_json()
            .map_err(|e| ScoreError::EncodingError(e.to_string()))
    }

    /// Attempts held across all trainees
    pub fn progress_attempt_count(&self) -> usize {
        self.progress.attempt_count()
    }

    pub fn trainee_attempt_count(&self, trainee_id: Option<&str>) -> usize {
        self.progress.trainee_attempt_count(trainee_id)
    }

    pub fn clear_progress(&mut self) {
        self.progress.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn procedure_json() -> &'static str {
        r#"{
            "id": "suture-basic",
            "steps": [
                {"id": 1, "title": "Grab tissue", "instruments": ["FORCEPS"]},
                {"id": 2, "title": "Suture", "instruments": ["NEEDLE_DRIVER"]}
            ],
            "rubric": {"version": "rules_v1", "expected_time_seconds": 120}
        }"#
    }

    fn attempt_json() -> &'static str {
        r#"{
            "attempt_id": "a-1",
            "trainee_id": "t-9",
            "duration_seconds": 150,
            "events": [
                {"event_type": "hit", "timestamp_ms": 100, "payload": {"zone": "forbidden"}},
                {"event_type": "step_completed", "timestamp_ms": 200, "payload": {"step_id": 1}},
                {"event_type": "error", "timestamp_ms": 250, "payload": {}}
            ]
        }"#
    }

    #[test]
    fn test_score_attempt_json() {
        let json = score_attempt_json(attempt_json(), procedure_json()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(report["producer"]["name"], "surgsim-score");
        assert_eq!(report["provenance"]["procedure_id"], "suture-basic");
        assert_eq!(report["score"]["breakdown"]["steps_omitted"], 1);
        assert_eq!(report["score"]["algorithm_version"], "rules_v1");
        assert!(report["score"]["total"].as_f64().unwrap() < 100.0);
        assert!(report.get("progress").is_none());
    }

    #[test]
    fn test_invalid_attempt_json() {
        let result = score_attempt_json("not json", procedure_json());
        assert!(matches!(result, Err(ScoreError::ParseError(_))));
    }

    #[test]
    fn test_invalid_procedure_json() {
        let result = score_attempt_json(attempt_json(), r#"{"steps": [{"id": 1}, {"id": 1}]}"#);
        assert!(matches!(result, Err(ScoreError::InvalidProcedure(_))));
    }

    #[test]
    fn test_processor_tracks_progress() {
        let mut processor = ScoringProcessor::new();
        processor.process(attempt_json(), procedure_json()).unwrap();
        let json = processor.process(attempt_json(), procedure_json()).unwrap();

        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["progress"]["baselines"]["attempts_in_baseline"], 2);
        assert_eq!(report["progress"]["total_deviation_pct"], 0.0);
        assert_eq!(processor.progress_attempt_count(), 2);
    }

    #[test]
    fn test_processor_separates_trainees() {
        let mut processor = ScoringProcessor::new();
        processor.process(attempt_json(), procedure_json()).unwrap();
        processor.process(attempt_json(), procedure_json()).unwrap();

        let other = attempt_json().replace("t-9", "t-10");
        let json = processor.process(&other, procedure_json()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["progress"]["baselines"]["attempts_in_baseline"], 1);
        assert!(report["progress"]["total_deviation_pct"].is_null());

        assert_eq!(processor.trainee_attempt_count(Some("t-9")), 2);
        assert_eq!(processor.trainee_attempt_count(Some("t-10")), 1);
        assert_eq!(processor.progress_attempt_count(), 3);
    }

    #[test]
    fn test_progress_persistence() {
        let mut processor = ScoringProcessor::new().with_progress_window(5);
        processor.process(attempt_json(), procedure_json()).unwrap();
        let saved = processor.save_progress().unwrap();

        let mut restored = ScoringProcessor::new();
        restored.load_progress(&saved).unwrap();
        assert_eq!(restored.progress_attempt_count(), 1);

        let json = restored.process(attempt_json(), procedure_json()).unwrap();
        let report: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(report["progress"]["baselines"]["attempts_in_baseline"], 2);

        restored.clear_progress();
        assert_eq!(restored.progress_attempt_count(), 0);
    }

    #[test]
    fn test_load_progress_rejects_garbage() {
        let mut processor = ScoringProcessor::new();
        assert!(processor.load_progress("{\"nope\": true}").is_err());
    }
}
