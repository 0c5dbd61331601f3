//! Trainee progress baselines
//!
//! Keeps a rolling window of a trainee's recent scores so each new attempt can
//! be read relative to their own history rather than only against the rubric.
//! [`TraineeProgress`] holds one window per trainee id.

use crate::types::{ScoreResult, Subscores};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Default number of attempts kept in the window
pub const DEFAULT_PROGRESS_WINDOW: usize = 20;

/// Key for attempts that carry no trainee id
pub const UNASSIGNED_TRAINEE: &str = "unassigned";

/// One scored attempt as remembered by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScoreSample {
    total: f64,
    subscores: Subscores,
}

/// Rolling averages over the attempts in the window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressBaselines {
    pub total_baseline: Option<f64>,
    pub precision_baseline: Option<f64>,
    pub efficiency_baseline: Option<f64>,
    pub safety_baseline: Option<f64>,
    pub protocol_adherence_baseline: Option<f64>,
    pub instrument_handling_baseline: Option<f64>,
    pub attempts_in_baseline: u32,
}

/// A new attempt placed against the trainee's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressContext {
    /// Baselines including the new attempt
    pub baselines: ProgressBaselines,
    /// Change of the total versus the prior baseline (percent)
    pub total_deviation_pct: Option<f64>,
    /// Change of the safety sub-score versus the prior baseline (percent)
    pub safety_deviation_pct: Option<f64>,
}

/// Rolling store of one trainee's recent scores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressStore {
    samples: VecDeque<ScoreSample>,
    window_size: usize,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_WINDOW)
    }
}

impl ProgressStore {
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            samples: VecDeque::with_capacity(window_size),
            window_size,
        }
    }

    /// Fold a new result into the window and describe it relative to the prior baseline
    pub fn update_and_contextualize(&mut self, result: &ScoreResult) -> ProgressContext {
        let prior = self.get_baselines();

        let total_deviation_pct = calculate_deviation(result.total, prior.total_baseline);
        let safety_deviation_pct =
            calculate_deviation(result.subscores.safety, prior.safety_baseline);

        self.samples.push_back(ScoreSample {
            total: result.total,
            subscores: result.subscores.clone(),
        });
        while self.samples.len() > self.window_size {
            self.samples.pop_front();
        }

        ProgressContext {
            baselines: self.get_baselines(),
            total_deviation_pct,
            safety_deviation_pct,
        }
    }

    pub fn get_baselines(&self) -> ProgressBaselines {
        ProgressBaselines {
            total_baseline: self.rolling_average(|s| s.total),
            precision_baseline: self.rolling_average(|s| s.subscores.precision),
            efficiency_baseline: self.rolling_average(|s| s.subscores.efficiency),
            safety_baseline: self.rolling_average(|s| s.subscores.safety),
            protocol_adherence_baseline: self
                .rolling_average(|s| s.subscores.protocol_adherence),
            instrument_handling_baseline: self
                .rolling_average(|s| s.subscores.instrument_handling),
            attempts_in_baseline: self.samples.len() as u32,
        }
    }

    pub fn attempt_count(&self) -> usize {
        self.samples.len()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    fn rolling_average(&self, metric: impl Fn(&ScoreSample) -> f64) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(metric).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut store: ProgressStore = serde_json::from_str(json)?;
        store.window_size = store.window_size.max(1);
        while store.samples.len() > store.window_size {
            store.samples.pop_front();
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Progress windows keyed by trainee id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraineeProgress {
    window_size: usize,
    trainees: BTreeMap<String, ProgressStore>,
}

impl Default for TraineeProgress {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_WINDOW)
    }
}

impl TraineeProgress {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            trainees: BTreeMap::new(),
        }
    }

    /// Fold a result into its trainee's window; a missing id maps to [`UNASSIGNED_TRAINEE`]
    pub fn update_and_contextualize(
        &mut self,
        trainee_id: Option<&str>,
        result: &ScoreResult,
    ) -> ProgressContext {
        let key = trainee_key(trainee_id);
        let window_size = self.window_size;
        self.trainees
            .entry(key.to_string())
            .or_insert_with(|| ProgressStore::new(window_size))
            .update_and_contextualize(result)
    }

    /// Window for one trainee, if any attempt of theirs has been seen
    pub fn store(&self, trainee_id: Option<&str>) -> Option<&ProgressStore> {
        self.trainees.get(trainee_key(trainee_id))
    }

    /// Baselines for one trainee; empty when the trainee is unknown
    pub fn get_baselines(&self, trainee_id: Option<&str>) -> ProgressBaselines {
        self.store(trainee_id)
            .map(ProgressStore::get_baselines)
            .unwrap_or_default()
    }

    pub fn trainee_ids(&self) -> impl Iterator<Item = &str> {
        self.trainees.keys().map(String::as_str)
    }

    /// Attempts held across every trainee's window
    pub fn attempt_count(&self) -> usize {
        self.trainees.values().map(ProgressStore::attempt_count).sum()
    }

    pub fn trainee_attempt_count(&self, trainee_id: Option<&str>) -> usize {
        self.store(trainee_id).map_or(0, ProgressStore::attempt_count)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn clear(&mut self) {
        self.trainees.clear();
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut progress: TraineeProgress = serde_json::from_str(json)?;
        progress.window_size = progress.window_size.max(1);
        for store in progress.trainees.values_mut() {
            store.window_size = store.window_size.max(1);
            while store.samples.len() > store.window_size {
                store.samples.pop_front();
            }
        }
        Ok(progress)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn trainee_key(trainee_id: Option<&str>) -> &str {
    match trainee_id.map(str::trim) {
        Some(id) if !id.is_empty() => id,
        _ => UNASSIGNED_TRAINEE,
    }
}

/// Percentage change from `baseline`; `None` without a positive baseline
fn calculate_deviation(current: f64, baseline: Option<f64>) -> Option<f64> {
    match baseline {
        Some(base) if base > 0.0 => Some(((current - base) / base) * 100.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreBreakdown;

    fn result_with(total: f64, safety: f64) -> ScoreResult {
        ScoreResult {
            total,
            subscores: Subscores {
                precision: 90.0,
                efficiency: 80.0,
                safety,
                protocol_adherence: 100.0,
                instrument_handling: 70.0,
            },
            breakdown: ScoreBreakdown::default(),
            feedback: vec![],
            algorithm_version: "v1".to_string(),
        }
    }

    #[test]
    fn test_first_attempt_has_no_deviation() {
        let mut store = ProgressStore::default();
        let context = store.update_and_contextualize(&result_with(80.0, 90.0));
        assert_eq!(context.total_deviation_pct, None);
        assert_eq!(context.safety_deviation_pct, None);
        assert_eq!(context.baselines.total_baseline, Some(80.0));
        assert_eq!(context.baselines.attempts_in_baseline, 1);
    }

    #[test]
    fn test_deviation_against_prior_baseline() {
        let mut store = ProgressStore::new(10);
        for _ in 0..4 {
            store.update_and_contextualize(&result_with(80.0, 50.0));
        }

        let context = store.update_and_contextualize(&result_with(96.0, 40.0));
        assert!((context.total_deviation_pct.unwrap() - 20.0).abs() < 1e-9);
        assert!((context.safety_deviation_pct.unwrap() + 20.0).abs() < 1e-9);
        assert_eq!(context.baselines.attempts_in_baseline, 5);
    }

    #[test]
    fn test_window_rolls() {
        let mut store = ProgressStore::new(3);
        for total in [50.0, 60.0, 70.0, 80.0, 90.0] {
            store.update_and_contextualize(&result_with(total, 100.0));
        }
        let baselines = store.get_baselines();
        assert!((baselines.total_baseline.unwrap() - 80.0).abs() < 1e-9);
        assert_eq!(store.attempt_count(), 3);
    }

    #[test]
    fn test_zero_baseline_has_no_deviation() {
        let mut store = ProgressStore::default();
        store.update_and_contextualize(&result_with(0.0, 0.0));
        let context = store.update_and_contextualize(&result_with(40.0, 10.0));
        assert_eq!(context.total_deviation_pct, None);
    }

    #[test]
    fn test_serialization_round_trip() {
        let mut store = ProgressStore::new(5);
        store.update_and_contextualize(&result_with(72.0, 85.0));
        store.update_and_contextualize(&result_with(88.0, 95.0));

        let json = store.to_json().unwrap();
        let loaded = ProgressStore::from_json(&json).unwrap();
        assert_eq!(loaded.get_baselines(), store.get_baselines());
        assert_eq!(loaded.window_size(), 5);
    }

    #[test]
    fn test_trainees_keep_separate_windows() {
        let mut progress = TraineeProgress::default();
        progress.update_and_contextualize(Some("alice"), &result_with(90.0, 100.0));
        progress.update_and_contextualize(Some("alice"), &result_with(90.0, 100.0));

        let context = progress.update_and_contextualize(Some("bob"), &result_with(40.0, 20.0));
        assert_eq!(context.total_deviation_pct, None);
        assert_eq!(context.baselines.attempts_in_baseline, 1);
        assert_eq!(context.baselines.total_baseline, Some(40.0));

        let context = progress.update_and_contextualize(Some("alice"), &result_with(99.0, 100.0));
        assert!((context.total_deviation_pct.unwrap() - 10.0).abs() < 1e-9);
        assert_eq!(context.baselines.attempts_in_baseline, 3);

        assert_eq!(progress.attempt_count(), 4);
        assert_eq!(progress.trainee_attempt_count(Some("bob")), 1);
        assert_eq!(progress.trainee_ids().collect::<Vec<_>>(), vec!["alice", "bob"]);
    }

    #[test]
    fn test_missing_trainee_id_is_unassigned() {
        let mut progress = TraineeProgress::new(4);
        progress.update_and_contextualize(None, &result_with(70.0, 80.0));
        progress.update_and_contextualize(Some("  "), &result_with(70.0, 80.0));

        assert_eq!(progress.trainee_attempt_count(Some(UNASSIGNED_TRAINEE)), 2);
        assert_eq!(progress.get_baselines(Some("carol")), ProgressBaselines::default());
    }

    #[test]
    fn test_trainee_progress_round_trip() {
        let mut progress = TraineeProgress::new(2);
        for total in [50.0, 60.0, 70.0] {
            progress.update_and_contextualize(Some("alice"), &result_with(total, 90.0));
        }
        progress.update_and_contextualize(Some("bob"), &result_with(30.0, 90.0));

        let loaded = TraineeProgress::from_json(&progress.to_json().unwrap()).unwrap();
        assert_eq!(loaded.window_size(), 2);
        assert_eq!(loaded.get_baselines(Some("alice")).total_baseline, Some(65.0));
        assert_eq!(loaded.get_baselines(Some("bob")), progress.get_baselines(Some("bob")));
        assert!(TraineeProgress::from_json(r#"{"nope": true}"#).is_err());
    }

    #[test]
    fn test_clear() {
        let mut store = ProgressStore::default();
        store.update_and_contextualize(&result_with(72.0, 85.0));
        store.clear();
        assert_eq!(store.attempt_count(), 0);
        assert_eq!(store.get_baselines().total_baseline, None);
    }
}
