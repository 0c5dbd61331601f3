//! Score report encoding
//!
//! Wraps an evaluation into the report envelope handed to the persistence and
//! presentation layers: producer metadata, provenance of the attempt, ingestion
//! quality flags, the score itself and optional progress context.

use crate::baseline::ProgressContext;
use crate::error::ScoreError;
use crate::evaluator::Evaluation;
use crate::schema::EvaluationFlag;
use crate::scoring::PenaltyItem;
use crate::types::{Attempt, Procedure, ScoreResult};
use crate::{PRODUCER_NAME, SURGSIM_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProvenance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trainee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure_id: Option<String>,
    pub computed_at_utc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportQuality {
    pub event_count: usize,
    pub flags: Vec<EvaluationFlag>,
}

/// Report envelope for one scored attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub provenance: ReportProvenance,
    pub quality: ReportQuality,
    pub score: ScoreResult,
    pub penalties: Vec<PenaltyItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressContext>,
}

/// Encoder for score reports
pub struct ScoreReportEncoder {
    instance_id: String,
}

impl Default for ScoreReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoreReportEncoder {
    /// Create an encoder with a fresh instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn encode(
        &self,
        attempt: &Attempt,
        procedure: &Procedure,
        evaluation: &Evaluation,
        progress: Option<ProgressContext>,
    ) -> Result<ScoreReport, ScoreError> {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: SURGSIM_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        // The attempt names its procedure when the caller knows it; otherwise trust the definition
        let provenance = ReportProvenance {
            attempt_id: attempt.attempt_id.clone(),
            trainee_id: attempt.trainee_id.clone(),
            procedure_id: attempt
                .procedure_id
                .clone()
                .or_else(|| procedure.id.clone()),
            computed_at_utc: Utc::now().to_rfc3339(),
        };

        let quality = ReportQuality {
            event_count: attempt.events.len(),
            flags: evaluation.flags.clone(),
        };

        Ok(ScoreReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            provenance,
            quality,
            score: evaluation.result.clone(),
            penalties: evaluation.penalties.clone(),
            progress,
        })
    }

    /// Encode to a pretty-printed JSON string
    pub fn encode_to_json(
        &self,
        attempt: &Attempt,
        procedure: &Procedure,
        evaluation: &Evaluation,
        progress: Option<ProgressContext>,
    ) -> Result<String, ScoreError> {
        let report = self.encode(attempt, procedure, evaluation, progress)?;
        serde_json::to_string_pretty(&report).map_err(ScoreError::JsonError)
    }
}
