//! Core data types for SurgSim Score
//!
//! Procedures are the immutable reference definitions trainees are scored
//! against, attempts carry the raw interaction log, and `ScoreResult` is the
//! engine's output.

use crate::error::ScoreError;
use crate::schema::RawEvent;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Default expected completion time when the rubric omits it (seconds)
pub const DEFAULT_EXPECTED_TIME_SECONDS: f64 = 180.0;

// ============================================================================
// Procedure definition
// ============================================================================

/// Identifier of a procedure step.
///
/// Producers send step ids either as integers or as strings. Integers
/// (including integral floats) are canonicalized to their decimal text so
/// `1`, `1.0` and `"1"` all name the same step.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "StepIdRepr", into = "String")]
pub struct StepId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum StepIdRepr {
    Number(serde_json::Number),
    Text(String),
}

impl From<StepIdRepr> for StepId {
    fn from(repr: StepIdRepr) -> Self {
        match repr {
            StepIdRepr::Number(n) => StepId(canonical_number(&n)),
            StepIdRepr::Text(s) => StepId(s),
        }
    }
}

impl From<StepId> for String {
    fn from(id: StepId) -> Self {
        id.0
    }
}

impl From<&str> for StepId {
    fn from(s: &str) -> Self {
        StepId(s.to_string())
    }
}

impl From<i64> for StepId {
    fn from(n: i64) -> Self {
        StepId(n.to_string())
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StepId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read a step id out of an untyped payload value
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) if !s.is_empty() => Some(StepId(s.clone())),
            serde_json::Value::Number(n) => Some(StepId(canonical_number(n))),
            _ => None,
        }
    }
}

fn canonical_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

/// One step of a procedure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcedureStep {
    /// Step identifier
    pub id: StepId,
    /// Human-readable title
    #[serde(default)]
    pub title: String,
    /// Acceptable tool identifiers for this step (empty = unconstrained)
    #[serde(default)]
    pub instruments: Vec<String>,
    /// Actions the step expects
    #[serde(default)]
    pub actions: Vec<String>,
}

/// Every infraction kind the rubric can weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    ForbiddenHit,
    WrongAction,
    StepOmitted,
    TimeOver,
    WrongInstrument,
    ErraticMove,
    ForbiddenContact,
    ForcefulAction,
}

impl PenaltyKind {
    pub const ALL: [PenaltyKind; 8] = [
        PenaltyKind::ForbiddenHit,
        PenaltyKind::WrongAction,
        PenaltyKind::StepOmitted,
        PenaltyKind::TimeOver,
        PenaltyKind::WrongInstrument,
        PenaltyKind::ErraticMove,
        PenaltyKind::ForbiddenContact,
        PenaltyKind::ForcefulAction,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyKind::ForbiddenHit => "forbidden_hit",
            PenaltyKind::WrongAction => "wrong_action",
            PenaltyKind::StepOmitted => "step_omitted",
            PenaltyKind::TimeOver => "time_over",
            PenaltyKind::WrongInstrument => "wrong_instrument",
            PenaltyKind::ErraticMove => "erratic_move",
            PenaltyKind::ForbiddenContact => "forbidden_contact",
            PenaltyKind::ForcefulAction => "forceful_action",
        }
    }

    /// Weight applied when the rubric does not name this kind
    pub fn default_weight(&self) -> f64 {
        match self {
            PenaltyKind::ForbiddenHit => 6.0,
            PenaltyKind::WrongAction => 4.0,
            PenaltyKind::StepOmitted => 5.0,
            PenaltyKind::TimeOver => 1.0,
            PenaltyKind::WrongInstrument => 4.0,
            PenaltyKind::ErraticMove => 1.0,
            PenaltyKind::ForbiddenContact => 2.0,
            PenaltyKind::ForcefulAction => 2.0,
        }
    }
}

/// Penalty weight per infraction kind.
///
/// Keys missing from the rubric take [`PenaltyKind::default_weight`]; unknown
/// keys are rejected when the procedure is loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PenaltyWeights {
    pub forbidden_hit: f64,
    pub wrong_action: f64,
    pub step_omitted: f64,
    pub time_over: f64,
    pub wrong_instrument: f64,
    pub erratic_move: f64,
    pub forbidden_contact: f64,
    pub forceful_action: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            forbidden_hit: PenaltyKind::ForbiddenHit.default_weight(),
            wrong_action: PenaltyKind::WrongAction.default_weight(),
            step_omitted: PenaltyKind::StepOmitted.default_weight(),
            time_over: PenaltyKind::TimeOver.default_weight(),
            wrong_instrument: PenaltyKind::WrongInstrument.default_weight(),
            erratic_move: PenaltyKind::ErraticMove.default_weight(),
            forbidden_contact: PenaltyKind::ForbiddenContact.default_weight(),
            forceful_action: PenaltyKind::ForcefulAction.default_weight(),
        }
    }
}

impl PenaltyWeights {
    pub fn weight(&self, kind: PenaltyKind) -> f64 {
        match kind {
            PenaltyKind::ForbiddenHit => self.forbidden_hit,
            PenaltyKind::WrongAction => self.wrong_action,
            PenaltyKind::StepOmitted => self.step_omitted,
            PenaltyKind::TimeOver => self.time_over,
            PenaltyKind::WrongInstrument => self.wrong_instrument,
            PenaltyKind::ErraticMove => self.erratic_move,
            PenaltyKind::ForbiddenContact => self.forbidden_contact,
            PenaltyKind::ForcefulAction => self.forceful_action,
        }
    }
}

/// Per-procedure scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    /// Algorithm version tag copied into every result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Expected completion time in seconds
    #[serde(default = "default_expected_time")]
    pub expected_time_seconds: f64,
    /// Penalty weights
    #[serde(default)]
    pub penalties: PenaltyWeights,
}

fn default_expected_time() -> f64 {
    DEFAULT_EXPECTED_TIME_SECONDS
}

impl Default for Rubric {
    fn default() -> Self {
        Self {
            version: None,
            expected_time_seconds: DEFAULT_EXPECTED_TIME_SECONDS,
            penalties: PenaltyWeights::default(),
        }
    }
}

impl Rubric {
    /// Check that weights and expected time are usable numbers
    pub fn validate(&self) -> Result<(), ScoreError> {
        if !self.expected_time_seconds.is_finite() || self.expected_time_seconds <= 0.0 {
            return Err(ScoreError::InvalidProcedure(format!(
                "expected_time_seconds must be a positive number, got {}",
                self.expected_time_seconds
            )));
        }

        for kind in PenaltyKind::ALL {
            let weight = self.penalties.weight(kind);
            if !weight.is_finite() || weight < 0.0 {
                return Err(ScoreError::InvalidProcedure(format!(
                    "penalty weight '{}' must be a non-negative number, got {}",
                    kind.as_str(),
                    weight
                )));
            }
        }

        Ok(())
    }
}

/// A labeled spatial region. Only zone membership matters to scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneRegion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f64>,
}

/// Zone definitions keyed by label (`target`, `forbidden`, ...)
pub type Zones = BTreeMap<String, ZoneRegion>;

/// Reference definition of a training scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Ordered steps
    #[serde(default)]
    pub steps: Vec<ProcedureStep>,
    /// Scoring rubric
    #[serde(default)]
    pub rubric: Rubric,
    /// Zone definitions
    #[serde(default)]
    pub zones: Zones,
}

impl Procedure {
    /// Parse and validate a procedure definition
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        let procedure: Procedure = serde_json::from_str(json)
            .map_err(|e| ScoreError::InvalidProcedure(format!("failed to parse procedure: {e}")))?;
        procedure.validate()?;
        Ok(procedure)
    }

    /// Validate rubric numbers and step id uniqueness
    pub fn validate(&self) -> Result<(), ScoreError> {
        self.rubric.validate()?;

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.as_str().is_empty() {
                return Err(ScoreError::InvalidProcedure(
                    "step id must not be empty".to_string(),
                ));
            }
            if !seen.insert(step.id.clone()) {
                return Err(ScoreError::InvalidProcedure(format!(
                    "duplicate step id '{}'",
                    step.id
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Attempt
// ============================================================================

/// Accept integer or fractional numbers (truncated); `null` becomes 0
pub(crate) fn deserialize_lenient_i64<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Number>::deserialize(deserializer)?;
    Ok(value
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
        .unwrap_or(0))
}

/// One trainee's run against one procedure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Attempt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trainee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub procedure_id: Option<String>,
    /// Wall-clock elapsed seconds, supplied once the run ends
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub duration_seconds: i64,
    /// Interaction log
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl Attempt {
    pub fn new(duration_seconds: i64, events: Vec<RawEvent>) -> Self {
        Self {
            duration_seconds,
            events,
            ..Default::default()
        }
    }

    /// Parse an attempt record
    pub fn from_json(json: &str) -> Result<Self, ScoreError> {
        serde_json::from_str(json)
            .map_err(|e| ScoreError::ParseError(format!("failed to parse attempt: {e}")))
    }

    /// Elapsed seconds with negative values treated as zero
    pub fn effective_duration_seconds(&self) -> u64 {
        self.duration_seconds.max(0) as u64
    }
}

// ============================================================================
// Score output
// ============================================================================

/// Five independently computed 0-100 facets of performance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscores {
    pub precision: f64,
    pub efficiency: f64,
    pub safety: f64,
    pub protocol_adherence: f64,
    pub instrument_handling: f64,
}

impl Subscores {
    /// Named values in a fixed order
    pub fn entries(&self) -> [(&'static str, f64); 5] {
        [
            ("precision", self.precision),
            ("efficiency", self.efficiency),
            ("safety", self.safety),
            ("protocol_adherence", self.protocol_adherence),
            ("instrument_handling", self.instrument_handling),
        ]
    }
}

/// Infraction counters behind a score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub forbidden_hits: u32,
    pub target_hits: u32,
    pub wrong_actions: u32,
    /// Cumulative dwell time inside the forbidden zone (ms)
    pub forbidden_contact_ms: f64,
    pub forceful_actions: u32,
    pub steps_completed: u32,
    pub steps_omitted: u32,
    pub time_over_seconds: f64,
    pub wrong_instrument: u32,
    pub erratic_moves: u32,
}

/// Engine output for one attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    /// Total score (0-100)
    pub total: f64,
    pub subscores: Subscores,
    pub breakdown: ScoreBreakdown,
    /// Ordered, capped feedback sentences
    pub feedback: Vec<String>,
    pub algorithm_version: String,
}
