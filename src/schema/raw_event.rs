//! Simulator event schema
//!
//! `RawEvent` is the record as the simulator front end reports it: an event
//! type string, a millisecond timestamp and a schema-less payload. Each raw
//! record is normalized exactly once into a typed [`SimEvent`] whose variants
//! carry only the fields relevant to their kind. Missing or ill-typed fields
//! fall back to neutral values and are reported as [`EventIssue`]s.

use crate::types::{deserialize_lenient_i64, StepId};
use serde::{Deserialize, Serialize};

/// Recognized event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Hit,
    StepCompleted,
    Error,
    Action,
    ToolSelect,
    Move,
    ContactDuration,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        EventType::Hit,
        EventType::StepCompleted,
        EventType::Error,
        EventType::Action,
        EventType::ToolSelect,
        EventType::Move,
        EventType::ContactDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Hit => "hit",
            EventType::StepCompleted => "step_completed",
            EventType::Error => "error",
            EventType::Action => "action",
            EventType::ToolSelect => "tool_select",
            EventType::Move => "move",
            EventType::ContactDuration => "contact_duration",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

/// A raw event as reported by the simulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Event kind name (`hit`, `step_completed`, ...); absent reads as unknown
    #[serde(default)]
    pub event_type: String,
    /// Milliseconds since the attempt started
    #[serde(default, deserialize_with = "deserialize_lenient_i64")]
    pub timestamp_ms: i64,
    /// Kind-specific fields
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RawEvent {
    pub fn new(
        event_type: impl Into<String>,
        timestamp_ms: i64,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp_ms,
            payload,
        }
    }

    /// Normalize into a typed event, collecting every field that had to be defaulted
    pub fn normalize(&self) -> NormalizedEvent {
        let mut issues = Vec::new();

        let timestamp_ms = if self.timestamp_ms < 0 {
            issues.push(EventIssue::NegativeTimestamp(self.timestamp_ms));
            0
        } else {
            self.timestamp_ms as u64
        };

        let empty = serde_json::Map::new();
        let payload = match &self.payload {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => &empty,
            _ => {
                issues.push(EventIssue::NonObjectPayload);
                &empty
            }
        };

        let kind = match EventType::parse(&self.event_type) {
            Some(event_type) => {
                let mut reader = PayloadReader {
                    payload,
                    event_type,
                    issues: &mut issues,
                };
                reader.read_kind()
            }
            None => {
                issues.push(EventIssue::UnknownEventType(self.event_type.clone()));
                EventKind::Unknown {
                    name: self.event_type.clone(),
                }
            }
        };

        NormalizedEvent {
            event: SimEvent { timestamp_ms, kind },
            issues,
        }
    }
}

/// Zone membership of a contact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneKind {
    Target,
    Forbidden,
    Other(String),
}

impl ZoneKind {
    pub fn parse(label: &str) -> Self {
        match label {
            "target" => ZoneKind::Target,
            "forbidden" => ZoneKind::Forbidden,
            other => ZoneKind::Other(other.to_string()),
        }
    }
}

/// Typed payload of a simulator event
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Discrete contact with a zone
    Hit { zone: Option<ZoneKind> },
    /// The trainee reported a step as done
    StepCompleted { step_id: Option<StepId> },
    /// A misapplied action reported by the front end
    Error { code: Option<String> },
    /// An instrument action
    Action {
        tool: Option<String>,
        /// 0-10 scale
        intensity: f64,
        name: Option<String>,
    },
    /// The trainee picked up an instrument
    ToolSelect { tool: Option<String> },
    /// Instrument motion sample
    Move,
    /// One prolonged contact with a zone
    ContactDuration {
        zone: Option<ZoneKind>,
        duration_ms: f64,
    },
    /// Event type the engine does not score
    Unknown { name: String },
}

/// A normalized, timestamped simulator event
#[derive(Debug, Clone, PartialEq)]
pub struct SimEvent {
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// Normalization output for one raw event
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    pub event: SimEvent,
    pub issues: Vec<EventIssue>,
}

/// A field that could not be read as sent and was defaulted
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EventIssue {
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Negative timestamp {0}ms treated as 0")]
    NegativeTimestamp(i64),

    #[error("Payload is not an object")]
    NonObjectPayload,

    #[error("{event_type} event is missing '{field}'")]
    MissingField {
        event_type: &'static str,
        field: &'static str,
    },

    #[error("{event_type} event has invalid '{field}': expected {expected}")]
    InvalidField {
        event_type: &'static str,
        field: &'static str,
        expected: &'static str,
    },
}

struct PayloadReader<'a> {
    payload: &'a serde_json::Map<String, serde_json::Value>,
    event_type: EventType,
    issues: &'a mut Vec<EventIssue>,
}

impl PayloadReader<'_> {
    fn read_kind(&mut self) -> EventKind {
        match self.event_type {
            EventType::Hit => EventKind::Hit {
                zone: self.string("zone", true).map(|z| ZoneKind::parse(&z)),
            },
            EventType::StepCompleted => EventKind::StepCompleted {
                step_id: self.step_id("step_id"),
            },
            EventType::Error => EventKind::Error {
                code: self.string("code", false),
            },
            EventType::Action => EventKind::Action {
                tool: self.string("tool", false),
                intensity: self.number("intensity", false).unwrap_or(0.0),
                name: self.string("type", false).or_else(|| self.string("name", false)),
            },
            EventType::ToolSelect => EventKind::ToolSelect {
                tool: self.string("tool", true),
            },
            EventType::Move => EventKind::Move,
            EventType::ContactDuration => EventKind::ContactDuration {
                zone: self.string("zone", true).map(|z| ZoneKind::parse(&z)),
                duration_ms: self.non_negative("duration_ms"),
            },
        }
    }

    fn missing(&mut self, field: &'static str) {
        self.issues.push(EventIssue::MissingField {
            event_type: self.event_type.as_str(),
            field,
        });
    }

    fn invalid(&mut self, field: &'static str, expected: &'static str) {
        self.issues.push(EventIssue::InvalidField {
            event_type: self.event_type.as_str(),
            field,
            expected,
        });
    }

    /// Non-empty string field; empty strings count as absent
    fn string(&mut self, field: &'static str, required: bool) -> Option<String> {
        match self.payload.get(field) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            None | Some(serde_json::Value::Null) | Some(serde_json::Value::String(_)) => {
                if required {
                    self.missing(field);
                }
                None
            }
            Some(_) => {
                self.invalid(field, "string");
                None
            }
        }
    }

    fn number(&mut self, field: &'static str, required: bool) -> Option<f64> {
        match self.payload.get(field) {
            Some(serde_json::Value::Number(n)) => match n.as_f64() {
                Some(v) if v.is_finite() => Some(v),
                _ => {
                    self.invalid(field, "finite number");
                    None
                }
            },
            None | Some(serde_json::Value::Null) => {
                if required {
                    self.missing(field);
                }
                None
            }
            Some(_) => {
                self.invalid(field, "number");
                None
            }
        }
    }

    fn non_negative(&mut self, field: &'static str) -> f64 {
        match self.number(field, true) {
            Some(v) if v < 0.0 => {
                self.invalid(field, "non-negative number");
                0.0
            }
            Some(v) => v,
            None => 0.0,
        }
    }

    fn step_id(&mut self, field: &'static str) -> Option<StepId> {
        match self.payload.get(field) {
            None | Some(serde_json::Value::Null) => {
                self.missing(field);
                None
            }
            Some(value) => {
                let id = StepId::from_value(value);
                if id.is_none() {
                    self.invalid(field, "string or integer");
                }
                id
            }
        }
    }
}
