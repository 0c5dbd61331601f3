//! Ingestion of raw simulator event logs
//!
//! Parses event logs, normalizes every record once into a typed [`SimEvent`],
//! orders the log by timestamp and records quality flags describing what had
//! to be repaired along the way.

use crate::error::ScoreError;
use crate::schema::raw_event::*;
use serde::{Deserialize, Serialize};

/// Quality flags raised while ingesting an event log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationFlag {
    /// The log contained no events
    NoEvents,
    /// Events arrived out of timestamp order and were sorted
    EventsReordered,
    /// Some events had a type the engine does not score
    UnknownEventTypes,
    /// Some payload fields were missing or ill-typed and were defaulted
    DefaultedFields,
}

/// A time-ordered, normalized event log
#[derive(Debug, Clone, Default)]
pub struct IngestedLog {
    /// Events sorted by timestamp (stable for equal timestamps)
    pub events: Vec<SimEvent>,
    /// Quality flags
    pub flags: Vec<EvaluationFlag>,
    /// Number of events with an unrecognized type
    pub unknown_events: u32,
    /// Number of fields that were defaulted across all events
    pub defaulted_fields: u32,
}

/// Per-event validation outcome
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub index: usize,
    pub event_type: String,
    pub issues: Vec<EventIssue>,
}

/// Adapter for reading simulator event logs
pub struct RawEventAdapter;

impl RawEventAdapter {
    /// Parse a JSON string containing an array of RawEvents
    pub fn parse_array(json: &str) -> Result<Vec<RawEvent>, ScoreError> {
        let events: Vec<RawEvent> = serde_json::from_str(json)?;
        Ok(events)
    }

    /// Parse NDJSON (newline-delimited JSON) containing RawEvents
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<RawEvent>, ScoreError> {
        let mut events = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<RawEvent>(trimmed) {
                Ok(event) => events.push(event),
                Err(e) => {
                    return Err(ScoreError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Normalize and time-order a raw event log
    pub fn ingest(events: &[RawEvent]) -> IngestedLog {
        let mut log = IngestedLog {
            events: Vec::with_capacity(events.len()),
            ..Default::default()
        };

        if events.is_empty() {
            log.flags.push(EvaluationFlag::NoEvents);
            return log;
        }

        for raw in events {
            let normalized = raw.normalize();
            for issue in &normalized.issues {
                match issue {
                    EventIssue::UnknownEventType(_) => log.unknown_events += 1,
                    _ => log.defaulted_fields += 1,
                }
            }
            log.events.push(normalized.event);
        }

        let in_order = log
            .events
            .windows(2)
            .all(|pair| pair[0].timestamp_ms <= pair[1].timestamp_ms);
        if !in_order {
            log.events.sort_by_key(|e| e.timestamp_ms);
            log.flags.push(EvaluationFlag::EventsReordered);
            tracing::warn!(events = events.len(), "event log was out of order, sorted by timestamp");
        }

        if log.unknown_events > 0 {
            log.flags.push(EvaluationFlag::UnknownEventTypes);
            tracing::warn!(count = log.unknown_events, "ignoring events with unknown type");
        }
        if log.defaulted_fields > 0 {
            log.flags.push(EvaluationFlag::DefaultedFields);
            tracing::warn!(count = log.defaulted_fields, "defaulted malformed event fields");
        }

        tracing::debug!(events = log.events.len(), "ingested event log");
        log
    }

    /// Validate a batch of events, returning only the ones with issues
    pub fn validate_events(events: &[RawEvent]) -> Vec<ValidationResult> {
        events
            .iter()
            .enumerate()
            .map(|(idx, event)| ValidationResult {
                index: idx,
                event_type: event.event_type.clone(),
                issues: event.normalize().issues,
            })
            .filter(|r| !r.issues.is_empty())
            .collect()
    }
}
