//! Simulator event schema and log ingestion
//!
//! Raw events arrive with schema-less payloads; this module turns them into
//! typed, time-ordered events the evaluator can fold over.

mod raw_event;
mod adapter;

pub use raw_event::*;
pub use adapter::*;
