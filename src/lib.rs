//! SurgSim Score - Scoring engine for surgical simulation attempts
//!
//! Converts a trainee's raw interaction log into a normalized performance
//! score through a deterministic pipeline: event ingestion → tally fold →
//! penalty aggregation and sub-scores → feedback → score report.
//!
//! ## Modules
//!
//! - **Evaluation**: `schema`, `tally`, `scoring`, `feedback` and `evaluator`
//!   turn an attempt and a procedure into a [`ScoreResult`]
//! - **Reporting**: `baseline`, `encoder` and `pipeline` add trainee progress
//!   context and wrap results into report JSON; `analytics` aggregates totals

pub mod analytics;
pub mod baseline;
pub mod config;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod feedback;
pub mod pipeline;
pub mod schema;
pub mod scoring;
pub mod tally;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use analytics::{summarize_by_procedure, ProcedureSummary, ScoredAttempt};
pub use baseline::{ProgressContext, ProgressStore, TraineeProgress};
pub use config::EvaluatorConfig;
pub use encoder::{ScoreReport, ScoreReportEncoder};
pub use error::ScoreError;
pub use evaluator::{evaluate, AttemptEvaluator, Evaluation};
pub use feedback::Locale;
pub use pipeline::{score_attempt_json, ScoringProcessor};
pub use schema::{EvaluationFlag, RawEvent, RawEventAdapter};
pub use types::{Attempt, Procedure, ScoreBreakdown, ScoreResult, Subscores};

/// Library version embedded in every score report
pub const SURGSIM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for score reports
pub const PRODUCER_NAME: &str = "surgsim-score";
