//! Persisted run, step, and payload rows as domain structs.
//!
//! Repositories convert raw database records into these before handing them
//! to the server layer, so timestamps are parsed and JSON columns decoded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Phase, RunStatus, StepStatus, StepType};

/// One execution of a named pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Unique run identifier (client-assigned UUID).
    pub id: String,
    /// Name of the pipeline this run executed.
    pub pipeline_name: String,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// When the run started (UTC wall clock).
    pub started_at: DateTime<Utc>,
    /// When the run ended, set on termination.
    pub ended_at: Option<DateTime<Utc>>,
    /// Bounded summary of the run input.
    pub input_summary: Option<serde_json::Value>,
    /// Bounded summary of the run output.
    pub output_summary: Option<serde_json::Value>,
    /// Free-form metadata attached at start.
    pub metadata: Option<serde_json::Value>,
    /// Caller-supplied request correlation id.
    pub request_id: Option<String>,
    /// Caller-supplied user id.
    pub user_id: Option<String>,
    /// Deployment environment tag.
    pub environment: Option<String>,
    /// Error description when status is error.
    pub error_message: Option<String>,
}

/// A single decision/processing stage within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Unique step identifier (client-assigned UUID).
    pub id: String,
    /// Owning run identifier.
    pub run_id: String,
    /// Step name (e.g. "filter_by_price").
    pub step_name: String,
    /// Step category.
    pub step_type: StepType,
    /// 0-based position within the run. Gaps and out-of-order arrival
    /// are tolerated.
    pub index: i32,
    /// When the step started (UTC wall clock).
    pub started_at: DateTime<Utc>,
    /// When the step ended.
    pub ended_at: Option<DateTime<Utc>>,
    /// Monotonic-clock duration in whole milliseconds.
    pub duration_ms: Option<i64>,
    /// Current lifecycle status.
    pub status: StepStatus,
    /// Bounded summary of the step input.
    pub input_summary: Option<serde_json::Value>,
    /// Bounded summary of the step output.
    pub output_summary: Option<serde_json::Value>,
    /// Item count inferred from the input.
    pub input_count: Option<i64>,
    /// Item count inferred from the output.
    pub output_count: Option<i64>,
    /// Free-form reasoning attached during execution.
    pub reasoning: Option<serde_json::Value>,
    /// Free-form metadata attached at start.
    pub metadata: Option<serde_json::Value>,
    /// Error description when status is error.
    pub error_message: Option<String>,
}

/// An externalized payload blob referenced by a summary.
///
/// Created when its parent run/step event is ingested, never mutated,
/// deleted by cascade with the owning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    /// Database row id.
    pub id: i32,
    /// Owning run identifier.
    pub run_id: String,
    /// Owning step identifier, None for run-level payloads.
    pub step_id: Option<String>,
    /// Input or output side.
    pub phase: Phase,
    /// Client-assigned reference id, unique within a run+step scope.
    pub ref_id: String,
    /// The stored JSON body.
    pub body: serde_json::Value,
    /// When the row was written.
    pub created_at: DateTime<Utc>,
}
