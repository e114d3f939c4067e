//! Wire contracts for the ingest endpoint.
//!
//! The four event kinds form a tagged union discriminated by `event_type`.
//! Externalized payloads travel in a field named `_payloads` on the wire;
//! the leading underscore marks it as out-of-band data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::models::{RunStatus, StepStatus, StepType};

/// A lifecycle event shipped from the SDK, discriminated by `event_type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Event {
    RunStart(RunStartEvent),
    RunEnd(RunEndEvent),
    StepStart(StepStartEvent),
    StepEnd(StepEndEvent),
}

impl Event {
    /// The event's own identifier (run id or step id).
    pub fn id(&self) -> Uuid {
        match self {
            Self::RunStart(e) => e.id,
            Self::RunEnd(e) => e.id,
            Self::StepStart(e) => e.id,
            Self::StepEnd(e) => e.id,
        }
    }

    /// Discriminator value as it appears on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStart(_) => "run_start",
            Self::RunEnd(_) => "run_end",
            Self::StepStart(_) => "step_start",
            Self::StepEnd(_) => "step_end",
        }
    }
}

/// Emitted when a run begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStartEvent {
    pub id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(
        rename = "_payloads",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payloads: Option<Map<String, Value>>,
}

/// Emitted when a run terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunEndEvent {
    pub id: Uuid,
    pub status: RunStatus,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(
        rename = "_payloads",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payloads: Option<Map<String, Value>>,
}

/// Emitted when a step begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStartEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub step_name: String,
    pub step_type: StepType,
    pub index: i32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_summary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(
        rename = "_payloads",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payloads: Option<Map<String, Value>>,
}

/// Emitted when a step terminates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEndEvent {
    pub id: Uuid,
    pub run_id: Uuid,
    pub status: StepStatus,
    pub ended_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_summary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(
        rename = "_payloads",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub payloads: Option<Map<String, Value>>,
}

/// Per-event outcome reported by the ingest endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventResult {
    pub id: Uuid,
    pub event_type: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Batch outcome for `POST /ingest`. Always returned with HTTP 200.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<EventResult>,
}
