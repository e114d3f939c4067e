//! A single decision step within a run.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::transport::Transport;
use crate::events::{Event, StepEndEvent, StepStartEvent};
use crate::models::{DetailLevel, StepStatus, StepType};
use crate::summary::{infer_count, short_type_name, summarize_payload};

/// Format an error the way events carry it: `"<TypeName>: <message>"`.
pub(crate) fn format_error<E: std::error::Error>(error: &E) -> String {
    format!("{}: {}", short_type_name::<E>(), error)
}

/// Summarize a serializable value, returning the summary, the inferred item
/// count, and (at full detail) the complete value for externalization.
pub(crate) fn process_value<T: Serialize + ?Sized>(
    value: &T,
    detail: DetailLevel,
    ref_id: &str,
) -> (Value, Option<i64>, Option<Map<String, Value>>) {
    match serde_json::to_value(value) {
        Ok(v) => {
            let count = infer_count(&v);
            let summary = summarize_payload(&v);
            let payloads = (detail == DetailLevel::Full && !v.is_null()).then(|| {
                let mut map = Map::new();
                map.insert(ref_id.to_string(), v);
                map
            });
            (summary, count, payloads)
        }
        Err(_) => (
            json!({"_type": short_type_name::<T>(), "_error": true}),
            None,
            None,
        ),
    }
}

/// One decision/processing stage within a run.
///
/// Created via [`Run::start_step`](super::Run::start_step); emits
/// `step_start` on construction and `step_end` when ended. Timing uses a
/// monotonic clock, so `duration_ms` is immune to wall-clock adjustments.
pub struct Step {
    id: Uuid,
    run_id: Uuid,
    transport: Transport,
    name: String,
    step_type: StepType,
    index: i32,
    detail: DetailLevel,
    reasoning: Map<String, Value>,
    started_at: DateTime<Utc>,
    start_instant: Instant,
    status: StepStatus,
    duration_ms: Option<i64>,
    error_message: Option<String>,
    ended: bool,
}

impl Step {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn start<T: Serialize + ?Sized>(
        transport: Transport,
        run_id: Uuid,
        name: &str,
        step_type: StepType,
        index: i32,
        input: &T,
        metadata: Option<Value>,
        detail: DetailLevel,
    ) -> Self {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let (input_summary, input_count, payloads) = process_value(input, detail, "input");

        let step = Self {
            id,
            run_id,
            transport,
            name: name.to_string(),
            step_type,
            index,
            detail,
            reasoning: Map::new(),
            started_at,
            start_instant: Instant::now(),
            status: StepStatus::Running,
            duration_ms: None,
            error_message: None,
            ended: false,
        };

        step.transport.send(Event::StepStart(StepStartEvent {
            id,
            run_id,
            step_name: step.name.clone(),
            step_type,
            index,
            started_at,
            input_summary: Some(input_summary),
            input_count,
            metadata,
            payloads,
        }));

        step
    }

    /// Step unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Parent run identifier.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Step name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Step type.
    pub fn step_type(&self) -> StepType {
        self.step_type
    }

    /// 0-based index within the run.
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Current status.
    pub fn status(&self) -> StepStatus {
        self.status
    }

    /// When the step started (UTC wall clock).
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Monotonic duration, set once the step has ended.
    pub fn duration_ms(&self) -> Option<i64> {
        self.duration_ms
    }

    /// Error description, set when the step ended with an error.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Attach reasoning to this step. A string is stored under the
    /// `explanation` key; a map is merged key-by-key. Ignored after end.
    pub fn attach_reasoning(&mut self, reasoning: Value) {
        if self.ended {
            return;
        }
        match reasoning {
            Value::Object(map) => self.reasoning.extend(map),
            Value::String(s) => {
                self.reasoning.insert("explanation".to_string(), json!(s));
            }
            other => {
                self.reasoning.insert("explanation".to_string(), other);
            }
        }
    }

    /// End the step successfully with its output. Idempotent.
    pub fn end<T: Serialize + ?Sized>(&mut self, output: &T) {
        self.finish(Some(output), StepStatus::Success, None);
    }

    /// End the step with an explicit status.
    pub fn end_with_status<T: Serialize + ?Sized>(&mut self, output: &T, status: StepStatus) {
        self.finish(Some(output), status, None);
    }

    /// End the step with an error. Idempotent.
    pub fn end_with_error<E: std::error::Error>(&mut self, error: &E) {
        let message = format_error(error);
        self.finish(None::<&()>, StepStatus::Error, Some(message));
    }

    /// End the step with an error message.
    pub fn end_with_error_message(&mut self, message: impl Into<String>) {
        self.finish(None::<&()>, StepStatus::Error, Some(message.into()));
    }

    fn finish<T: Serialize + ?Sized>(
        &mut self,
        output: Option<&T>,
        status: StepStatus,
        error_message: Option<String>,
    ) {
        if self.ended {
            return;
        }
        self.ended = true;

        let ended_at = Utc::now();
        let duration_ms = self.start_instant.elapsed().as_millis() as i64;
        self.status = status;
        self.duration_ms = Some(duration_ms);
        self.error_message = error_message.clone();

        let (output_summary, output_count, payloads) = match output {
            Some(value) => {
                let (summary, count, payloads) = process_value(value, self.detail, "output");
                (Some(summary), count, payloads)
            }
            None => (None, None, None),
        };
        let reasoning = (!self.reasoning.is_empty()).then(|| Value::Object(self.reasoning.clone()));

        self.transport.send(Event::StepEnd(StepEndEvent {
            id: self.id,
            run_id: self.run_id,
            status,
            ended_at,
            duration_ms: Some(duration_ms),
            output_summary,
            output_count,
            reasoning,
            error_message,
            payloads,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SdkConfig;

    fn test_transport() -> Transport {
        Transport::new(SdkConfig {
            buffer_size: 64,
            ..SdkConfig::default()
        })
    }

    fn start_step(transport: &Transport) -> Step {
        Step::start(
            transport.clone(),
            Uuid::new_v4(),
            "filter_by_price",
            StepType::Filter,
            0,
            &json!([{"id": "1"}, {"id": "2"}]),
            None,
            DetailLevel::Summary,
        )
    }

    #[tokio::test]
    async fn test_step_emits_start_and_end() {
        let transport = test_transport();
        let mut step = start_step(&transport);
        assert_eq!(transport.queue_size(), 1);
        assert_eq!(step.status(), StepStatus::Running);

        step.end(&json!([{"id": "1"}]));
        assert_eq!(transport.queue_size(), 2);
        assert_eq!(step.status(), StepStatus::Success);
        assert!(step.duration_ms().unwrap() >= 0);
    }

    #[tokio::test]
    async fn test_step_end_is_idempotent() {
        let transport = test_transport();
        let mut step = start_step(&transport);
        step.end(&json!(null));
        step.end(&json!(null));
        step.end_with_error_message("late failure");

        // One start + one end, nothing more.
        assert_eq!(transport.queue_size(), 2);
        assert_eq!(step.status(), StepStatus::Success);
    }

    #[tokio::test]
    async fn test_step_error_formatting() {
        let transport = test_transport();
        let mut step = start_step(&transport);
        let error = std::io::Error::new(std::io::ErrorKind::TimedOut, "upstream timed out");
        step.end_with_error(&error);

        assert_eq!(step.status(), StepStatus::Error);
        assert_eq!(
            step.error_message.as_deref(),
            Some("Error: upstream timed out")
        );
    }

    #[tokio::test]
    async fn test_reasoning_merging() {
        let transport = test_transport();
        let mut step = start_step(&transport);
        step.attach_reasoning(json!("dropped items over budget"));
        step.attach_reasoning(json!({"threshold": 100}));
        assert_eq!(step.reasoning["explanation"], "dropped items over budget");
        assert_eq!(step.reasoning["threshold"], 100);

        step.end(&json!(null));
        // Attach after end is a no-op.
        step.attach_reasoning(json!({"late": true}));
        assert!(step.reasoning.get("late").is_none());
    }
}
