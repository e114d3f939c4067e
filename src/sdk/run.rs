//! A pipeline run: the client-side root of the event lifecycle.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::step::{format_error, process_value, Step};
use super::transport::Transport;
use crate::events::{Event, RunEndEvent, RunStartEvent};
use crate::models::{DetailLevel, RunStatus, StepType};

/// Optional tags attached to a run at start.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Free-form metadata stored with the run.
    pub metadata: Option<Value>,
    /// Request correlation id.
    pub request_id: Option<String>,
    /// End-user id.
    pub user_id: Option<String>,
    /// Deployment environment tag (e.g. "staging").
    pub environment: Option<String>,
}

/// One execution of a named pipeline.
///
/// Emits `run_start` on creation and `run_end` exactly once, no matter how
/// many times `end`/`end_with_error` are called. Steps copy the run id at
/// creation; they never hold a reference back to the run.
pub struct Run {
    id: Uuid,
    pipeline_name: String,
    transport: Transport,
    detail: DetailLevel,
    started_at: DateTime<Utc>,
    start_instant: Instant,
    next_index: AtomicI32,
    ended: AtomicBool,
}

impl Run {
    pub(crate) fn start<T: Serialize + ?Sized>(
        transport: Transport,
        detail: DetailLevel,
        pipeline_name: &str,
        input: &T,
        options: RunOptions,
    ) -> Self {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        let (input_summary, _count, payloads) = process_value(input, detail, "input");

        let run = Self {
            id,
            pipeline_name: pipeline_name.to_string(),
            transport,
            detail,
            started_at,
            start_instant: Instant::now(),
            next_index: AtomicI32::new(0),
            ended: AtomicBool::new(false),
        };

        run.transport.send(Event::RunStart(RunStartEvent {
            id,
            pipeline_name: run.pipeline_name.clone(),
            status: RunStatus::Running,
            started_at,
            input_summary: Some(input_summary),
            metadata: options.metadata,
            request_id: options.request_id,
            user_id: options.user_id,
            environment: options.environment,
            payloads,
        }));

        run
    }

    /// Run unique identifier.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Pipeline name this run executes.
    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    /// When the run started (UTC wall clock).
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Monotonic time elapsed since the run started.
    pub fn elapsed(&self) -> Duration {
        self.start_instant.elapsed()
    }

    /// Start a step within this run. Indexes are assigned in call order;
    /// concurrent steps each get their own index and identifiers.
    pub fn start_step<T: Serialize + ?Sized>(
        &self,
        name: &str,
        step_type: StepType,
        input: &T,
        metadata: Option<Value>,
    ) -> Step {
        let index = self.next_index.fetch_add(1, Ordering::SeqCst);
        Step::start(
            self.transport.clone(),
            self.id,
            name,
            step_type,
            index,
            input,
            metadata,
            self.detail,
        )
    }

    /// End the run successfully with its output. Idempotent.
    pub fn end<T: Serialize + ?Sized>(&self, output: &T) {
        self.finish(Some(output), RunStatus::Success, None);
    }

    /// End the run with an error. Idempotent.
    pub fn end_with_error<E: std::error::Error>(&self, error: &E) {
        self.finish(None::<&()>, RunStatus::Error, Some(format_error(error)));
    }

    /// End the run with an error message.
    pub fn end_with_error_message(&self, message: impl Into<String>) {
        self.finish(None::<&()>, RunStatus::Error, Some(message.into()));
    }

    fn finish<T: Serialize + ?Sized>(
        &self,
        output: Option<&T>,
        status: RunStatus,
        error_message: Option<String>,
    ) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }

        let (output_summary, payloads) = match output {
            Some(value) => {
                let (summary, _count, payloads) = process_value(value, self.detail, "output");
                (Some(summary), payloads)
            }
            None => (None, None),
        };

        self.transport.send(Event::RunEnd(RunEndEvent {
            id: self.id,
            status,
            ended_at: Utc::now(),
            output_summary,
            error_message,
            payloads,
        }));
    }
}
