//! Ingest endpoint handler.
//!
//! Events are processed sequentially in the order received so that
//! parent-child references resolve within one batch (run before step,
//! start before end). Each event is isolated: a failure is recorded in the
//! response and the rest of the batch continues. The endpoint always
//! answers HTTP 200 for a well-formed batch; the SDK must not retry on
//! partial failures.

use axum::extract::State;
use axum::Json;
use serde_json::{Map, Value};
use tracing::error;
use uuid::Uuid;

use super::AppState;
use crate::events::{
    Event, EventResult, IngestResponse, RunEndEvent, RunStartEvent, StepEndEvent, StepStartEvent,
};
use crate::models::Phase;
use crate::repository::RepositoryError;

/// `POST /ingest` - persist a batch of SDK events.
pub async fn ingest_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<Event>>,
) -> Json<IngestResponse> {
    let mut results: Vec<EventResult> = Vec::with_capacity(events.len());

    for event in &events {
        match process_event(&state, event).await {
            Ok(()) => results.push(EventResult {
                id: event.id(),
                event_type: event.event_type().to_string(),
                success: true,
                error: None,
            }),
            Err(e) => {
                let message = e.to_string();
                error!(
                    "Error processing event {} of type {}: {}",
                    event.id(),
                    event.event_type(),
                    message
                );
                results.push(EventResult {
                    id: event.id(),
                    event_type: event.event_type().to_string(),
                    success: false,
                    error: Some(message),
                });
            }
        }
    }

    let succeeded = results.iter().filter(|r| r.success).count();
    Json(IngestResponse {
        processed: events.len(),
        succeeded,
        failed: events.len() - succeeded,
        results,
    })
}

/// Dispatch a single event to its persistence handler.
async fn process_event(state: &AppState, event: &Event) -> Result<(), RepositoryError> {
    match event {
        Event::RunStart(e) => handle_run_start(state, e).await,
        Event::RunEnd(e) => handle_run_end(state, e).await,
        Event::StepStart(e) => handle_step_start(state, e).await,
        Event::StepEnd(e) => handle_step_end(state, e).await,
    }
}

/// Store externalized payloads for an already-committed event.
///
/// Failures here are logged and swallowed: the primary row is written and
/// partial info is better than none.
async fn store_payloads(
    state: &AppState,
    run_id: &str,
    step_id: Option<&str>,
    phase: Phase,
    event_id: Uuid,
    payloads: Option<&Map<String, Value>>,
) {
    let Some(payloads) = payloads else {
        return;
    };

    if let Err(e) = state
        .payloads
        .create_payloads(run_id, step_id, phase, payloads)
        .await
    {
        error!("Failed to store payloads for event {}: {}", event_id, e);
    }
}

async fn handle_run_start(state: &AppState, event: &RunStartEvent) -> Result<(), RepositoryError> {
    state.runs.create(event).await?;

    store_payloads(
        state,
        &event.id.to_string(),
        None,
        Phase::Input,
        event.id,
        event.payloads.as_ref(),
    )
    .await;
    Ok(())
}

async fn handle_run_end(state: &AppState, event: &RunEndEvent) -> Result<(), RepositoryError> {
    state
        .runs
        .end(event)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Run {}", event.id)))?;

    store_payloads(
        state,
        &event.id.to_string(),
        None,
        Phase::Output,
        event.id,
        event.payloads.as_ref(),
    )
    .await;
    Ok(())
}

async fn handle_step_start(state: &AppState, event: &StepStartEvent) -> Result<(), RepositoryError> {
    state.steps.create(event).await?;

    store_payloads(
        state,
        &event.run_id.to_string(),
        Some(&event.id.to_string()),
        Phase::Input,
        event.id,
        event.payloads.as_ref(),
    )
    .await;
    Ok(())
}

async fn handle_step_end(state: &AppState, event: &StepEndEvent) -> Result<(), RepositoryError> {
    let step = state
        .steps
        .end(event)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("Step {}", event.id)))?;

    // Use the run_id verified from the database, not the client-supplied one.
    store_payloads(
        state,
        &step.run_id,
        Some(&event.id.to_string()),
        Phase::Output,
        event.id,
        event.payloads.as_ref(),
    )
    .await;
    Ok(())
}
