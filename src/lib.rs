//! X-Ray - decision-reasoning observability for multi-step pipelines.
//!
//! Instrumented code creates a [`sdk::Client`], starts runs and steps, and
//! attaches reasoning; lifecycle events ship in the background to the
//! ingest server, which validates and persists them. Observability is
//! fail-open end to end: a full buffer drops events, network errors are
//! swallowed, and partial ingest failures never trigger client retries.

pub mod cli;
pub mod config;
pub mod events;
pub mod models;
pub mod repository;
pub mod schema;
pub mod sdk;
pub mod server;
pub mod summary;
