//! Client SDK for instrumenting pipelines.
//!
//! A [`Client`] owns the buffered [`Transport`]; runs and steps created from
//! it emit lifecycle events that ship in the background. Observability never
//! blocks or fails the instrumented code: full queues drop events and
//! network errors are logged and swallowed.

mod run;
mod step;
mod transport;

pub use run::{Run, RunOptions};
pub use step::Step;
pub use transport::Transport;

use std::time::Duration;

use serde::Serialize;

use crate::config::SdkConfig;

/// Entry point for instrumented code.
#[derive(Clone)]
pub struct Client {
    config: SdkConfig,
    transport: Transport,
}

impl Client {
    /// Create a client from SDK configuration.
    pub fn new(config: SdkConfig) -> Self {
        let transport = Transport::new(config.clone());
        Self { config, transport }
    }

    /// Start the background shipper. No-op when already started.
    pub async fn start(&self) {
        self.transport.start().await;
    }

    /// Flush what can be flushed and stop the transport.
    pub async fn shutdown(&self, wait: Duration) {
        self.transport.shutdown(wait).await;
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Begin a run of the named pipeline.
    pub fn start_run<T: Serialize + ?Sized>(&self, pipeline_name: &str, input: &T) -> Run {
        self.start_run_with(pipeline_name, input, RunOptions::default())
    }

    /// Begin a run with metadata and correlation tags.
    pub fn start_run_with<T: Serialize + ?Sized>(
        &self,
        pipeline_name: &str,
        input: &T,
        options: RunOptions,
    ) -> Run {
        Run::start(
            self.transport.clone(),
            self.config.default_detail,
            pipeline_name,
            input,
            options,
        )
    }
}
