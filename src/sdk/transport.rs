//! Buffered async transport for shipping events to the ingest API.
//!
//! Events are queued and sent in batches to minimize overhead. The queue is
//! bounded; when it is full, events are dropped (fail-open). Network errors
//! are logged but never reach the instrumented application.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use crate::config::SdkConfig;
use crate::events::Event;

/// Minimum dequeue wait, so a nearly-expired deadline still polls the queue.
const MIN_POLL_WAIT: Duration = Duration::from_millis(100);
/// Backoff after a failed flush, to avoid tight failure loops.
const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Async buffered transport with fail-open semantics.
///
/// Cloning is cheap; all clones share one queue and one background worker.
#[derive(Clone)]
pub struct Transport {
    inner: Arc<Inner>,
}

struct Inner {
    config: SdkConfig,
    /// Effective batch size, clamped to the queue capacity.
    batch_size: usize,
    flush_interval: Duration,
    tx: mpsc::Sender<Event>,
    rx: Mutex<mpsc::Receiver<Event>>,
    client: std::sync::Mutex<Option<reqwest::Client>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown: AtomicBool,
    /// Set once `shutdown` completes; enqueue becomes a silent drop.
    stopped: AtomicBool,
    /// Whether the background worker has been spawned.
    started: AtomicBool,
    queue_len: AtomicUsize,
}

impl Transport {
    /// Create a transport. Events may be enqueued immediately; nothing is
    /// shipped until [`Transport::start`] spawns the worker.
    pub fn new(config: SdkConfig) -> Self {
        let capacity = config.buffer_size.max(1);
        let batch_size = config.batch_size.clamp(1, capacity);
        let flush_interval = Duration::from_secs_f64(config.flush_interval.max(0.0));
        let (tx, rx) = mpsc::channel(capacity);

        Self {
            inner: Arc::new(Inner {
                config,
                batch_size,
                flush_interval,
                tx,
                rx: Mutex::new(rx),
                client: std::sync::Mutex::new(None),
                worker: Mutex::new(None),
                shutdown: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                started: AtomicBool::new(false),
                queue_len: AtomicUsize::new(0),
            }),
        }
    }

    /// Whether the background worker is running.
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Current number of events waiting in the queue.
    pub fn queue_size(&self) -> usize {
        self.inner.queue_len.load(Ordering::SeqCst)
    }

    /// Start the background worker. No-op when already started.
    pub async fn start(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.inner.config.base_url.is_some() {
            let client = build_client(&self.inner.config);
            *self.inner.client.lock().unwrap_or_else(|e| e.into_inner()) = client;
        }

        self.inner.shutdown.store(false, Ordering::SeqCst);
        self.inner.stopped.store(false, Ordering::SeqCst);
        let worker = tokio::spawn(worker_loop(Arc::clone(&self.inner)));
        *self.inner.worker.lock().await = Some(worker);
        debug!("Transport started");
    }

    /// Queue an event for sending. Non-blocking, fail-open.
    ///
    /// Returns true if the event was queued, false if dropped (transport
    /// stopped or buffer full). Never fails.
    pub fn send(&self, event: Event) -> bool {
        if self.inner.stopped.load(Ordering::SeqCst) {
            debug!("Transport stopped, dropping event");
            return false;
        }

        match self.inner.tx.try_send(event) {
            Ok(()) => {
                self.inner.queue_len.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event buffer full, dropping event");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Transport queue closed, dropping event");
                false
            }
        }
    }

    /// Gracefully shut down, attempting to flush remaining events.
    ///
    /// Waits up to `wait` for the worker to finish its current batch, then
    /// cancels it. New sends are refused before the final drain so racing
    /// producers cannot re-insert behind it.
    pub async fn shutdown(&self, wait: Duration) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        debug!("Shutting down transport");
        self.inner.shutdown.store(true, Ordering::SeqCst);

        let worker = self.inner.worker.lock().await.take();
        if let Some(mut handle) = worker {
            if timeout(wait, &mut handle).await.is_err() {
                handle.abort();
                let _ = handle.await;
            }
        }
        self.inner.started.store(false, Ordering::SeqCst);

        let remaining = self.drain().await;
        if !remaining.is_empty() {
            debug!("Flushing {} remaining events", remaining.len());
            if let Err(e) = self.inner.flush_batch(&remaining).await {
                warn!("Error flushing remaining events during shutdown: {e}");
            }
        }

        *self.inner.client.lock().unwrap_or_else(|e| e.into_inner()) = None;
        debug!("Transport shutdown complete");
    }

    /// Pull everything left in the queue without waiting.
    async fn drain(&self) -> Vec<Event> {
        let mut rx = self.inner.rx.lock().await;
        let mut remaining = Vec::new();
        while let Ok(event) = rx.try_recv() {
            self.inner.queue_len.fetch_sub(1, Ordering::SeqCst);
            remaining.push(event);
        }
        remaining
    }
}

/// Build the HTTP client with auth and timeout from config.
fn build_client(config: &SdkConfig) -> Option<reqwest::Client> {
    let mut headers = HeaderMap::new();
    if let Some(api_key) = &config.api_key {
        match HeaderValue::from_str(&format!("Bearer {api_key}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            Err(_) => warn!("Invalid api_key, sending without authorization"),
        }
    }

    match reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs_f64(config.http_timeout.max(0.1)))
        .build()
    {
        Ok(client) => Some(client),
        Err(e) => {
            warn!("Failed to build HTTP client: {e}");
            None
        }
    }
}

/// Background worker: batch events and flush until shutdown is signaled.
async fn worker_loop(inner: Arc<Inner>) {
    while !inner.shutdown.load(Ordering::SeqCst) {
        let batch = inner.collect_batch().await;
        if batch.is_empty() {
            continue;
        }
        match inner.flush_batch(&batch).await {
            Ok(()) => debug!("Flushed {} events", batch.len()),
            Err(e) => {
                warn!("Error sending events: {e}");
                tokio::time::sleep(FAILURE_BACKOFF).await;
            }
        }
    }
}

impl Inner {
    /// Collect events into a batch, bounded by size and deadline.
    async fn collect_batch(&self) -> Vec<Event> {
        let mut batch = Vec::new();
        let deadline = Instant::now() + self.flush_interval;
        let mut rx = self.rx.lock().await;

        while batch.len() < self.batch_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match timeout(remaining.max(MIN_POLL_WAIT), rx.recv()).await {
                Ok(Some(event)) => {
                    self.queue_len.fetch_sub(1, Ordering::SeqCst);
                    batch.push(event);
                }
                Ok(None) | Err(_) => break,
            }
        }

        batch
    }

    /// Ship one batch. HTTP and status errors are returned for logging;
    /// the batch is dropped either way (no retry, no re-queue).
    async fn flush_batch(&self, events: &[Event]) -> Result<(), reqwest::Error> {
        let client = self
            .client
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let (Some(client), Some(base_url)) = (client, self.config.base_url.as_deref()) else {
            debug!("No API configured, discarding {} events", events.len());
            return Ok(());
        };

        let url = format!("{}/ingest", base_url.trim_end_matches('/'));
        let response = client.post(&url).json(&events).send().await?;
        response.error_for_status()?;
        Ok(())
    }
}
