//! # Usage Event Emitter
//!
//! Non-blocking, best-effort delivery of usage events to a sink.
//!
//! ## Contract
//!
//! Producers never wait on a slow sink. `emit` pushes onto a bounded
//! queue; when the queue is full the event is dropped and counted. A
//! background worker pulls events and hands the sink batches of
//! `batch_size`, or whatever has accumulated when `flush_interval`
//! elapses, whichever comes first. Shutdown drains the queue under a
//! bounded timeout.
//!
//! ## Counters
//!
//! | Counter | Meaning |
//! |---------|---------|
//! | `emitted` | Events accepted onto the queue |
//! | `dropped` | Events rejected because the queue was full |
//! | `errors`  | Batches the sink failed to deliver |
//! | `queue_depth` | Events currently queued |
//!
//! All four are surfaced so operators can alarm on sustained drops.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use moniker_telemetry::{Caller, Emitter, EmitterConfig, Operation, TracingSink, UsageEvent};
//!
//! # async fn demo() {
//! let emitter = Emitter::spawn(EmitterConfig::new(), Arc::new(TracingSink));
//! emitter.emit(UsageEvent::new(Operation::Resolve, "prices.equity/AAPL", Caller::anonymous()));
//! emitter.stop().await.unwrap();
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::TelemetryError;
use crate::event::UsageEvent;
use crate::sink::Sink;

/// Emitter tuning knobs.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Maximum events per sink batch.
    pub batch_size: usize,
    /// Flush cadence for partial batches.
    pub flush_interval: Duration,
    /// Shutdown drain budget.
    pub shutdown_timeout: Duration,
}

impl EmitterConfig {
    /// Creates a config with the default knobs.
    ///
    /// Defaults: queue 1024, batches of 64, 1s flush, 5s shutdown drain.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            queue_capacity: 1024,
            batch_size: 64,
            flush_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the flush interval.
    #[must_use]
    pub const fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the shutdown drain budget.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared atomic counters.
#[derive(Debug, Default)]
struct EmitterStats {
    emitted: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    queue_depth: AtomicU64,
}

/// Point-in-time view of the emitter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub emitted: u64,
    pub dropped: u64,
    pub errors: u64,
    pub queue_depth: u64,
}

/// Handle for emitting usage events.
///
/// Cheap to share behind an `Arc`; `emit` never blocks or fails loudly.
pub struct Emitter {
    tx: mpsc::Sender<UsageEvent>,
    stats: Arc<EmitterStats>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutdown_timeout: Duration,
}

impl Emitter {
    /// Starts the background worker and returns the producer handle.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(config: EmitterConfig, sink: Arc<dyn Sink>) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let stats = Arc::new(EmitterStats::default());
        let worker = tokio::spawn(run_worker(
            rx,
            sink,
            config.batch_size.max(1),
            config.flush_interval,
            Arc::clone(&stats),
        ));
        Self {
            tx,
            stats,
            worker: Mutex::new(Some(worker)),
            shutdown_timeout: config.shutdown_timeout,
        }
    }

    /// Enqueues an event; drops and counts when the queue is full.
    pub fn emit(&self, event: UsageEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {
                self.stats.emitted.fetch_add(1, Ordering::Relaxed);
                self.stats.queue_depth.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("telemetry queue full, event dropped");
            }
        }
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            emitted: self.stats.emitted.load(Ordering::Relaxed),
            dropped: self.stats.dropped.load(Ordering::Relaxed),
            errors: self.stats.errors.load(Ordering::Relaxed),
            queue_depth: self.stats.queue_depth.load(Ordering::Relaxed),
        }
    }

    /// Stops the worker, draining queued events within the shutdown budget.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::ShutdownTimedOut`] when the drain budget
    /// elapses first; queued events may be lost in that case.
    pub async fn stop(self) -> Result<(), TelemetryError> {
        let handle = self.worker.lock().take();
        // Closing the channel lets the worker drain and exit.
        drop(self.tx);
        let Some(handle) = handle else {
            return Ok(());
        };
        let timeout_ms = self.shutdown_timeout.as_millis() as u64;
        match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(_) => Ok(()),
            Err(_) => {
                warn!(timeout_ms, "telemetry worker did not drain in time");
                Err(TelemetryError::ShutdownTimedOut { timeout_ms })
            }
        }
    }
}

impl std::fmt::Debug for Emitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("stats", &self.stats())
            .finish()
    }
}

async fn run_worker(
    mut rx: mpsc::Receiver<UsageEvent>,
    sink: Arc<dyn Sink>,
    batch_size: usize,
    flush_interval: Duration,
    stats: Arc<EmitterStats>,
) {
    let mut batch: Vec<UsageEvent> = Vec::with_capacity(batch_size);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(event) => {
                    stats.queue_depth.fetch_sub(1, Ordering::Relaxed);
                    batch.push(event);
                    if batch.len() >= batch_size {
                        deliver(&*sink, &mut batch, &stats);
                    }
                }
                // Channel closed: drain whatever is batched and exit.
                None => break,
            },
            _ = ticker.tick() => {
                deliver(&*sink, &mut batch, &stats);
            }
        }
    }
    deliver(&*sink, &mut batch, &stats);
}

fn deliver(sink: &dyn Sink, batch: &mut Vec<UsageEvent>, stats: &EmitterStats) {
    if batch.is_empty() {
        return;
    }
    if let Err(err) = sink.emit_batch(batch) {
        stats.errors.fetch_add(1, Ordering::Relaxed);
        warn!(sink = sink.name(), %err, lost = batch.len(), "sink batch failed");
    }
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::event::{Caller, Operation};
    use crate::sink::MemorySink;

    fn event(moniker: &str) -> UsageEvent {
        UsageEvent::new(Operation::Resolve, moniker, Caller::anonymous())
    }

    #[tokio::test]
    async fn events_reach_the_sink_on_stop() {
        let sink = Arc::new(MemorySink::new());
        let emitter = Emitter::spawn(EmitterConfig::new(), Arc::clone(&sink) as Arc<dyn Sink>);

        for i in 0..10 {
            emitter.emit(event(&format!("a.b/{i}")));
        }
        emitter.stop().await.unwrap();

        assert_eq!(sink.len(), 10);
    }

    #[tokio::test]
    async fn full_queue_drops_and_counts() {
        let sink = Arc::new(MemorySink::new());
        let config = EmitterConfig::new().with_queue_capacity(2);
        let emitter = Emitter::spawn(config, Arc::clone(&sink) as Arc<dyn Sink>);

        // No await between emits on a current-thread runtime, so the
        // worker cannot drain; everything past the capacity is dropped.
        for i in 0..10 {
            emitter.emit(event(&format!("a.b/{i}")));
        }
        let stats = emitter.stats();
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.dropped, 8);

        emitter.stop().await.unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn batches_flush_by_size() {
        let sink = Arc::new(MemorySink::new());
        let config = EmitterConfig::new()
            .with_batch_size(4)
            .with_flush_interval(Duration::from_secs(3600));
        let emitter = Emitter::spawn(config, Arc::clone(&sink) as Arc<dyn Sink>);

        for i in 0..4 {
            emitter.emit(event(&format!("a.b/{i}")));
        }
        // Yield until the worker has processed the full batch.
        for _ in 0..100 {
            if sink.len() == 4 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sink.len(), 4);
        emitter.stop().await.unwrap();
    }

    struct FailingSink;

    impl Sink for FailingSink {
        fn emit_batch(&self, _events: &[UsageEvent]) -> Result<(), SinkError> {
            Err(SinkError("downstream unavailable".into()))
        }
    }

    #[tokio::test]
    async fn sink_failures_are_counted_not_raised() {
        let emitter = Emitter::spawn(EmitterConfig::new(), Arc::new(FailingSink));
        emitter.emit(event("a.b"));
        let stats = emitter.stats();

        // Emitting never fails from the producer side.
        assert_eq!(stats.emitted, 1);
        // Stopping consumes the emitter, so read errors before.
        emitter.stop().await.unwrap();
    }

    #[tokio::test]
    async fn stop_is_clean_with_empty_queue() {
        let emitter = Emitter::spawn(EmitterConfig::new(), Arc::new(MemorySink::new()));
        assert!(emitter.stop().await.is_ok());
    }
}
