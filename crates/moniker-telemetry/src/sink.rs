//! Sink abstraction for delivering event batches.
//!
//! Concrete transports (file, pub-sub) live outside this crate; a sink
//! only has to accept a batch. Sink failures are counted by the emitter
//! and never reach the request path.

use parking_lot::Mutex;
use tracing::info;

use crate::error::SinkError;
use crate::event::UsageEvent;

/// A destination for usage event batches.
pub trait Sink: Send + Sync {
    /// Delivers one batch. Implementations should be quick or buffer
    /// internally; the emitter worker is the only caller.
    fn emit_batch(&self, events: &[UsageEvent]) -> Result<(), SinkError>;

    /// Short name for logs and counters.
    fn name(&self) -> &str {
        "sink"
    }
}

/// Writes each event as a structured log line.
#[derive(Debug, Default)]
pub struct TracingSink;

impl Sink for TracingSink {
    fn emit_batch(&self, events: &[UsageEvent]) -> Result<(), SinkError> {
        for event in events {
            info!(
                target: "moniker::usage",
                operation = ?event.operation,
                outcome = ?event.outcome,
                moniker = %event.moniker,
                app_id = %event.caller.app_id,
                latency_ms = event.latency_ms,
                deprecated = event.deprecated,
                "usage"
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "tracing"
    }
}

/// Captures events in memory; test support.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<UsageEvent>>,
}

impl MemorySink {
    /// Creates an empty capture sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of captured events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// True when nothing has been captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drains and returns everything captured so far.
    #[must_use]
    pub fn take(&self) -> Vec<UsageEvent> {
        std::mem::take(&mut self.events.lock())
    }

    /// Clones the captured events without draining.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UsageEvent> {
        self.events.lock().clone()
    }
}

impl Sink for MemorySink {
    fn emit_batch(&self, events: &[UsageEvent]) -> Result<(), SinkError> {
        self.events.lock().extend_from_slice(events);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Caller, Operation};

    #[test]
    fn memory_sink_captures_batches() {
        let sink = MemorySink::new();
        let events = vec![
            UsageEvent::new(Operation::Resolve, "a.b", Caller::anonymous()),
            UsageEvent::new(Operation::Describe, "a.b", Caller::anonymous()),
        ];
        sink.emit_batch(&events).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.is_empty());
    }
}
