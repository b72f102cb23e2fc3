//! Error types for the telemetry pipeline.

use thiserror::Error;

/// A sink failed to deliver a batch.
///
/// Sink failures never propagate to the request path; the emitter counts
/// them and moves on.
#[derive(Debug, Clone, Error)]
#[error("sink delivery failed: {0}")]
pub struct SinkError(pub String);

/// Errors surfaced by emitter lifecycle operations.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The worker did not drain within the shutdown budget.
    #[error("emitter shutdown timed out after {timeout_ms}ms")]
    ShutdownTimedOut {
        /// Budget that was exceeded.
        timeout_ms: u64,
    },
}
