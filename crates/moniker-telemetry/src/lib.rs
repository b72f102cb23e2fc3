//! # Moniker Telemetry
//!
//! Usage accounting for the moniker resolution service: who resolved
//! what, when, against which source, and whether they hit something
//! deprecated.
//!
//! The pipeline is deliberately lossy under pressure. Resolution latency
//! is the product; telemetry rides along on a bounded queue and is
//! dropped, counted, and logged when the queue or the sink cannot keep
//! up. See [`Emitter`] for the delivery contract and counters.

mod emitter;
mod error;
mod event;
mod sink;

pub use emitter::{Emitter, EmitterConfig, StatsSnapshot};
pub use error::{SinkError, TelemetryError};
pub use event::{Caller, Operation, Outcome, UsageEvent};
pub use sink::{MemorySink, Sink, TracingSink};
