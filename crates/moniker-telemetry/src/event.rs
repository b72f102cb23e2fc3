//! Usage event shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The catalog operation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Resolve,
    Read,
    Describe,
    List,
    Lineage,
}

/// How the operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Error,
    NotFound,
}

/// Who made the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Calling application identifier.
    pub app_id: String,
    /// Owning team, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
}

impl Caller {
    /// Creates a caller with just an application id.
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            team: None,
        }
    }

    /// An anonymous caller for unattributed requests.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::new("anonymous")
    }
}

/// One recorded access to the catalog.
///
/// Events are emitted best-effort; nothing in the request path ever waits
/// on them. Build with [`UsageEvent::new`] and the `with_*` helpers:
///
/// ```rust
/// use moniker_telemetry::{Caller, Operation, Outcome, UsageEvent};
///
/// let event = UsageEvent::new(Operation::Resolve, "prices.equity/AAPL", Caller::new("pricing-ui"))
///     .with_outcome(Outcome::Success)
///     .with_source_type("snowflake")
///     .with_latency_ms(3);
/// assert_eq!(event.operation, Operation::Resolve);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub caller: Caller,
    pub moniker: String,
    pub operation: Operation,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_type: Option<String>,
    pub latency_ms: u64,
    /// Accountable owner at the time of access.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_at_access: Option<String>,
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
    /// Failure detail for non-success outcomes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UsageEvent {
    /// Creates a success event stamped now with a fresh request id.
    #[must_use]
    pub fn new(operation: Operation, moniker: impl Into<String>, caller: Caller) -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
            caller,
            moniker: moniker.into(),
            operation,
            outcome: Outcome::Success,
            source_type: None,
            latency_ms: 0,
            owner_at_access: None,
            deprecated: false,
            successor: None,
            redirected_from: None,
            error: None,
        }
    }

    /// Sets the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = outcome;
        self
    }

    /// Sets the resolved source type.
    #[must_use]
    pub fn with_source_type(mut self, source_type: impl Into<String>) -> Self {
        self.source_type = Some(source_type.into());
        self
    }

    /// Sets the observed latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Sets the accountable owner at access time.
    #[must_use]
    pub fn with_owner(mut self, owner: Option<impl Into<String>>) -> Self {
        self.owner_at_access = owner.map(Into::into);
        self
    }

    /// Marks the event as touching a deprecated node.
    #[must_use]
    pub fn with_deprecation(
        mut self,
        deprecated: bool,
        successor: Option<String>,
        redirected_from: Option<String>,
    ) -> Self {
        self.deprecated = deprecated;
        self.successor = successor;
        self.redirected_from = redirected_from;
        self
    }

    /// Attaches a failure detail.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_documented_tags() {
        let event = UsageEvent::new(Operation::Resolve, "a.b/c", Caller::anonymous())
            .with_outcome(Outcome::NotFound);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "RESOLVE");
        assert_eq!(json["outcome"], "not_found");
        assert_eq!(json["caller"]["app_id"], "anonymous");
    }

    #[test]
    fn request_ids_are_unique() {
        let a = UsageEvent::new(Operation::Read, "a.b", Caller::anonymous());
        let b = UsageEvent::new(Operation::Read, "a.b", Caller::anonymous());
        assert_ne!(a.request_id, b.request_id);
    }
}
