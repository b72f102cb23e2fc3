//! Proposed-moniker requests awaiting review.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use moniker_catalog::{Ownership, SourceBinding};

/// A proposed new moniker, as submitted for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonikerProposal {
    /// Catalog path the moniker would live at.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_binding: Option<SourceBinding>,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl MonikerProposal {
    /// Creates a proposal for `path` with everything else unset.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: None,
            description: None,
            source_binding: None,
            ownership: Ownership::default(),
            tags: Vec::new(),
        }
    }

    /// Attaches the proposed binding.
    #[must_use]
    pub fn with_binding(mut self, binding: SourceBinding) -> Self {
        self.source_binding = Some(binding);
        self
    }
}

/// Where a request is in its review lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

/// A submitted request and its review state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonikerRequest {
    /// Opaque request id.
    pub id: String,
    pub proposal: MonikerProposal,
    pub requested_by: String,
    pub submitted_at: DateTime<Utc>,
    pub status: RequestStatus,
    /// Reviewer identity, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Rejection reason, when rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution_reason: Option<String>,
}

impl MonikerRequest {
    /// Creates a pending request with a fresh id.
    #[must_use]
    pub fn new(proposal: MonikerProposal, requested_by: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            proposal,
            requested_by: requested_by.into(),
            submitted_at: Utc::now(),
            status: RequestStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            resolution_reason: None,
        }
    }

    /// True while the request awaits review.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requests_are_pending_with_unique_ids() {
        let a = MonikerRequest::new(MonikerProposal::new("a.b"), "alice");
        let b = MonikerRequest::new(MonikerProposal::new("a.b"), "alice");
        assert!(a.is_pending());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_value(RequestStatus::Pending).unwrap();
        assert_eq!(json, "pending");
    }
}
