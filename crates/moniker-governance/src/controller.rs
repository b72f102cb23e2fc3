//! The governance controller: request lanes and validated reload.
//!
//! Two lanes with separate authorization drive catalog change:
//!
//! - **Submit lane** (submit token): propose a new moniker, list pending
//!   requests.
//! - **Approve lane** (approve token): approve or reject requests and
//!   drive the node status state machine.
//!
//! Approval materializes the proposal as a `DRAFT` node and immediately
//! transitions it `DRAFT -> ACTIVE`, so both steps land in the audit
//! trail. Reloads go through the registry's diff-and-audit path; when
//! deprecation handling is disabled the reload degrades to a plain
//! atomic swap with no diff.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use moniker_catalog::{
    CatalogDefinition, CatalogDiff, CatalogNode, CatalogRegistry, NodeStatus, StatusMetadata,
};
use moniker_path::MonikerPath;

use crate::auth::{AuthGate, Role};
use crate::error::{GovernanceError, Result};
use crate::requests::{MonikerProposal, MonikerRequest, RequestStatus};

/// Outcome of a catalog reload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadReport {
    /// Whether the replacement was published.
    pub applied: bool,
    pub added_count: usize,
    pub removed_count: usize,
    pub binding_changed_count: usize,
    pub status_changed_count: usize,
    pub has_breaking_changes: bool,
    /// Successor problems found after an applied reload; warnings, the
    /// reload stays applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub successor_errors: Vec<String>,
    /// The full categorized diff, absent when diffing was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<CatalogDiff>,
}

/// Governs catalog mutation: requests, status changes, reloads.
pub struct GovernanceController {
    registry: Arc<CatalogRegistry>,
    auth: AuthGate,
    requests: Mutex<Vec<MonikerRequest>>,
    deprecation_enabled: bool,
}

impl GovernanceController {
    /// Creates a controller over `registry`.
    #[must_use]
    pub fn new(registry: Arc<CatalogRegistry>, auth: AuthGate, deprecation_enabled: bool) -> Self {
        Self {
            registry,
            auth,
            requests: Mutex::new(Vec::new()),
            deprecation_enabled,
        }
    }

    /// The auth gate, for callers that need role checks of their own.
    #[must_use]
    pub fn auth(&self) -> &AuthGate {
        &self.auth
    }

    /// Submit lane: enqueues a proposal for review.
    ///
    /// The proposed path must parse as a plain catalog path and must not
    /// already exist or have a pending request.
    pub fn submit_request(
        &self,
        token: Option<&str>,
        proposal: MonikerProposal,
        requested_by: &str,
    ) -> Result<MonikerRequest> {
        self.auth.require(token, Role::Submitter)?;

        let parsed = MonikerPath::parse(&proposal.path)?;
        let path = parsed.lookup_key();
        if self.registry.get(&path).is_some() {
            return Err(GovernanceError::Conflict(format!(
                "moniker {path} already exists"
            )));
        }
        let mut requests = self.requests.lock();
        if requests.iter().any(|r| r.is_pending() && r.proposal.path == path) {
            return Err(GovernanceError::Conflict(format!(
                "a pending request for {path} already exists"
            )));
        }

        let mut proposal = proposal;
        proposal.path = path;
        let request = MonikerRequest::new(proposal, requested_by);
        info!(id = %request.id, path = %request.proposal.path, "moniker request submitted");
        requests.push(request.clone());
        Ok(request)
    }

    /// Submit lane: lists requests, optionally filtered by status.
    pub fn list_requests(
        &self,
        token: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<MonikerRequest>> {
        self.auth.require(token, Role::Submitter)?;
        Ok(self
            .requests
            .lock()
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect())
    }

    /// Approve lane: materializes a pending request as an active node.
    ///
    /// # Errors
    ///
    /// `Conflict` when the request was already resolved or the path
    /// appeared in the catalog since submission.
    pub fn approve_request(
        &self,
        token: Option<&str>,
        request_id: &str,
        actor: &str,
    ) -> Result<MonikerRequest> {
        self.auth.require(token, Role::Approver)?;

        let proposal = {
            let requests = self.requests.lock();
            let request = requests
                .iter()
                .find(|r| r.id == request_id)
                .ok_or_else(|| GovernanceError::UnknownRequest(request_id.to_string()))?;
            if !request.is_pending() {
                return Err(GovernanceError::Conflict(format!(
                    "request {request_id} was already resolved"
                )));
            }
            request.proposal.clone()
        };

        if self.registry.get(&proposal.path).is_some() {
            return Err(GovernanceError::Conflict(format!(
                "moniker {} already exists",
                proposal.path
            )));
        }

        let node = CatalogNode {
            path: proposal.path.clone(),
            display_name: proposal.display_name.clone(),
            description: proposal.description.clone(),
            tags: proposal.tags.clone(),
            semantic_tags: Vec::new(),
            status: NodeStatus::Draft,
            deprecation_message: None,
            successor: None,
            sunset_deadline: None,
            migration_guide_url: None,
            ownership: proposal.ownership.clone(),
            source_binding: proposal.source_binding.clone(),
            documentation: None,
        };
        self.registry.upsert_node(node, actor)?;
        self.registry.update_status(
            &proposal.path,
            NodeStatus::Active,
            actor,
            StatusMetadata::default(),
        )?;

        let mut requests = self.requests.lock();
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| GovernanceError::UnknownRequest(request_id.to_string()))?;
        request.status = RequestStatus::Approved;
        request.resolved_by = Some(actor.to_string());
        request.resolved_at = Some(Utc::now());
        info!(id = %request.id, path = %proposal.path, actor, "moniker request approved");
        Ok(request.clone())
    }

    /// Approve lane: rejects a pending request with a reason.
    pub fn reject_request(
        &self,
        token: Option<&str>,
        request_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<MonikerRequest> {
        self.auth.require(token, Role::Approver)?;

        let mut requests = self.requests.lock();
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or_else(|| GovernanceError::UnknownRequest(request_id.to_string()))?;
        if !request.is_pending() {
            return Err(GovernanceError::Conflict(format!(
                "request {request_id} was already resolved"
            )));
        }
        request.status = RequestStatus::Rejected;
        request.resolved_by = Some(actor.to_string());
        request.resolved_at = Some(Utc::now());
        request.resolution_reason = Some(reason.to_string());
        info!(id = %request.id, actor, reason, "moniker request rejected");
        Ok(request.clone())
    }

    /// Approve lane: drives the node status state machine.
    ///
    /// Deprecation metadata (message, successor, sunset deadline,
    /// migration guide) is applied when the target status is
    /// `DEPRECATED`.
    pub fn update_node_status(
        &self,
        token: Option<&str>,
        path: &str,
        new_status: NodeStatus,
        actor: &str,
        metadata: StatusMetadata,
    ) -> Result<CatalogNode> {
        self.auth.require(token, Role::Approver)?;
        let node = self
            .registry
            .update_status(path, new_status, actor, metadata)
            .map_err(|err| match err {
                moniker_catalog::CatalogError::IllegalTransition { path, from, to } => {
                    GovernanceError::Conflict(format!(
                        "illegal status transition for {path}: {from} -> {to}"
                    ))
                }
                other => GovernanceError::Catalog(other),
            })?;
        Ok(node)
    }

    /// Replaces the catalog from a parsed definition.
    ///
    /// With deprecation handling enabled this is a validated replace:
    /// diff, per-change audit, optional breaking-change gate, then
    /// successor validation whose findings are reported as warnings.
    /// With it disabled the definition is swapped in directly.
    pub fn reload_catalog(
        &self,
        definition: CatalogDefinition,
        block_breaking: bool,
        actor: &str,
    ) -> Result<ReloadReport> {
        let nodes = definition.into_nodes()?;

        if !self.deprecation_enabled {
            self.registry.atomic_replace(nodes)?;
            return Ok(ReloadReport {
                applied: true,
                ..Default::default()
            });
        }

        let (diff, applied) = self
            .registry
            .validated_replace(nodes, block_breaking, actor)?;

        let successor_errors = if applied {
            let errors = self.registry.validate_successors();
            for error in &errors {
                warn!(%error, "successor validation after reload");
            }
            errors
        } else {
            Vec::new()
        };

        Ok(ReloadReport {
            applied,
            added_count: diff.added_paths.len(),
            removed_count: diff.removed_paths.len(),
            binding_changed_count: diff.binding_changed_paths.len(),
            status_changed_count: diff.status_changed_paths.len(),
            has_breaking_changes: diff.has_breaking_changes(),
            successor_errors,
            diff: Some(diff),
        })
    }
}

impl std::fmt::Debug for GovernanceController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GovernanceController")
            .field("pending_requests", &self.requests.lock().len())
            .field("deprecation_enabled", &self.deprecation_enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moniker_catalog::{SnowflakeConfig, SourceBinding, SourceConfig};

    const SUBMIT: Option<&str> = Some("submit-token");
    const APPROVE: Option<&str> = Some("approve-token");

    fn controller() -> GovernanceController {
        let registry = Arc::new(
            CatalogRegistry::from_nodes(vec![CatalogNode::new("prices.equity")]).unwrap(),
        );
        GovernanceController::new(
            registry,
            AuthGate::new("submit-token", "approve-token"),
            true,
        )
    }

    fn proposal(path: &str) -> MonikerProposal {
        MonikerProposal::new(path).with_binding(SourceBinding::new(SourceConfig::Snowflake(
            SnowflakeConfig {
                query: Some("SELECT 1".into()),
                ..Default::default()
            },
        )))
    }

    #[test]
    fn submit_requires_submit_token() {
        let ctl = controller();
        assert!(matches!(
            ctl.submit_request(None, proposal("foo.bar/baz"), "alice"),
            Err(GovernanceError::Forbidden { .. })
        ));
        assert!(ctl.submit_request(SUBMIT, proposal("foo.bar/baz"), "alice").is_ok());
    }

    #[test]
    fn approve_with_submit_token_is_forbidden() {
        let ctl = controller();
        let request = ctl
            .submit_request(SUBMIT, proposal("foo.bar/baz"), "alice")
            .unwrap();
        assert!(matches!(
            ctl.approve_request(SUBMIT, &request.id, "bob"),
            Err(GovernanceError::Forbidden { .. })
        ));
    }

    #[test]
    fn approval_materializes_an_active_node() {
        let ctl = controller();
        let request = ctl
            .submit_request(SUBMIT, proposal("foo.bar/baz"), "alice")
            .unwrap();
        let approved = ctl.approve_request(APPROVE, &request.id, "bob").unwrap();
        assert_eq!(approved.status, RequestStatus::Approved);

        let node = ctl.registry.get("foo.bar/baz").unwrap();
        assert_eq!(node.status, NodeStatus::Active);
        assert!(node.source_binding.is_some());
    }

    #[test]
    fn double_approval_conflicts() {
        let ctl = controller();
        let request = ctl
            .submit_request(SUBMIT, proposal("foo.bar/baz"), "alice")
            .unwrap();
        ctl.approve_request(APPROVE, &request.id, "bob").unwrap();
        assert!(matches!(
            ctl.approve_request(APPROVE, &request.id, "bob"),
            Err(GovernanceError::Conflict(_))
        ));
    }

    #[test]
    fn rejection_records_reason() {
        let ctl = controller();
        let request = ctl
            .submit_request(SUBMIT, proposal("foo.bar/baz"), "alice")
            .unwrap();
        let rejected = ctl
            .reject_request(APPROVE, &request.id, "bob", "no owner")
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.resolution_reason.as_deref(), Some("no owner"));
        assert!(ctl.registry.get("foo.bar/baz").is_none());
    }

    #[test]
    fn existing_path_cannot_be_proposed() {
        let ctl = controller();
        assert!(matches!(
            ctl.submit_request(SUBMIT, proposal("prices.equity"), "alice"),
            Err(GovernanceError::Conflict(_))
        ));
    }

    #[test]
    fn list_filters_by_status() {
        let ctl = controller();
        let a = ctl
            .submit_request(SUBMIT, proposal("foo.bar/a"), "alice")
            .unwrap();
        ctl.submit_request(SUBMIT, proposal("foo.bar/b"), "alice")
            .unwrap();
        ctl.approve_request(APPROVE, &a.id, "bob").unwrap();

        let pending = ctl
            .list_requests(SUBMIT, Some(RequestStatus::Pending))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].proposal.path, "foo.bar/b");
        assert_eq!(ctl.list_requests(SUBMIT, None).unwrap().len(), 2);
    }

    #[test]
    fn status_update_requires_approver() {
        let ctl = controller();
        assert!(matches!(
            ctl.update_node_status(
                SUBMIT,
                "prices.equity",
                NodeStatus::Deprecated,
                "bob",
                StatusMetadata::default(),
            ),
            Err(GovernanceError::Forbidden { .. })
        ));
        let node = ctl
            .update_node_status(
                APPROVE,
                "prices.equity",
                NodeStatus::Deprecated,
                "bob",
                StatusMetadata {
                    successor: Some("prices.equity_v2".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(node.status, NodeStatus::Deprecated);
    }

    #[test]
    fn illegal_transition_maps_to_conflict() {
        let ctl = controller();
        let err = ctl
            .update_node_status(
                APPROVE,
                "prices.equity",
                NodeStatus::Draft,
                "bob",
                StatusMetadata::default(),
            )
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Conflict(_)));
    }

    #[test]
    fn blocked_reload_reports_without_applying() {
        let ctl = controller();
        // Empty replacement removes the only node: breaking.
        let report = ctl
            .reload_catalog(CatalogDefinition::default(), true, "ops")
            .unwrap();
        assert!(!report.applied);
        assert!(report.has_breaking_changes);
        assert_eq!(report.removed_count, 1);
        assert!(ctl.registry.get("prices.equity").is_some());
    }

    #[test]
    fn applied_reload_reports_successor_warnings() {
        let ctl = controller();
        let definition = CatalogDefinition::from_yaml_str(
            "rates.libor:\n  status: DEPRECATED\n  successor: rates.gone\n",
        )
        .unwrap();
        let report = ctl.reload_catalog(definition, false, "ops").unwrap();
        assert!(report.applied);
        assert_eq!(report.successor_errors.len(), 1);
        assert!(report.successor_errors[0].contains("does not exist"));
    }

    #[test]
    fn disabled_deprecation_skips_diffing() {
        let registry = Arc::new(
            CatalogRegistry::from_nodes(vec![CatalogNode::new("prices.equity")]).unwrap(),
        );
        let ctl = GovernanceController::new(
            registry,
            AuthGate::new("submit-token", "approve-token"),
            false,
        );
        let report = ctl
            .reload_catalog(CatalogDefinition::default(), true, "ops")
            .unwrap();
        // Applied unconditionally, no diff computed.
        assert!(report.applied);
        assert!(report.diff.is_none());
        assert!(ctl.registry.get("prices.equity").is_none());
    }
}
