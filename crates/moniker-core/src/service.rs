//! The unified moniker service facade.
//!
//! [`MonikerService`] wires the parser, catalog registry, template
//! expander, governance controller, result cache, and telemetry emitter
//! into the resolution pipeline:
//!
//! 1. parse the moniker
//! 2. walk the registry to the resolving node and the nearest binding
//! 3. follow successor redirects away from deprecated nodes (bounded)
//! 4. expand the binding's query template
//! 5. roll up ownership, assemble the result
//! 6. emit a usage event, cache by canonical moniker
//!
//! Reads are lock-free against a pinned snapshot; governance operations
//! go through the controller and invalidate the cache as needed.
//! Telemetry never blocks or fails a request.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info};

use moniker_catalog::{
    CatalogDefinition, CatalogNode, CatalogRegistry, CatalogSnapshot, NodeStatus, StatusMetadata,
};
use moniker_governance::{
    AuthGate, GovernanceController, MonikerProposal, MonikerRequest, ReloadReport, RequestStatus,
};
use moniker_path::{parent_of, MonikerPath};
use moniker_telemetry::{Caller, Emitter, Operation, Outcome, Sink, UsageEvent};

use crate::cache::TtlCache;
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::result::{
    BatchResolveItem, CatalogStats, DescribeResult, HealthReport, LineageResult, ResolveResult,
    SearchHit, TreeEntry,
};
use crate::template::TemplateExpander;

/// The moniker resolution service.
///
/// One instance owns the registry, governance lanes, cache, and
/// telemetry worker. Construction needs a tokio runtime for the
/// telemetry worker task.
pub struct MonikerService {
    config: ServiceConfig,
    registry: Arc<CatalogRegistry>,
    governance: GovernanceController,
    cache: TtlCache<ResolveResult>,
    emitter: Emitter,
    expander: TemplateExpander,
}

impl MonikerService {
    /// Creates a service over an explicit node set.
    ///
    /// # Errors
    ///
    /// Fails when the node set has duplicate paths.
    pub fn new(
        config: ServiceConfig,
        nodes: Vec<CatalogNode>,
        sink: Arc<dyn Sink>,
    ) -> Result<Self> {
        let registry = Arc::new(CatalogRegistry::from_nodes(nodes)?);
        let auth = AuthGate::from_config(
            config.auth.submit_token.clone(),
            config.auth.approve_token.clone(),
            config.auth.legacy_write_token.clone(),
        );
        let governance = GovernanceController::new(
            Arc::clone(&registry),
            auth,
            config.resolver.deprecation_redirects,
        );
        let cache = TtlCache::new(config.cache.max_size, config.cache.ttl());
        let emitter = Emitter::spawn(config.telemetry.emitter_config(), sink);
        info!(nodes = registry.len(), "moniker service started");
        Ok(Self {
            config,
            registry,
            governance,
            cache,
            emitter,
            expander: TemplateExpander::new(),
        })
    }

    /// Creates a service from a parsed catalog definition.
    pub fn from_definition(
        config: ServiceConfig,
        definition: CatalogDefinition,
        sink: Arc<dyn Sink>,
    ) -> Result<Self> {
        let nodes = definition.into_nodes().map_err(ServiceError::from)?;
        Self::new(config, nodes, sink)
    }

    /// Creates a service by loading the definition files named in the
    /// configuration. Missing configuration means an empty catalog.
    pub fn load(config: ServiceConfig, sink: Arc<dyn Sink>) -> Result<Self> {
        let mut definition = CatalogDefinition::default();
        if let Some(path) = &config.catalog.path {
            definition = CatalogDefinition::load(path).map_err(ServiceError::from)?;
        }
        for path in &config.catalog.supplemental_paths {
            let extra = CatalogDefinition::load(path).map_err(ServiceError::from)?;
            definition.merge(extra);
        }
        Self::from_definition(config, definition, sink)
    }

    /// The underlying registry, for operational tooling.
    #[must_use]
    pub fn registry(&self) -> &CatalogRegistry {
        &self.registry
    }

    // ------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------

    /// Resolves a moniker to connection instructions.
    pub fn resolve(&self, raw: &str, caller: &Caller) -> Result<ResolveResult> {
        self.resolve_with_deadline(raw, caller, None)
    }

    /// Resolves with a request deadline.
    ///
    /// The deadline is checked at the natural pipeline boundaries; an
    /// exceeded deadline aborts with an internal error carrying a
    /// cancellation reason, reported as `outcome=error`.
    pub fn resolve_with_deadline(
        &self,
        raw: &str,
        caller: &Caller,
        deadline: Option<Instant>,
    ) -> Result<ResolveResult> {
        let started = Instant::now();
        let parsed = match MonikerPath::parse(raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                let service_err = ServiceError::from(err);
                self.emit_resolve_failure(raw, caller, started, &service_err);
                return Err(service_err);
            }
        };
        let canonical = parsed.render();

        if let Some(hit) = self.cache.get(&canonical) {
            debug!(moniker = %canonical, "resolve served from cache");
            self.emit_resolve_success(&canonical, caller, started, &hit);
            return Ok(hit);
        }

        match self.resolve_uncached(&parsed, deadline) {
            Ok(result) => {
                self.cache.insert(canonical.clone(), result.clone());
                self.emit_resolve_success(&canonical, caller, started, &result);
                Ok(result)
            }
            Err(err) => {
                self.emit_resolve_failure(&canonical, caller, started, &err);
                Err(err)
            }
        }
    }

    /// Resolves a batch of monikers, one entry per input.
    pub fn resolve_batch(&self, monikers: &[String], caller: &Caller) -> Vec<BatchResolveItem> {
        monikers
            .iter()
            .map(|moniker| match self.resolve(moniker, caller) {
                Ok(result) => BatchResolveItem {
                    moniker: moniker.clone(),
                    result: Some(result),
                    error: None,
                    error_kind: None,
                },
                Err(err) => BatchResolveItem {
                    moniker: moniker.clone(),
                    result: None,
                    error: Some(err.to_string()),
                    error_kind: Some(err.kind().to_string()),
                },
            })
            .collect()
    }

    fn resolve_uncached(
        &self,
        parsed: &MonikerPath,
        deadline: Option<Instant>,
    ) -> Result<ResolveResult> {
        check_deadline(deadline)?;
        let key = parsed.lookup_key();
        let snapshot = self.registry.snapshot();

        let node = snapshot
            .resolving_node_of(&key)
            .ok_or_else(|| ServiceError::NotFound(key.clone()))?;

        let (effective, redirected) = self.follow_successors(&snapshot, node);

        let (_, binding) = snapshot
            .binding_node_of(&effective.path)
            .ok_or_else(|| ServiceError::NoBinding(node.path.clone()))?;

        check_deadline(deadline)?;
        let query = binding
            .config
            .query()
            .map(|template| self.expander.expand(template, parsed))
            .transpose()?;

        let ownership = snapshot.ownership_of(&key);
        let successor = if redirected {
            Some(effective.path.clone())
        } else {
            node.successor.clone()
        };

        Ok(ResolveResult {
            path: node.path.clone(),
            source_type: binding.config.source_type(),
            connection: binding.config.connection_map(),
            query,
            ownership,
            read_only: binding.read_only,
            status: node.status,
            deprecation_message: node.deprecation_message.clone(),
            successor,
            sunset_deadline: node.sunset_deadline,
            migration_guide_url: node.migration_guide_url.clone(),
            redirected_from: redirected.then(|| key.clone()),
        })
    }

    /// Follows successor pointers away from a deprecated node.
    ///
    /// Stops at the first non-deprecated hop, at the hop bound, at a
    /// missing successor, or on a cycle; chain violations degrade to the
    /// last reached node and are logged, never failed.
    fn follow_successors<'s>(
        &self,
        snapshot: &'s CatalogSnapshot,
        node: &'s CatalogNode,
    ) -> (&'s CatalogNode, bool) {
        if !self.config.resolver.deprecation_redirects {
            return (node, false);
        }
        let max_hops = self.config.resolver.max_successor_hops;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(&node.path);
        let mut current = node;
        let mut hops = 0;

        while current.status == NodeStatus::Deprecated {
            let Some(successor) = current.successor.as_deref() else {
                break;
            };
            if hops >= max_hops {
                error!(
                    path = %node.path,
                    "successor chain exceeds {max_hops} hops, using last reached node"
                );
                break;
            }
            let Some(next) = snapshot.get(successor) else {
                error!(
                    path = %current.path,
                    successor,
                    "successor missing, using last reached node"
                );
                break;
            };
            if !visited.insert(&next.path) {
                error!(path = %node.path, "successor chain forms a cycle, using last reached node");
                break;
            }
            current = next;
            hops += 1;
        }
        (current, !std::ptr::eq(current, node))
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// Full metadata for a node, with inherited context.
    pub fn describe(&self, path: &str, caller: &Caller) -> Result<DescribeResult> {
        let started = Instant::now();
        let result = self.describe_inner(path);
        self.emit_read(Operation::Describe, path, caller, started, &result);
        result
    }

    fn describe_inner(&self, path: &str) -> Result<DescribeResult> {
        let key = MonikerPath::parse(path)?.lookup_key();
        let snapshot = self.registry.snapshot();
        let node = snapshot
            .get(&key)
            .ok_or_else(|| ServiceError::NotFound(key.clone()))?;
        Ok(DescribeResult {
            node: node.clone(),
            effective_ownership: snapshot.ownership_of(&key),
            binding_fingerprint: snapshot
                .binding_node_of(&key)
                .map(|(_, binding)| binding.fingerprint()),
            children: snapshot.children_of(&key),
        })
    }

    /// Immediate children of a node.
    pub fn list(&self, path: &str, caller: &Caller) -> Result<Vec<String>> {
        let started = Instant::now();
        let result = self.list_inner(path);
        self.emit_read(Operation::List, path, caller, started, &result);
        result
    }

    fn list_inner(&self, path: &str) -> Result<Vec<String>> {
        let key = MonikerPath::parse(path)?.lookup_key();
        let snapshot = self.registry.snapshot();
        if snapshot.get(&key).is_none() {
            return Err(ServiceError::NotFound(key));
        }
        Ok(snapshot.children_of(&key))
    }

    /// Ancestor chain and successor chain for a node.
    pub fn lineage(&self, path: &str, caller: &Caller) -> Result<LineageResult> {
        let started = Instant::now();
        let result = self.lineage_inner(path);
        self.emit_read(Operation::Lineage, path, caller, started, &result);
        result
    }

    fn lineage_inner(&self, path: &str) -> Result<LineageResult> {
        let key = MonikerPath::parse(path)?.lookup_key();
        let snapshot = self.registry.snapshot();
        if snapshot.get(&key).is_none() {
            return Err(ServiceError::NotFound(key));
        }

        let mut ancestors = Vec::new();
        let mut current = parent_of(&key);
        while let Some(ancestor) = current {
            if snapshot.get(&ancestor).is_some() {
                ancestors.push(ancestor.clone());
            }
            current = parent_of(&ancestor);
        }

        let mut successors = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        seen.insert(key.clone());
        let mut cursor = snapshot.get(&key).and_then(|n| n.successor.clone());
        while let Some(successor) = cursor {
            if !seen.insert(successor.clone()) || successors.len() >= self.config.resolver.max_successor_hops {
                break;
            }
            successors.push(successor.clone());
            cursor = snapshot.get(&successor).and_then(|n| n.successor.clone());
        }

        Ok(LineageResult {
            path: key,
            ancestors,
            successors,
        })
    }

    /// Every node in path order.
    #[must_use]
    pub fn tree(&self) -> Vec<TreeEntry> {
        self.registry
            .snapshot()
            .iter()
            .map(|node| TreeEntry {
                path: node.path.clone(),
                status: node.status,
                display_name: node.display_name.clone(),
                has_binding: node.source_binding.is_some(),
            })
            .collect()
    }

    /// Case-insensitive substring search over paths, names, and tags.
    #[must_use]
    pub fn search(&self, query: &str) -> Vec<SearchHit> {
        let needle = query.to_lowercase();
        self.registry
            .snapshot()
            .iter()
            .filter(|node| {
                node.path.to_lowercase().contains(&needle)
                    || node
                        .display_name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(&needle))
                    || node
                        .tags
                        .iter()
                        .chain(node.semantic_tags.iter())
                        .any(|tag| tag.to_lowercase().contains(&needle))
            })
            .map(|node| SearchHit {
                path: node.path.clone(),
                display_name: node.display_name.clone(),
                status: node.status,
                tags: node.tags.clone(),
            })
            .collect()
    }

    /// Aggregate catalog counts.
    #[must_use]
    pub fn stats(&self) -> CatalogStats {
        let snapshot = self.registry.snapshot();
        let mut stats = CatalogStats {
            total_nodes: snapshot.len(),
            ..Default::default()
        };
        for node in snapshot.iter() {
            *stats.by_status.entry(node.status.to_string()).or_default() += 1;
            if let Some(binding) = &node.source_binding {
                *stats
                    .by_source_type
                    .entry(binding.config.source_type().to_string())
                    .or_default() += 1;
            }
        }
        stats
    }

    /// Operational health: catalog, cache, and telemetry counters.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        HealthReport {
            catalog_nodes: self.registry.len(),
            catalog_version: self.registry.version(),
            cache_entries: self.cache.len(),
            cache: self.cache.stats(),
            telemetry: self.emitter.stats(),
            audit_dropped: self.registry.audit_dropped(),
        }
    }

    /// Records a client-reported access event.
    pub fn record_access(&self, event: UsageEvent) {
        self.emitter.emit(event);
    }

    // ------------------------------------------------------------------
    // Governance surface
    // ------------------------------------------------------------------

    /// Submit lane: proposes a new moniker.
    pub fn submit_request(
        &self,
        token: Option<&str>,
        proposal: MonikerProposal,
        requested_by: &str,
    ) -> Result<MonikerRequest> {
        Ok(self.governance.submit_request(token, proposal, requested_by)?)
    }

    /// Submit lane: lists requests.
    pub fn list_requests(
        &self,
        token: Option<&str>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<MonikerRequest>> {
        Ok(self.governance.list_requests(token, status)?)
    }

    /// Approve lane: materializes a pending request as an active node.
    pub fn approve_request(
        &self,
        token: Option<&str>,
        request_id: &str,
        actor: &str,
    ) -> Result<MonikerRequest> {
        let request = self.governance.approve_request(token, request_id, actor)?;
        // The new node may shadow resolutions served by an ancestor.
        self.cache.purge_all();
        Ok(request)
    }

    /// Approve lane: rejects a pending request.
    pub fn reject_request(
        &self,
        token: Option<&str>,
        request_id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<MonikerRequest> {
        Ok(self
            .governance
            .reject_request(token, request_id, actor, reason)?)
    }

    /// Approve lane: drives the node status state machine.
    pub fn update_node_status(
        &self,
        token: Option<&str>,
        path: &str,
        new_status: NodeStatus,
        actor: &str,
        metadata: StatusMetadata,
    ) -> Result<CatalogNode> {
        let node = self
            .governance
            .update_node_status(token, path, new_status, actor, metadata)?;
        self.cache.purge_if(|cached| {
            cached.path == path || cached.successor.as_deref() == Some(path)
        });
        Ok(node)
    }

    /// Replaces the catalog from a new definition.
    ///
    /// A successfully applied reload purges the whole result cache. The
    /// report is returned even when the reload was refused; see
    /// [`EnsureApplied`] for the error-shaped view.
    pub fn reload_catalog(
        &self,
        definition: CatalogDefinition,
        block_breaking: bool,
        actor: &str,
    ) -> Result<ReloadReport> {
        let report = self
            .governance
            .reload_catalog(definition, block_breaking, actor)?;
        if report.applied {
            self.cache.purge_all();
        }
        Ok(report)
    }

    /// Stops the telemetry worker, draining queued events.
    pub async fn stop(self) -> Result<()> {
        self.emitter
            .stop()
            .await
            .map_err(|err| ServiceError::Internal(err.to_string()))
    }

    // ------------------------------------------------------------------
    // Telemetry plumbing
    // ------------------------------------------------------------------

    fn emit_resolve_success(
        &self,
        moniker: &str,
        caller: &Caller,
        started: Instant,
        result: &ResolveResult,
    ) {
        let deprecated = result.status == NodeStatus::Deprecated;
        self.emitter.emit(
            UsageEvent::new(Operation::Resolve, moniker, caller.clone())
                .with_outcome(Outcome::Success)
                .with_source_type(result.source_type.to_string())
                .with_latency_ms(started.elapsed().as_millis() as u64)
                .with_owner(result.ownership.accountable_owner.as_deref())
                .with_deprecation(
                    deprecated,
                    result.successor.clone(),
                    result.redirected_from.clone(),
                ),
        );
    }

    fn emit_resolve_failure(
        &self,
        moniker: &str,
        caller: &Caller,
        started: Instant,
        err: &ServiceError,
    ) {
        self.emitter.emit(
            UsageEvent::new(Operation::Resolve, moniker, caller.clone())
                .with_outcome(err.outcome())
                .with_latency_ms(started.elapsed().as_millis() as u64)
                .with_error(format!("{}: {err}", err.kind())),
        );
    }

    fn emit_read<T>(
        &self,
        operation: Operation,
        moniker: &str,
        caller: &Caller,
        started: Instant,
        result: &Result<T>,
    ) {
        let event = UsageEvent::new(operation, moniker, caller.clone())
            .with_latency_ms(started.elapsed().as_millis() as u64);
        let event = match result {
            Ok(_) => event.with_outcome(Outcome::Success),
            Err(err) => event
                .with_outcome(err.outcome())
                .with_error(format!("{}: {err}", err.kind())),
        };
        self.emitter.emit(event);
    }
}

impl std::fmt::Debug for MonikerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MonikerService")
            .field("catalog_nodes", &self.registry.len())
            .field("cache_entries", &self.cache.len())
            .finish()
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => Err(ServiceError::Internal(
            "cancelled: request deadline exceeded".into(),
        )),
        _ => Ok(()),
    }
}

/// Error-shaped view of a reload report for transports that want one.
pub trait EnsureApplied {
    /// Converts a refused reload into [`ServiceError::BreakingReloadRejected`].
    fn ensure_applied(self) -> Result<ReloadReport>;
}

impl EnsureApplied for ReloadReport {
    fn ensure_applied(self) -> Result<ReloadReport> {
        if self.applied {
            Ok(self)
        } else {
            Err(ServiceError::BreakingReloadRejected)
        }
    }
}
