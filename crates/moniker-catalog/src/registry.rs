//! # Catalog Registry
//!
//! The authoritative, in-process mapping from catalog path to node.
//!
//! ## Snapshot model
//!
//! The registry never mutates a published node set. Every write builds a
//! fresh immutable [`CatalogSnapshot`] and swaps a single `Arc` under a
//! write lock; readers clone the `Arc` once at request entry and work
//! against a consistent view for the rest of the request. Consequences:
//!
//! - a reload is observed atomically: all old nodes or all new, never a mix
//! - snapshots are monotonic: once a reader has seen version `V` it can
//!   never be handed an earlier one
//! - inherited ownership is computed on demand against the snapshot, so a
//!   swap never has to invalidate denormalized copies
//!
//! ## Audit
//!
//! Every mutating operation appends to the [`AuditLog`]; appends are
//! infallible so audit can never fail a mutation.
//!
//! ## Example
//!
//! ```rust
//! use moniker_catalog::{CatalogNode, CatalogRegistry};
//!
//! let registry = CatalogRegistry::from_nodes(vec![
//!     CatalogNode::new("prices"),
//!     CatalogNode::new("prices.equity"),
//! ]).unwrap();
//!
//! assert!(registry.get("prices.equity").is_some());
//! assert_eq!(registry.list_children("prices"), vec!["prices.equity".to_string()]);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use moniker_path::parent_of;

use crate::audit::{AuditEntry, AuditKind, AuditLog};
use crate::diff::{diff_nodes, CatalogDiff};
use crate::models::{CatalogError, CatalogNode, NodeStatus, Ownership, Result, SourceBinding};

/// Maximum successor chain length tolerated by validation and traversal.
pub const MAX_SUCCESSOR_HOPS: usize = 5;

/// Deprecation metadata accepted alongside a status update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset_deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// An immutable, internally consistent view of the whole catalog.
#[derive(Debug)]
pub struct CatalogSnapshot {
    nodes: BTreeMap<String, CatalogNode>,
    children: BTreeMap<String, BTreeSet<String>>,
    version: u64,
}

impl CatalogSnapshot {
    /// Builds a snapshot from a node list, deriving the child adjacency.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicatePath`] when two nodes share a path.
    pub fn build(nodes: Vec<CatalogNode>, version: u64) -> Result<Self> {
        let mut keyed = BTreeMap::new();
        for node in nodes {
            let path = node.path.clone();
            if keyed.insert(path.clone(), node).is_some() {
                return Err(CatalogError::DuplicatePath(path));
            }
        }
        let mut children: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for path in keyed.keys() {
            if let Some(parent) = parent_of(path) {
                children.entry(parent).or_default().insert(path.clone());
            }
        }
        Ok(Self {
            nodes: keyed,
            children,
            version,
        })
    }

    /// The snapshot's monotonically increasing version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Looks up a node by exact path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&CatalogNode> {
        self.nodes.get(path)
    }

    /// Number of nodes in this snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterates all nodes in path order.
    pub fn iter(&self) -> impl Iterator<Item = &CatalogNode> {
        self.nodes.values()
    }

    /// Immediate children of `path`, as full paths in order.
    #[must_use]
    pub fn children_of(&self, path: &str) -> Vec<String> {
        self.children
            .get(path)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The deepest existing node at `key` or on its ancestor chain.
    ///
    /// This is the node a moniker resolves against when the full key has
    /// no entry of its own (e.g. `prices.equity/AAPL` resolving against
    /// the `prices.equity` node).
    #[must_use]
    pub fn resolving_node_of(&self, key: &str) -> Option<&CatalogNode> {
        let mut current = key.to_string();
        loop {
            if let Some(node) = self.nodes.get(&current) {
                return Some(node);
            }
            current = parent_of(&current)?;
        }
    }

    /// The nearest self-or-ancestor node carrying a binding.
    #[must_use]
    pub fn binding_node_of(&self, path: &str) -> Option<(&CatalogNode, &SourceBinding)> {
        let mut current = path.to_string();
        loop {
            if let Some(node) = self.nodes.get(&current) {
                if let Some(binding) = &node.source_binding {
                    return Some((node, binding));
                }
            }
            current = parent_of(&current)?;
        }
    }

    /// Effective ownership at `path` after the inheritance walk.
    ///
    /// Each field takes the value of the nearest self-or-ancestor node
    /// that sets it; fields no ancestor sets stay unset. The walk runs
    /// even when `path` itself has no node, so leaf monikers resolve
    /// ownership through their branch.
    #[must_use]
    pub fn ownership_of(&self, path: &str) -> Ownership {
        let mut effective = Ownership::default();
        let mut current = Some(path.to_string());
        while let Some(p) = current {
            if let Some(node) = self.nodes.get(&p) {
                effective.inherit_from(&node.ownership);
                if effective.is_complete() {
                    break;
                }
            }
            current = parent_of(&p);
        }
        effective
    }

    /// Validates every successor pointer in the snapshot.
    ///
    /// Flags successors that do not exist, point back at their own node,
    /// or sit on a chain longer than [`MAX_SUCCESSOR_HOPS`].
    #[must_use]
    pub fn validate_successors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for node in self.nodes.values() {
            let Some(successor) = &node.successor else {
                continue;
            };
            if successor == &node.path {
                errors.push(format!("{}: successor points at itself", node.path));
                continue;
            }
            if !self.nodes.contains_key(successor) {
                errors.push(format!(
                    "{}: successor {successor} does not exist",
                    node.path
                ));
                continue;
            }
            // Walk the chain with a visited set as the cycle guard.
            let mut visited = HashSet::new();
            visited.insert(node.path.as_str());
            let mut current = successor.as_str();
            let mut hops = 1;
            loop {
                if !visited.insert(current) {
                    errors.push(format!("{}: successor chain forms a cycle", node.path));
                    break;
                }
                if hops > MAX_SUCCESSOR_HOPS {
                    errors.push(format!(
                        "{}: successor chain exceeds {MAX_SUCCESSOR_HOPS} hops",
                        node.path
                    ));
                    break;
                }
                match self.nodes.get(current).and_then(|n| n.successor.as_deref()) {
                    Some(next) => {
                        current = next;
                        hops += 1;
                    }
                    None => break,
                }
            }
        }
        errors
    }
}

/// The live registry: one current snapshot plus the audit trail.
///
/// Reads are lock-free after the initial `Arc` clone; writes serialize on
/// the snapshot lock and publish a complete replacement.
#[derive(Debug)]
pub struct CatalogRegistry {
    snapshot: RwLock<Arc<CatalogSnapshot>>,
    /// Serializes compound write operations (diff-then-swap and friends);
    /// readers never touch it.
    writer: Mutex<()>,
    audit: AuditLog,
    next_version: AtomicU64,
}

impl CatalogRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let snapshot = CatalogSnapshot {
            nodes: BTreeMap::new(),
            children: BTreeMap::new(),
            version: 0,
        };
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            audit: AuditLog::default(),
            next_version: AtomicU64::new(1),
        }
    }

    /// Creates a registry pre-populated with `nodes`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicatePath`] on conflicting paths.
    pub fn from_nodes(nodes: Vec<CatalogNode>) -> Result<Self> {
        let registry = Self::new();
        registry.atomic_replace(nodes)?;
        Ok(registry)
    }

    /// The current snapshot; cheap to clone, stable for the caller's
    /// lifetime.
    #[must_use]
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&self.snapshot.read())
    }

    /// Looks up a node by exact path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<CatalogNode> {
        self.snapshot().get(path).cloned()
    }

    /// Immediate children of `path`.
    #[must_use]
    pub fn list_children(&self, path: &str) -> Vec<String> {
        self.snapshot().children_of(path)
    }

    /// Effective ownership at `path`.
    #[must_use]
    pub fn ownership_of(&self, path: &str) -> Ownership {
        self.snapshot().ownership_of(path)
    }

    /// Nearest self-or-ancestor binding at `path`.
    #[must_use]
    pub fn source_binding_of(&self, path: &str) -> Option<SourceBinding> {
        self.snapshot()
            .binding_node_of(path)
            .map(|(_, binding)| binding.clone())
    }

    /// Number of nodes in the current snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// True when the current snapshot has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    /// The current snapshot version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.snapshot().version()
    }

    /// Publishes a complete replacement node set in one step.
    ///
    /// All-or-nothing: the new snapshot is fully built and validated
    /// before the swap, so concurrent readers see either every old node
    /// or every new one.
    pub fn atomic_replace(&self, nodes: Vec<CatalogNode>) -> Result<()> {
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        let next = Arc::new(CatalogSnapshot::build(nodes, version)?);
        let node_count = next.len();
        {
            let mut guard = self.snapshot.write();
            *guard = next;
        }
        debug!(version, nodes = node_count, "published catalog snapshot");
        self.audit.append(
            AuditEntry::new("system", "*", AuditKind::CatalogReloaded)
                .with_reason(format!("snapshot v{version}, {node_count} nodes")),
        );
        Ok(())
    }

    /// Diffs the live catalog against an offered replacement.
    #[must_use]
    pub fn diff(&self, new_nodes: &[CatalogNode]) -> CatalogDiff {
        let current = self.snapshot();
        let next: BTreeMap<String, CatalogNode> = new_nodes
            .iter()
            .map(|n| (n.path.clone(), n.clone()))
            .collect();
        diff_nodes(&current.nodes, &next)
    }

    /// Diffs, audits, and conditionally applies a replacement node set.
    ///
    /// One audit entry is appended per categorized change. When
    /// `block_breaking` is set and the diff removes paths or changes
    /// binding contracts, the replacement is refused and the live
    /// snapshot is left untouched.
    ///
    /// Returns the diff and whether the replacement was applied.
    pub fn validated_replace(
        &self,
        new_nodes: Vec<CatalogNode>,
        block_breaking: bool,
        actor: &str,
    ) -> Result<(CatalogDiff, bool)> {
        let _writer = self.writer.lock();
        let diff = self.diff(&new_nodes);

        for path in &diff.added_paths {
            self.audit
                .append(AuditEntry::new(actor, path, AuditKind::NodeAdded));
        }
        for path in &diff.removed_paths {
            self.audit
                .append(AuditEntry::new(actor, path, AuditKind::NodeRemoved));
        }
        for path in &diff.binding_changed_paths {
            let before = self.get(path).and_then(|n| n.binding_fingerprint());
            let after = new_nodes
                .iter()
                .find(|n| &n.path == path)
                .and_then(CatalogNode::binding_fingerprint);
            self.audit.append(
                AuditEntry::new(actor, path, AuditKind::BindingChanged).with_change(before, after),
            );
        }
        for path in &diff.status_changed_paths {
            let before = self.get(path).map(|n| n.status.to_string());
            let after = new_nodes
                .iter()
                .find(|n| &n.path == path)
                .map(|n| n.status.to_string());
            self.audit.append(
                AuditEntry::new(actor, path, AuditKind::StatusChanged).with_change(before, after),
            );
        }

        if block_breaking && diff.has_breaking_changes() {
            warn!(
                removed = diff.removed_paths.len(),
                binding_changed = diff.binding_changed_paths.len(),
                "refusing catalog replacement with breaking changes"
            );
            self.audit.append(
                AuditEntry::new(actor, "*", AuditKind::ReloadRejected)
                    .with_reason("breaking changes present"),
            );
            return Ok((diff, false));
        }

        self.atomic_replace(new_nodes)?;
        info!(actor, changes = diff.change_count(), "catalog replaced");
        Ok((diff, true))
    }

    /// Validates every successor pointer in the live snapshot.
    #[must_use]
    pub fn validate_successors(&self) -> Vec<String> {
        self.snapshot().validate_successors()
    }

    /// Drives the node lifecycle state machine.
    ///
    /// Deprecation metadata is applied when transitioning to
    /// `DEPRECATED`; the transition itself must be one the state machine
    /// allows.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownPath`] when the node does not exist,
    /// [`CatalogError::IllegalTransition`] when the state machine forbids
    /// the move.
    pub fn update_status(
        &self,
        path: &str,
        new_status: NodeStatus,
        actor: &str,
        metadata: StatusMetadata,
    ) -> Result<CatalogNode> {
        let mut guard = self.snapshot.write();
        let current = guard
            .get(path)
            .cloned()
            .ok_or_else(|| CatalogError::UnknownPath(path.to_string()))?;

        if !current.status.can_transition_to(new_status) {
            return Err(CatalogError::IllegalTransition {
                path: path.to_string(),
                from: current.status,
                to: new_status,
            });
        }

        let mut updated = current.clone();
        updated.status = new_status;
        if new_status == NodeStatus::Deprecated {
            if metadata.deprecation_message.is_some() {
                updated.deprecation_message = metadata.deprecation_message.clone();
            }
            if metadata.successor.is_some() {
                updated.successor = metadata.successor.clone();
            }
            if metadata.sunset_deadline.is_some() {
                updated.sunset_deadline = metadata.sunset_deadline;
            }
            if metadata.migration_guide_url.is_some() {
                updated.migration_guide_url = metadata.migration_guide_url.clone();
            }
        }

        let mut nodes: Vec<CatalogNode> = guard.nodes.values().cloned().collect();
        for node in &mut nodes {
            if node.path == path {
                *node = updated.clone();
            }
        }
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        *guard = Arc::new(CatalogSnapshot::build(nodes, version)?);
        drop(guard);

        let mut entry = AuditEntry::new(actor, path, AuditKind::StatusChanged).with_change(
            Some(current.status.to_string()),
            Some(new_status.to_string()),
        );
        if let Some(reason) = metadata.reason {
            entry = entry.with_reason(reason);
        }
        self.audit.append(entry);
        info!(path, from = %current.status, to = %new_status, "node status updated");
        Ok(updated)
    }

    /// Inserts or replaces a single node.
    pub fn upsert_node(&self, node: CatalogNode, actor: &str) -> Result<()> {
        let path = node.path.clone();
        let mut guard = self.snapshot.write();
        let existed = guard.get(&path).is_some();
        let mut nodes: Vec<CatalogNode> = guard
            .nodes
            .values()
            .filter(|n| n.path != path)
            .cloned()
            .collect();
        nodes.push(node);
        let version = self.next_version.fetch_add(1, Ordering::Relaxed);
        *guard = Arc::new(CatalogSnapshot::build(nodes, version)?);
        drop(guard);

        let kind = if existed {
            AuditKind::BindingChanged
        } else {
            AuditKind::NodeAdded
        };
        self.audit.append(AuditEntry::new(actor, path, kind));
        Ok(())
    }

    /// Returns audit entries, optionally filtered by path and capped.
    #[must_use]
    pub fn audit_log(&self, path: Option<&str>, limit: Option<usize>) -> Vec<AuditEntry> {
        self.audit.entries(path, limit)
    }

    /// Number of audit entries lost to the capacity bound.
    #[must_use]
    pub fn audit_dropped(&self) -> u64 {
        self.audit.dropped()
    }
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::new()
    }
}
