//! Response shapes for the service surface.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use moniker_catalog::{CatalogNode, NodeStatus, Ownership, SourceType};
use moniker_telemetry::StatsSnapshot;

use crate::cache::CacheStats;

/// Everything a client needs to fetch the data behind a moniker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveResult {
    /// Path of the node that resolved the moniker.
    pub path: String,
    pub source_type: SourceType,
    /// Connection attributes, without the query template.
    pub connection: BTreeMap<String, serde_json::Value>,
    /// Expanded query, when the binding carries a template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Effective ownership after inheritance rollup.
    pub ownership: Ownership,
    /// Advisory flag from the binding; not enforced here.
    pub read_only: bool,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    /// Final destination of the successor chain, when one was followed;
    /// otherwise the node's own successor pointer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset_deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide_url: Option<String>,
    /// The requested path, set when deprecation redirected the binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirected_from: Option<String>,
}

/// One entry of a batch resolve response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResolveItem {
    pub moniker: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResolveResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
}

/// Full node metadata plus derived context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescribeResult {
    pub node: CatalogNode,
    /// Ownership after the inheritance walk.
    pub effective_ownership: Ownership,
    /// Fingerprint of the nearest reachable binding, when any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding_fingerprint: Option<String>,
    pub children: Vec<String>,
}

/// Ancestry and succession context for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageResult {
    pub path: String,
    /// Existing ancestor nodes, nearest first.
    pub ancestors: Vec<String>,
    /// Successor chain from this node, in hop order.
    pub successors: Vec<String>,
}

/// A single node in the tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub has_binding: bool,
}

/// A search hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Aggregate catalog counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_nodes: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_source_type: BTreeMap<String, usize>,
}

/// Operational health summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub catalog_nodes: usize,
    pub catalog_version: u64,
    pub cache_entries: usize,
    pub cache: CacheStats,
    pub telemetry: StatsSnapshot,
    pub audit_dropped: u64,
}
