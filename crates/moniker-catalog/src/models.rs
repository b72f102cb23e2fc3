//! Core data shapes for the catalog.
//!
//! Everything a catalog node carries is defined here: the source binding
//! contract (where and how a client fetches the data), the ownership triple
//! inherited down the tree, and the lifecycle status machine.
//!
//! Bindings are content-addressed: [`SourceBinding::fingerprint`] hashes the
//! canonical JSON of the contract fields, so two bindings with equal
//! fingerprints are interchangeable from a client's point of view and any
//! contract change, however small, flips the fingerprint.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fingerprint::binding_fingerprint;

/// The kind of backing data source a binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Snowflake,
    Oracle,
    Rest,
    Static,
    Excel,
    Opensearch,
    Bloomberg,
    Refinitiv,
    File,
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceType::Snowflake => "snowflake",
            SourceType::Oracle => "oracle",
            SourceType::Rest => "rest",
            SourceType::Static => "static",
            SourceType::Excel => "excel",
            SourceType::Opensearch => "opensearch",
            SourceType::Bloomberg => "bloomberg",
            SourceType::Refinitiv => "refinitiv",
            SourceType::File => "file",
        };
        f.write_str(name)
    }
}

/// Connection attributes for a Snowflake warehouse.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnowflakeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warehouse: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Query template with `{...}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Unknown keys carried through for forward compatibility.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Connection attributes for an Oracle database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A REST endpoint template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Path or body template with `{...}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Inline static data, served as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A workbook on a shared drive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExcelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An OpenSearch index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpensearchConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A Bloomberg subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BloombergConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A Refinitiv feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RefinitivConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ric: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A file on disk or object storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Typed connection configuration, tagged by source type.
///
/// Serializes as `{ "type": "<source>", "config": { ... } }`, which is
/// exactly the shape the catalog definition file uses. Keys a variant does
/// not model land in its `extra` map rather than failing deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "lowercase")]
pub enum SourceConfig {
    Snowflake(SnowflakeConfig),
    Oracle(OracleConfig),
    Rest(RestConfig),
    Static(StaticConfig),
    Excel(ExcelConfig),
    Opensearch(OpensearchConfig),
    Bloomberg(BloombergConfig),
    Refinitiv(RefinitivConfig),
    File(FileConfig),
}

impl SourceConfig {
    /// The source type tag for this configuration.
    #[must_use]
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceConfig::Snowflake(_) => SourceType::Snowflake,
            SourceConfig::Oracle(_) => SourceType::Oracle,
            SourceConfig::Rest(_) => SourceType::Rest,
            SourceConfig::Static(_) => SourceType::Static,
            SourceConfig::Excel(_) => SourceType::Excel,
            SourceConfig::Opensearch(_) => SourceType::Opensearch,
            SourceConfig::Bloomberg(_) => SourceType::Bloomberg,
            SourceConfig::Refinitiv(_) => SourceType::Refinitiv,
            SourceConfig::File(_) => SourceType::File,
        }
    }

    /// The query template, when this source carries one.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        let query = match self {
            SourceConfig::Snowflake(c) => &c.query,
            SourceConfig::Oracle(c) => &c.query,
            SourceConfig::Rest(c) => &c.query,
            SourceConfig::Static(c) => &c.query,
            SourceConfig::Excel(c) => &c.query,
            SourceConfig::Opensearch(c) => &c.query,
            SourceConfig::Bloomberg(c) => &c.query,
            SourceConfig::Refinitiv(c) => &c.query,
            SourceConfig::File(c) => &c.query,
        };
        query.as_deref()
    }

    /// The raw connection attribute map, without the query template.
    ///
    /// This is what a resolve response hands to clients as connection
    /// instructions; the query is surfaced separately after expansion.
    #[must_use]
    pub fn connection_map(&self) -> BTreeMap<String, serde_json::Value> {
        let mut map = match self.config_value() {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        map.remove("query");
        map
    }

    /// The inner configuration serialized as a JSON object.
    #[must_use]
    pub fn config_value(&self) -> serde_json::Value {
        let value =
            serde_json::to_value(self).expect("source config serialization cannot fail");
        value.get("config").cloned().unwrap_or(serde_json::Value::Null)
    }
}

/// A column descriptor in a binding's declared schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The contract describing where and how to fetch a data asset.
///
/// # Example
///
/// ```rust
/// use moniker_catalog::{SnowflakeConfig, SourceBinding, SourceConfig};
///
/// let binding = SourceBinding::new(SourceConfig::Snowflake(SnowflakeConfig {
///     account: Some("acme".into()),
///     query: Some("SELECT * FROM t WHERE {filter[0]:symbol}".into()),
///     ..Default::default()
/// }));
///
/// // Stable across runs, sensitive to any contract change.
/// assert_eq!(binding.fingerprint().len(), 16);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceBinding {
    /// Connection configuration, tagged by source type.
    #[serde(flatten)]
    pub config: SourceConfig,

    /// Operation tags a client may perform (e.g. `READ`, `AGGREGATE`).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub allowed_operations: BTreeSet<String>,

    /// Optional column descriptors for the returned data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Vec<ColumnDescriptor>>,

    /// Advisory read-only flag; surfaced to clients, never enforced here.
    #[serde(default)]
    pub read_only: bool,
}

impl SourceBinding {
    /// Creates a binding with the given configuration and no extras.
    #[must_use]
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            allowed_operations: BTreeSet::new(),
            schema: None,
            read_only: false,
        }
    }

    /// Adds an allowed operation tag.
    #[must_use]
    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.allowed_operations.insert(op.into());
        self
    }

    /// The 16-hex-character contract fingerprint.
    ///
    /// Computed over the canonical JSON of source type, configuration,
    /// allowed operations, schema, and the read-only flag. Equal
    /// fingerprints mean contract-equivalent bindings.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        binding_fingerprint(self)
    }
}

/// The ownership triple plus additional governance roles.
///
/// Any unset field is inherited from the nearest ancestor that sets it,
/// field by field; see `CatalogSnapshot::ownership_of`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accountable_owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_specialist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub support_channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adop: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ads: Option<String>,
}

impl Ownership {
    /// Fills each unset field from `ancestor`, leaving set fields alone.
    pub fn inherit_from(&mut self, ancestor: &Ownership) {
        fn fill(slot: &mut Option<String>, value: &Option<String>) {
            if slot.is_none() {
                slot.clone_from(value);
            }
        }
        fill(&mut self.accountable_owner, &ancestor.accountable_owner);
        fill(&mut self.data_specialist, &ancestor.data_specialist);
        fill(&mut self.support_channel, &ancestor.support_channel);
        fill(&mut self.adop, &ancestor.adop);
        fill(&mut self.ads, &ancestor.ads);
    }

    /// True when every field is set and inheritance can stop early.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.accountable_owner.is_some()
            && self.data_specialist.is_some()
            && self.support_channel.is_some()
            && self.adop.is_some()
            && self.ads.is_some()
    }
}

/// Lifecycle state of a catalog node.
///
/// Allowed transitions: `DRAFT -> ACTIVE`, `ACTIVE -> DEPRECATED`,
/// `DEPRECATED -> ARCHIVED`, and `ACTIVE -> ARCHIVED` for emergency
/// retirement. Everything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Draft,
    Active,
    Deprecated,
    Archived,
}

impl NodeStatus {
    /// Whether the state machine permits moving to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (NodeStatus::Draft, NodeStatus::Active)
                | (NodeStatus::Active, NodeStatus::Deprecated)
                | (NodeStatus::Deprecated, NodeStatus::Archived)
                | (NodeStatus::Active, NodeStatus::Archived)
        )
    }
}

impl Default for NodeStatus {
    fn default() -> Self {
        NodeStatus::Active
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeStatus::Draft => "DRAFT",
            NodeStatus::Active => "ACTIVE",
            NodeStatus::Deprecated => "DEPRECATED",
            NodeStatus::Archived => "ARCHIVED",
        };
        f.write_str(name)
    }
}

/// Reference documentation links attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossary_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runbook_url: Option<String>,
}

/// One unit of the catalog tree.
///
/// The `path` is the unique registry key in dot-and-slash form
/// (`prices.equity/AAPL`). Child relationships are derived from paths when
/// a snapshot is built, not stored on the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogNode {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_tags: Vec<String>,
    #[serde(default)]
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    /// Replacement path, set when this node is deprecated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successor: Option<String>,
    /// Date after which a deprecated node is expected to be archived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset_deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide_url: Option<String>,
    #[serde(default)]
    pub ownership: Ownership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_binding: Option<SourceBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<Documentation>,
}

impl CatalogNode {
    /// Creates an active node with only its path set.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            display_name: None,
            description: None,
            tags: Vec::new(),
            semantic_tags: Vec::new(),
            status: NodeStatus::Active,
            deprecation_message: None,
            successor: None,
            sunset_deadline: None,
            migration_guide_url: None,
            ownership: Ownership::default(),
            source_binding: None,
            documentation: None,
        }
    }

    /// Sets the source binding.
    #[must_use]
    pub fn with_binding(mut self, binding: SourceBinding) -> Self {
        self.source_binding = Some(binding);
        self
    }

    /// Sets the lifecycle status.
    #[must_use]
    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the ownership record.
    #[must_use]
    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Sets the successor path.
    #[must_use]
    pub fn with_successor(mut self, successor: impl Into<String>) -> Self {
        self.successor = Some(successor.into());
        self
    }

    /// The binding fingerprint, when a binding is present.
    #[must_use]
    pub fn binding_fingerprint(&self) -> Option<String> {
        self.source_binding.as_ref().map(SourceBinding::fingerprint)
    }
}

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Two definitions share one path.
    #[error("duplicate catalog path: {0}")]
    DuplicatePath(String),

    /// The addressed node does not exist.
    #[error("unknown catalog path: {0}")]
    UnknownPath(String),

    /// A status change the state machine forbids.
    #[error("illegal status transition for {path}: {from} -> {to}")]
    IllegalTransition {
        path: String,
        from: NodeStatus,
        to: NodeStatus,
    },

    /// A definition key that is not a valid catalog path.
    #[error("invalid catalog path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The definition file could not be parsed.
    #[error("catalog definition error: {0}")]
    Definition(#[from] serde_yaml::Error),

    /// The definition file could not be read.
    #[error("catalog file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn snowflake_binding(query: &str) -> SourceBinding {
        SourceBinding::new(SourceConfig::Snowflake(SnowflakeConfig {
            account: Some("acme".into()),
            database: Some("md".into()),
            query: Some(query.into()),
            ..Default::default()
        }))
    }

    #[test]
    fn status_machine_allows_documented_transitions() {
        assert!(NodeStatus::Draft.can_transition_to(NodeStatus::Active));
        assert!(NodeStatus::Active.can_transition_to(NodeStatus::Deprecated));
        assert!(NodeStatus::Deprecated.can_transition_to(NodeStatus::Archived));
        assert!(NodeStatus::Active.can_transition_to(NodeStatus::Archived));
    }

    #[test]
    fn status_machine_rejects_everything_else() {
        let all = [
            NodeStatus::Draft,
            NodeStatus::Active,
            NodeStatus::Deprecated,
            NodeStatus::Archived,
        ];
        let allowed = [
            (NodeStatus::Draft, NodeStatus::Active),
            (NodeStatus::Active, NodeStatus::Deprecated),
            (NodeStatus::Deprecated, NodeStatus::Archived),
            (NodeStatus::Active, NodeStatus::Archived),
        ];
        for from in all {
            for to in all {
                let expected = allowed.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
    }

    #[test]
    fn ownership_inheritance_is_field_wise() {
        let mut child = Ownership {
            support_channel: Some("#equity-data".into()),
            ..Default::default()
        };
        let parent = Ownership {
            accountable_owner: Some("alice".into()),
            support_channel: Some("#all-data".into()),
            ..Default::default()
        };
        child.inherit_from(&parent);
        assert_eq!(child.accountable_owner.as_deref(), Some("alice"));
        // An already-set field is never overwritten.
        assert_eq!(child.support_channel.as_deref(), Some("#equity-data"));
        assert!(child.data_specialist.is_none());
    }

    #[test]
    fn source_config_yaml_round_trip() {
        let yaml = r#"
type: snowflake
config:
  account: acme
  database: md
  query: SELECT 1
  custom_knob: 7
"#;
        let config: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.source_type(), SourceType::Snowflake);
        assert_eq!(config.query(), Some("SELECT 1"));
        // Unknown keys survive in the escape hatch.
        let SourceConfig::Snowflake(inner) = &config else {
            panic!("expected snowflake variant");
        };
        assert_eq!(inner.extra.get("custom_knob"), Some(&serde_json::json!(7)));
    }

    #[test]
    fn connection_map_excludes_query() {
        let binding = snowflake_binding("SELECT 1");
        let map = binding.config.connection_map();
        assert!(map.contains_key("account"));
        assert!(!map.contains_key("query"));
    }

    #[test]
    fn binding_fingerprint_is_16_hex() {
        let fp = snowflake_binding("SELECT 1").fingerprint();
        assert_eq!(fp.len(), 16);
        assert!(fp.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn node_builder_defaults_active() {
        let node = CatalogNode::new("prices.equity");
        assert_eq!(node.status, NodeStatus::Active);
        assert!(node.source_binding.is_none());
    }
}
