//! Catalog definition files.
//!
//! The catalog is declared in YAML as a mapping from path to node
//! attributes:
//!
//! ```yaml
//! prices:
//!   ownership:
//!     accountable_owner: alice
//! prices.equity:
//!   display_name: Equity prices
//!   source_binding:
//!     type: snowflake
//!     config:
//!       account: acme
//!       query: "SELECT * FROM equity WHERE {filter[0]:symbol}"
//!   tags: [prices, equity]
//! ```
//!
//! Definitions from several files can be merged (later files win) before
//! being turned into validated [`CatalogNode`]s.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use moniker_path::MonikerPath;

use crate::models::{
    CatalogError, CatalogNode, Documentation, NodeStatus, Ownership, Result, SourceBinding,
};

/// Declarative attributes for one catalog node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<NodeStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecation_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sunset_deadline: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration_guide_url: Option<String>,
    #[serde(default)]
    pub ownership: Ownership,
    /// Accountable data owner proxy; merged into ownership when the
    /// nested record leaves it unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub adop: Option<String>,
    /// Accountable data specialist; merged like `adop`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ads: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_binding: Option<SourceBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<Documentation>,
}

/// A complete catalog declaration: path -> node attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogDefinition {
    pub nodes: BTreeMap<String, NodeDefinition>,
}

impl CatalogDefinition {
    /// Parses a YAML definition document.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Definition`] on malformed YAML or unknown
    /// node attributes.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a YAML definition file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Merges another definition into this one; `other`'s entries win on
    /// path collision. Used to layer supplemental definition files
    /// (domain and model catalogs) over the main one.
    pub fn merge(&mut self, other: CatalogDefinition) {
        self.nodes.extend(other.nodes);
    }

    /// Number of declared nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Validates paths and produces catalog nodes.
    ///
    /// Every key must be a plain dot-and-slash path: it has to parse under
    /// the moniker grammar and must not carry a namespace, version,
    /// revision, or parameters. Status defaults to `ACTIVE` unless the
    /// definition says otherwise.
    pub fn into_nodes(self) -> Result<Vec<CatalogNode>> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (path, def) in self.nodes {
            validate_catalog_path(&path)?;
            let mut ownership = def.ownership;
            if ownership.adop.is_none() {
                ownership.adop = def.adop;
            }
            if ownership.ads.is_none() {
                ownership.ads = def.ads;
            }
            nodes.push(CatalogNode {
                path,
                display_name: def.display_name,
                description: def.description,
                tags: def.tags,
                semantic_tags: def.semantic_tags,
                status: def.status.unwrap_or_default(),
                deprecation_message: def.deprecation_message,
                successor: def.successor,
                sunset_deadline: def.sunset_deadline,
                migration_guide_url: def.migration_guide_url,
                ownership,
                source_binding: def.source_binding,
                documentation: def.documentation,
            });
        }
        Ok(nodes)
    }
}

fn validate_catalog_path(path: &str) -> Result<()> {
    let parsed = MonikerPath::parse(path).map_err(|e| CatalogError::InvalidPath {
        path: path.to_string(),
        reason: e.to_string(),
    })?;
    if parsed.namespace.is_some()
        || parsed.version.is_some()
        || parsed.revision.is_some()
        || !parsed.params.is_empty()
    {
        return Err(CatalogError::InvalidPath {
            path: path.to_string(),
            reason: "catalog paths carry no namespace, version, revision, or parameters".into(),
        });
    }
    if parsed.lookup_key() != path {
        return Err(CatalogError::InvalidPath {
            path: path.to_string(),
            reason: "path is not in canonical form".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceType;
    use std::io::Write;

    const SAMPLE: &str = r#"
prices:
  ownership:
    accountable_owner: alice
prices.equity:
  display_name: Equity prices
  adop: bob
  source_binding:
    type: snowflake
    config:
      account: acme
      query: "SELECT * FROM equity WHERE {filter[0]:symbol}"
    allowed_operations: [READ]
    read_only: true
  tags: [prices, equity]
rates.libor/usd:
  status: DEPRECATED
  successor: rates.sofr/usd
  sunset_deadline: 2026-12-31
rates.sofr/usd:
  source_binding:
    type: rest
    config:
      base_url: https://rates.internal
      query: "/sofr/{segments[0]}"
"#;

    #[test]
    fn parses_sample_definition() {
        let def = CatalogDefinition::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(def.len(), 4);

        let nodes = def.into_nodes().unwrap();
        let equity = nodes.iter().find(|n| n.path == "prices.equity").unwrap();
        assert_eq!(equity.status, NodeStatus::Active);
        assert_eq!(equity.ownership.adop.as_deref(), Some("bob"));
        let binding = equity.source_binding.as_ref().unwrap();
        assert_eq!(binding.config.source_type(), SourceType::Snowflake);
        assert!(binding.read_only);

        let libor = nodes.iter().find(|n| n.path == "rates.libor/usd").unwrap();
        assert_eq!(libor.status, NodeStatus::Deprecated);
        assert_eq!(libor.successor.as_deref(), Some("rates.sofr/usd"));
        assert_eq!(
            libor.sunset_deadline,
            NaiveDate::from_ymd_opt(2026, 12, 31)
        );
    }

    #[test]
    fn invalid_path_rejected() {
        let def =
            CatalogDefinition::from_yaml_str("Bad.Domain:\n  display_name: nope\n").unwrap();
        assert!(matches!(
            def.into_nodes(),
            Err(CatalogError::InvalidPath { .. })
        ));
    }

    #[test]
    fn versioned_path_rejected() {
        let def = CatalogDefinition::from_yaml_str("prices.equity@latest: {}\n").unwrap();
        assert!(matches!(
            def.into_nodes(),
            Err(CatalogError::InvalidPath { .. })
        ));
    }

    #[test]
    fn unknown_attribute_rejected() {
        let err = CatalogDefinition::from_yaml_str("prices:\n  owner: alice\n").unwrap_err();
        assert!(matches!(err, CatalogError::Definition(_)));
    }

    #[test]
    fn merge_later_wins() {
        let mut base = CatalogDefinition::from_yaml_str("a.b:\n  display_name: one\n").unwrap();
        let overlay =
            CatalogDefinition::from_yaml_str("a.b:\n  display_name: two\na.c: {}\n").unwrap();
        base.merge(overlay);
        assert_eq!(base.len(), 2);
        assert_eq!(
            base.nodes["a.b"].display_name.as_deref(),
            Some("two")
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let def = CatalogDefinition::load(file.path()).unwrap();
        assert_eq!(def.len(), 4);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            CatalogDefinition::load("/definitely/not/here.yaml"),
            Err(CatalogError::Io(_))
        ));
    }
}
