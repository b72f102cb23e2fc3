//! Catalog diffing for validated reloads.
//!
//! A reload offers a complete replacement node set; the diff categorizes
//! every change so governance can decide whether to apply it. Binding
//! changes are detected by fingerprint inequality, which catches a binding
//! appearing, disappearing, or changing contract in any field.
//!
//! Removed paths and changed bindings are *breaking*: a client holding a
//! resolved contract for one of those paths would be wrong after the
//! reload. Additions and status changes are not.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::CatalogNode;

/// Categorized changes between the live catalog and an offered replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogDiff {
    /// Paths present only in the replacement.
    pub added_paths: Vec<String>,
    /// Paths present only in the live catalog.
    pub removed_paths: Vec<String>,
    /// Paths whose binding fingerprint differs.
    pub binding_changed_paths: Vec<String>,
    /// Paths whose lifecycle status differs.
    pub status_changed_paths: Vec<String>,
}

impl CatalogDiff {
    /// True when applying the replacement would break resolved contracts.
    #[must_use]
    pub fn has_breaking_changes(&self) -> bool {
        !self.removed_paths.is_empty() || !self.binding_changed_paths.is_empty()
    }

    /// True when the replacement is identical to the live catalog.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added_paths.is_empty()
            && self.removed_paths.is_empty()
            && self.binding_changed_paths.is_empty()
            && self.status_changed_paths.is_empty()
    }

    /// Total number of categorized changes.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.added_paths.len()
            + self.removed_paths.len()
            + self.binding_changed_paths.len()
            + self.status_changed_paths.len()
    }
}

/// Computes the diff between two path-keyed node sets.
#[must_use]
pub fn diff_nodes(
    current: &BTreeMap<String, CatalogNode>,
    next: &BTreeMap<String, CatalogNode>,
) -> CatalogDiff {
    let mut diff = CatalogDiff::default();

    for (path, node) in next {
        match current.get(path) {
            None => diff.added_paths.push(path.clone()),
            Some(existing) => {
                if existing.binding_fingerprint() != node.binding_fingerprint() {
                    diff.binding_changed_paths.push(path.clone());
                }
                if existing.status != node.status {
                    diff.status_changed_paths.push(path.clone());
                }
            }
        }
    }
    for path in current.keys() {
        if !next.contains_key(path) {
            diff.removed_paths.push(path.clone());
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeStatus, SnowflakeConfig, SourceBinding, SourceConfig};

    fn node(path: &str, query: Option<&str>) -> CatalogNode {
        let mut n = CatalogNode::new(path);
        if let Some(q) = query {
            n = n.with_binding(SourceBinding::new(SourceConfig::Snowflake(
                SnowflakeConfig {
                    query: Some(q.into()),
                    ..Default::default()
                },
            )));
        }
        n
    }

    fn keyed(nodes: Vec<CatalogNode>) -> BTreeMap<String, CatalogNode> {
        nodes.into_iter().map(|n| (n.path.clone(), n)).collect()
    }

    #[test]
    fn identical_sets_diff_empty() {
        let a = keyed(vec![node("a.b", Some("SELECT 1")), node("a.b/c", None)]);
        let diff = diff_nodes(&a, &a);
        assert!(diff.is_empty());
        assert!(!diff.has_breaking_changes());
    }

    #[test]
    fn addition_is_not_breaking() {
        let current = keyed(vec![node("a.b", None)]);
        let next = keyed(vec![node("a.b", None), node("a.b/c", None)]);
        let diff = diff_nodes(&current, &next);
        assert_eq!(diff.added_paths, vec!["a.b/c"]);
        assert!(!diff.has_breaking_changes());
    }

    #[test]
    fn removal_is_breaking() {
        let current = keyed(vec![node("a.b", None), node("a.b/c", None)]);
        let next = keyed(vec![node("a.b", None)]);
        let diff = diff_nodes(&current, &next);
        assert_eq!(diff.removed_paths, vec!["a.b/c"]);
        assert!(diff.has_breaking_changes());
    }

    #[test]
    fn query_change_is_breaking() {
        let current = keyed(vec![node("a.b", Some("SELECT 1"))]);
        let next = keyed(vec![node("a.b", Some("SELECT 2"))]);
        let diff = diff_nodes(&current, &next);
        assert_eq!(diff.binding_changed_paths, vec!["a.b"]);
        assert!(diff.has_breaking_changes());
    }

    #[test]
    fn binding_disappearing_is_breaking() {
        let current = keyed(vec![node("a.b", Some("SELECT 1"))]);
        let next = keyed(vec![node("a.b", None)]);
        let diff = diff_nodes(&current, &next);
        assert_eq!(diff.binding_changed_paths, vec!["a.b"]);
    }

    #[test]
    fn status_change_is_tracked_but_not_breaking() {
        let current = keyed(vec![node("a.b", None)]);
        let next = keyed(vec![node("a.b", None).with_status(NodeStatus::Deprecated)]);
        let diff = diff_nodes(&current, &next);
        assert_eq!(diff.status_changed_paths, vec!["a.b"]);
        assert!(!diff.has_breaking_changes());
    }
}
