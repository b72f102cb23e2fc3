//! # Moniker Catalog
//!
//! The authoritative registry behind moniker resolution: a tree of catalog
//! nodes keyed by dot-and-slash paths, each optionally carrying a source
//! binding (the contract telling clients where and how to fetch data),
//! ownership metadata inherited down the tree, and a lifecycle status.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────┐
//!                 │   CatalogRegistry    │
//!                 │ (snapshot + audit)   │
//!                 └──────────┬───────────┘
//!                            │
//!        ┌──────────┬────────┴───────┬────────────┐
//!        ▼          ▼                ▼            ▼
//!  ┌──────────┐ ┌─────────┐  ┌────────────┐ ┌──────────┐
//!  │ Finger-  │ │  Diff   │  │ Definition │ │  Audit   │
//!  │  print   │ │         │  │   (YAML)   │ │   Log    │
//!  └──────────┘ └─────────┘  └────────────┘ └──────────┘
//! ```
//!
//! - **Fingerprint**: canonical-JSON SHA-256 over a binding's contract
//!   fields, used to detect breaking changes across reloads.
//! - **Diff**: categorizes added / removed / binding-changed /
//!   status-changed paths between the live catalog and a replacement.
//! - **Definition**: the YAML file format the catalog is declared in.
//! - **Audit**: bounded, infallible trail of every mutation.
//!
//! Hot reload is an atomic snapshot swap: readers pin an `Arc` to a fully
//! built immutable snapshot and can never observe a half-applied reload.

pub mod audit;
pub mod definition;
pub mod diff;
pub mod fingerprint;
pub mod models;
pub mod registry;

pub use audit::{AuditEntry, AuditKind, AuditLog};
pub use definition::{CatalogDefinition, NodeDefinition};
pub use diff::{diff_nodes, CatalogDiff};
pub use fingerprint::{binding_fingerprint, canonical_json, fingerprint_value};
pub use models::{
    BloombergConfig, CatalogError, CatalogNode, ColumnDescriptor, Documentation, ExcelConfig,
    FileConfig, NodeStatus, OpensearchConfig, OracleConfig, Ownership, RefinitivConfig,
    RestConfig, Result, SnowflakeConfig, SourceBinding, SourceConfig, SourceType, StaticConfig,
};
pub use registry::{
    CatalogRegistry, CatalogSnapshot, StatusMetadata, MAX_SUCCESSOR_HOPS,
};
