//! # Moniker Core
//!
//! The resolution facade for a catalog-driven moniker service: clients
//! hand in a hierarchical name like `prices.equity/AAPL@20260115` and get
//! back connection instructions (source type, connection attributes, an
//! expanded query) plus ownership and lifecycle metadata. The service
//! never touches the data itself; it is a control-plane directory with
//! usage telemetry.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       MonikerService                         │
//! ├──────────────────────────────────────────────────────────────┤
//! │  parse ──► registry walk ──► successor redirect ──► expand   │
//! │    │             │                                     │     │
//! │    ▼             ▼                                     ▼     │
//! │ moniker-path  moniker-catalog                   template     │
//! │                                                              │
//! │  governance lanes ──► moniker-governance                     │
//! │  usage events ──────► moniker-telemetry                      │
//! │  result cache ──────► TTL + LRU, purged on reload            │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use moniker_core::{Caller, MonikerService, ServiceConfig};
//! use moniker_telemetry::TracingSink;
//!
//! # async fn demo() -> Result<(), moniker_core::ServiceError> {
//! let service = MonikerService::load(ServiceConfig::from_env(), Arc::new(TracingSink))?;
//! let result = service.resolve("prices.equity/AAPL@latest", &Caller::new("pricing-ui"))?;
//! println!("{} -> {:?}", result.path, result.query);
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod error;
mod result;
mod service;
pub mod template;

pub use cache::{CacheStats, TtlCache};
pub use config::{
    AuthConfig, CacheConfig, CatalogFileConfig, ResolverConfig, ServiceConfig, TelemetryConfig,
};
pub use error::{Result, ServiceError};
pub use result::{
    BatchResolveItem, CatalogStats, DescribeResult, HealthReport, LineageResult, ResolveResult,
    SearchHit, TreeEntry,
};
pub use service::{EnsureApplied, MonikerService};
pub use template::{expand, TemplateError, TemplateExpander};

// Re-export the types callers need to drive the service.
pub use moniker_catalog::{
    CatalogDefinition, CatalogNode, NodeStatus, Ownership, SourceBinding, SourceConfig,
    SourceType, StatusMetadata,
};
pub use moniker_governance::{
    MonikerProposal, MonikerRequest, ReloadReport, RequestStatus, Role,
};
pub use moniker_path::{MonikerPath, Version};
pub use moniker_telemetry::{Caller, Operation, Outcome, UsageEvent};
