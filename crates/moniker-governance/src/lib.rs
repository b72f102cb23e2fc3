//! # Moniker Governance
//!
//! The change-control surface of the moniker catalog: who may propose and
//! approve monikers, how node lifecycles advance, and how a full catalog
//! reload is validated before it goes live.
//!
//! ## Lanes
//!
//! | Lane | Token | Operations |
//! |------|-------|------------|
//! | Read | none | everything read-only |
//! | Submit | submit token | propose monikers, list requests |
//! | Approve | approve token | approve / reject, status transitions |
//!
//! A legacy single write token can stand in for both lanes during
//! migration; missing tokens are generated at startup and logged once.

mod auth;
mod controller;
mod error;
mod requests;

pub use auth::{AuthGate, Role};
pub use controller::{GovernanceController, ReloadReport};
pub use error::{GovernanceError, Result};
pub use requests::{MonikerProposal, MonikerRequest, RequestStatus};
