//! Error types for governance operations.

use thiserror::Error;

use crate::auth::Role;
use moniker_catalog::CatalogError;
use moniker_path::MonikerError;

/// Errors raised by the governance lanes.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The presented token does not grant the required role.
    #[error("forbidden: requires the {required:?} role")]
    Forbidden {
        /// Minimum role the operation demands.
        required: Role,
    },

    /// The operation conflicts with current state (duplicate path,
    /// request already resolved, illegal transition).
    #[error("conflict: {0}")]
    Conflict(String),

    /// No request with the given id.
    #[error("unknown request: {0}")]
    UnknownRequest(String),

    /// The proposed moniker path does not parse.
    #[error("invalid moniker path: {0}")]
    InvalidPath(#[from] MonikerError),

    /// A catalog operation failed underneath.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result type for governance operations.
pub type Result<T> = std::result::Result<T, GovernanceError>;
