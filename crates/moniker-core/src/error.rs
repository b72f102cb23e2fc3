//! Service-level error types.

use thiserror::Error;

use moniker_catalog::CatalogError;
use moniker_governance::GovernanceError;
use moniker_path::MonikerError;
use moniker_telemetry::Outcome;

use crate::template::TemplateError;

/// Errors surfaced by the moniker service.
///
/// Each variant maps to a stable surface kind via [`ServiceError::kind`],
/// which the external transport layer translates into a status code
/// (bad request, not found, conflict, and so on).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The moniker string did not parse.
    #[error("invalid moniker: {0}")]
    InvalidMoniker(#[from] MonikerError),

    /// No catalog node matches the moniker or any of its ancestors.
    #[error("unknown moniker: {0}")]
    NotFound(String),

    /// A node exists but no binding is reachable up the tree.
    #[error("no source binding reachable from {0}")]
    NoBinding(String),

    /// Template expansion failed.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// The presented token does not grant the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Illegal transition, duplicate approval, or path conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A validated reload was refused because of breaking changes.
    #[error("reload rejected: breaking changes present")]
    BreakingReloadRejected,

    /// Anything unclassified.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine-readable kind tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidMoniker(_) => "invalid_moniker",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::NoBinding(_) => "no_binding",
            ServiceError::Template(_) => "template_error",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::BreakingReloadRejected => "breaking_reload_rejected",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// The telemetry outcome this error reports as.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self {
            ServiceError::NotFound(_) => Outcome::NotFound,
            _ => Outcome::Error,
        }
    }
}

impl From<GovernanceError> for ServiceError {
    fn from(err: GovernanceError) -> Self {
        match err {
            GovernanceError::Forbidden { required } => {
                ServiceError::Forbidden(format!("requires the {required:?} role"))
            }
            GovernanceError::Conflict(msg) => ServiceError::Conflict(msg),
            GovernanceError::UnknownRequest(id) => {
                ServiceError::Conflict(format!("unknown request: {id}"))
            }
            GovernanceError::InvalidPath(err) => ServiceError::InvalidMoniker(err),
            GovernanceError::Catalog(err) => err.into(),
        }
    }
}

impl From<CatalogError> for ServiceError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::UnknownPath(path) => ServiceError::NotFound(path),
            CatalogError::IllegalTransition { path, from, to } => {
                ServiceError::Conflict(format!("illegal transition for {path}: {from} -> {to}"))
            }
            CatalogError::DuplicatePath(path) => {
                ServiceError::Conflict(format!("duplicate path: {path}"))
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(ServiceError::NotFound("a.b".into()).kind(), "not_found");
        assert_eq!(ServiceError::BreakingReloadRejected.kind(), "breaking_reload_rejected");
        assert_eq!(ServiceError::Internal("x".into()).kind(), "internal");
    }

    #[test]
    fn outcome_mapping() {
        assert_eq!(
            ServiceError::NotFound("a.b".into()).outcome(),
            Outcome::NotFound
        );
        assert_eq!(
            ServiceError::NoBinding("a.b".into()).outcome(),
            Outcome::Error
        );
    }

    #[test]
    fn governance_errors_map_across() {
        let err: ServiceError = GovernanceError::Conflict("dup".into()).into();
        assert_eq!(err.kind(), "conflict");

        let err: ServiceError =
            GovernanceError::Catalog(CatalogError::UnknownPath("a.b".into())).into();
        assert_eq!(err.kind(), "not_found");
    }
}
