//! Error types for moniker parsing.

use thiserror::Error;

/// Errors produced when a raw string does not match the moniker grammar.
///
/// Each variant carries the offending fragment so callers can surface a
/// precise message. [`MonikerError::reason`] exposes the stable machine
/// readable sub-reason tag.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonikerError {
    /// The input was empty or whitespace only.
    #[error("empty moniker")]
    Empty,

    /// The domain part is missing or malformed.
    ///
    /// Domains are dotted lowercase identifiers, e.g. `prices.equity`.
    #[error("invalid domain: {found:?}")]
    BadDomain {
        /// The rejected domain fragment.
        found: String,
    },

    /// A path segment contains characters outside `[A-Za-z0-9_.\-]`.
    #[error("invalid segment: {found:?}")]
    BadSegment {
        /// The rejected segment.
        found: String,
    },

    /// The `@version` suffix is neither `latest` nor a valid `YYYYMMDD` date.
    #[error("invalid version: {found:?}")]
    BadVersion {
        /// The rejected version suffix.
        found: String,
    },

    /// The `/vN` suffix is not a positive integer.
    #[error("invalid revision: {found:?}")]
    BadRevision {
        /// The rejected revision digits.
        found: String,
    },

    /// The `?k=v&...` parameter block is malformed.
    #[error("invalid parameters: {found:?}")]
    BadParams {
        /// The rejected parameter fragment.
        found: String,
    },
}

impl MonikerError {
    /// Stable sub-reason tag for surfacing alongside `invalid_moniker`.
    pub fn reason(&self) -> &'static str {
        match self {
            MonikerError::Empty => "empty",
            MonikerError::BadDomain { .. } => "bad_domain",
            MonikerError::BadSegment { .. } => "bad_segment",
            MonikerError::BadVersion { .. } => "bad_version",
            MonikerError::BadRevision { .. } => "bad_revision",
            MonikerError::BadParams { .. } => "bad_params",
        }
    }
}
