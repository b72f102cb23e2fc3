//! The parsed moniker shape and its canonical rendering.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;

use crate::parser::MonikerParser;
use crate::Result;

/// The literal segment that matches every value at its position.
pub const WILDCARD_SEGMENT: &str = "ALL";

/// A version pin attached to a moniker with `@`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// The moving `latest` pointer.
    Latest,
    /// A concrete `YYYYMMDD` calendar date.
    Date(NaiveDate),
}

impl Version {
    /// Returns true for the `latest` pointer.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        matches!(self, Version::Latest)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Latest => f.write_str("latest"),
            Version::Date(d) => write!(f, "{}", d.format("%Y%m%d")),
        }
    }
}

/// The structured form of a moniker string.
///
/// Produced by [`MonikerPath::parse`]; [`MonikerPath::render`] is the
/// inverse and yields the canonical string form.
///
/// # Example
///
/// ```rust
/// use moniker_path::{MonikerPath, Version};
///
/// let path = MonikerPath::parse("rates.libor/usd/3m@latest").unwrap();
/// assert_eq!(path.domain, "rates.libor");
/// assert_eq!(path.segments, vec!["usd", "3m"]);
/// assert_eq!(path.version, Some(Version::Latest));
/// assert_eq!(path.render(), "rates.libor/usd/3m@latest");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonikerPath {
    /// Optional scope prefix (`user`, `verified`, `official`, or arbitrary).
    pub namespace: Option<String>,
    /// Dotted domain, always present.
    pub domain: String,
    /// Ordered path segments after the domain.
    pub segments: Vec<String>,
    /// Optional `@` version pin.
    pub version: Option<Version>,
    /// Optional `/vN` revision.
    pub revision: Option<u32>,
    /// Query parameters, sorted by key for canonical rendering.
    pub params: BTreeMap<String, String>,
}

impl MonikerPath {
    /// Parses a raw moniker string.
    ///
    /// Convenience wrapper around a process-wide [`MonikerParser`]; hold a
    /// parser directly when parsing in a hot loop.
    ///
    /// # Errors
    ///
    /// Returns [`crate::MonikerError`] with a sub-reason tag identifying
    /// the first grammar violation encountered.
    pub fn parse(raw: &str) -> Result<Self> {
        MonikerParser::shared().parse(raw)
    }

    /// Renders the canonical string form.
    ///
    /// Parameters are emitted sorted by key, so any two monikers that parse
    /// to the same structure render identically.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(ns) = &self.namespace {
            out.push_str(ns);
            out.push('@');
        }
        out.push_str(&self.domain);
        for seg in &self.segments {
            out.push('/');
            out.push_str(seg);
        }
        if let Some(version) = &self.version {
            out.push('@');
            out.push_str(&version.to_string());
        }
        if let Some(rev) = self.revision {
            out.push_str("/v");
            out.push_str(&rev.to_string());
        }
        if !self.params.is_empty() {
            out.push('?');
            let mut first = true;
            for (k, v) in &self.params {
                if !first {
                    out.push('&');
                }
                first = false;
                out.push_str(k);
                out.push('=');
                out.push_str(v);
            }
        }
        out
    }

    /// The registry lookup key: domain plus segments, namespace-blind.
    ///
    /// Version, revision, and parameters never participate in catalog
    /// addressing; `user@prices.equity/AAPL@latest` and
    /// `prices.equity/AAPL` address the same node.
    #[must_use]
    pub fn lookup_key(&self) -> String {
        if self.segments.is_empty() {
            self.domain.clone()
        } else {
            format!("{}/{}", self.domain, self.segments.join("/"))
        }
    }

    /// The segment at `index`, if present.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// True when the segment at `index` is the `ALL` wildcard.
    #[must_use]
    pub fn is_wildcard(&self, index: usize) -> bool {
        self.segment(index) == Some(WILDCARD_SEGMENT)
    }

    /// The raw version suffix (`latest` or `YYYYMMDD`), empty when unset.
    #[must_use]
    pub fn version_str(&self) -> String {
        self.version.map(|v| v.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for MonikerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Returns the parent of a dot-and-slash catalog path.
///
/// The last `/segment` is stripped first; a bare domain loses its last
/// dotted component instead. The root of a hierarchy has no parent.
///
/// ```rust
/// use moniker_path::parent_of;
///
/// assert_eq!(parent_of("prices.equity/AAPL"), Some("prices.equity".to_string()));
/// assert_eq!(parent_of("prices.equity"), Some("prices".to_string()));
/// assert_eq!(parent_of("prices"), None);
/// ```
#[must_use]
pub fn parent_of(path: &str) -> Option<String> {
    if let Some(idx) = path.rfind('/') {
        return Some(path[..idx].to_string());
    }
    path.rfind('.').map(|idx| path[..idx].to_string())
}
