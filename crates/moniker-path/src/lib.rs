//! # Moniker Grammar
//!
//! Parsing and canonical rendering of monikers: hierarchical names that
//! identify data assets in a catalog, e.g. `prices.equity/AAPL@20260115`.
//!
//! ## Grammar
//!
//! ```text
//! moniker   := [namespace "@"] domain [ "/" segments ] [ "@" version ] [ "/v" revision ] [ "?" params ]
//! namespace := identifier
//! domain    := dotted_identifier
//! segments  := segment ("/" segment)*
//! segment   := [A-Za-z0-9_.\-]+ | "ALL"
//! version   := "latest" | [0-9]{8}
//! revision  := [0-9]+
//! ```
//!
//! Parsing is greedy from the right edge: query parameters are split off
//! first, then a trailing `/vN` revision, then a trailing `@version`. The
//! remainder splits on the first `/` into `[namespace@]domain` and the
//! segment list. A trailing `@suffix` only counts as a version when it is
//! `latest` or exactly eight digits, so namespace prefixes such as
//! `user@prices.equity` stay unambiguous.
//!
//! ## Canonical form
//!
//! [`MonikerPath::render`] produces the canonical string (parameters sorted
//! by key); rendering a parsed moniker and re-parsing it is a fixed point.
//!
//! ## Example
//!
//! ```rust
//! use moniker_path::MonikerPath;
//!
//! let path = MonikerPath::parse("user@prices.equity/AAPL@latest/v2?window=30d").unwrap();
//! assert_eq!(path.namespace.as_deref(), Some("user"));
//! assert_eq!(path.domain, "prices.equity");
//! assert_eq!(path.segments, vec!["AAPL"]);
//! assert_eq!(path.revision, Some(2));
//! assert_eq!(path.lookup_key(), "prices.equity/AAPL");
//! ```

mod error;
mod parser;
mod path;

pub use error::MonikerError;
pub use parser::MonikerParser;
pub use path::{parent_of, MonikerPath, Version, WILDCARD_SEGMENT};

/// Result type alias for moniker parsing.
pub type Result<T> = std::result::Result<T, MonikerError>;

/// Parses and re-renders a moniker, producing its canonical string form.
///
/// # Errors
///
/// Returns [`MonikerError`] when the input does not match the grammar.
pub fn canonicalize(raw: &str) -> Result<String> {
    Ok(MonikerPath::parse(raw)?.render())
}
