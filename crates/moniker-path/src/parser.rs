//! The greedy-left moniker parser.
//!
//! Suffixes are peeled from the right edge in a fixed order (params,
//! revision, version) before the remainder splits into namespace, domain,
//! and segments. Each piece is validated against a compiled pattern; the
//! first violation wins.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::error::MonikerError;
use crate::path::{MonikerPath, Version};
use crate::Result;

static SHARED: OnceLock<MonikerParser> = OnceLock::new();

/// A moniker parser with pre-compiled grammar patterns.
///
/// Construction compiles the patterns once; cloning is cheap enough that a
/// process-wide instance (see [`MonikerParser::shared`]) serves most
/// callers.
#[derive(Debug)]
pub struct MonikerParser {
    domain: Regex,
    identifier: Regex,
    segment: Regex,
    revision_suffix: Regex,
}

impl MonikerParser {
    /// Compiles the grammar patterns.
    #[must_use]
    pub fn new() -> Self {
        // The patterns are fixed literals; compilation cannot fail.
        Self {
            domain: Regex::new(r"^[a-z][a-z0-9_]*(\.[a-z][a-z0-9_]*)*$").unwrap(),
            identifier: Regex::new(r"^[a-z][a-z0-9_]*$").unwrap(),
            segment: Regex::new(r"^[A-Za-z0-9_.\-]+$").unwrap(),
            revision_suffix: Regex::new(r"^(.*)/v([0-9]+)$").unwrap(),
        }
    }

    /// The process-wide parser instance.
    pub fn shared() -> &'static Self {
        SHARED.get_or_init(Self::new)
    }

    /// Parses a raw moniker string into its structured form.
    ///
    /// # Errors
    ///
    /// Returns [`MonikerError`] naming the first rejected fragment.
    pub fn parse(&self, raw: &str) -> Result<MonikerPath> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MonikerError::Empty);
        }

        let (rest, params) = self.split_params(trimmed)?;
        let rest = rest.trim_matches('/');
        let (rest, revision) = self.split_revision(rest)?;
        let (rest, version) = self.split_version(rest)?;

        let rest = rest.trim_matches('/');
        if rest.is_empty() {
            return Err(MonikerError::BadDomain {
                found: rest.to_string(),
            });
        }

        let (head, tail) = match rest.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (rest, None),
        };

        let (namespace, domain) = match head.split_once('@') {
            Some((ns, domain)) => (Some(ns), domain),
            None => (None, head),
        };

        if let Some(ns) = namespace {
            if !self.identifier.is_match(ns) {
                return Err(MonikerError::BadDomain {
                    found: format!("{ns}@{domain}"),
                });
            }
        }
        if !self.domain.is_match(domain) {
            return Err(MonikerError::BadDomain {
                found: domain.to_string(),
            });
        }

        let mut segments = Vec::new();
        if let Some(tail) = tail {
            for seg in tail.split('/') {
                if seg.is_empty() || !self.segment.is_match(seg) {
                    return Err(MonikerError::BadSegment {
                        found: seg.to_string(),
                    });
                }
                segments.push(seg.to_string());
            }
        }

        Ok(MonikerPath {
            namespace: namespace.map(str::to_string),
            domain: domain.to_string(),
            segments,
            version,
            revision,
            params,
        })
    }

    /// Splits `?k=v&...` off the end, if present.
    fn split_params<'a>(&self, input: &'a str) -> Result<(&'a str, BTreeMap<String, String>)> {
        let Some((rest, raw_params)) = input.split_once('?') else {
            return Ok((input, BTreeMap::new()));
        };
        if raw_params.is_empty() {
            return Err(MonikerError::BadParams {
                found: raw_params.to_string(),
            });
        }
        let mut params = BTreeMap::new();
        for pair in raw_params.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(MonikerError::BadParams {
                    found: pair.to_string(),
                });
            };
            if key.is_empty() {
                return Err(MonikerError::BadParams {
                    found: pair.to_string(),
                });
            }
            params.insert(key.to_string(), value.to_string());
        }
        Ok((rest, params))
    }

    /// Splits a trailing `/vN` revision, if present.
    fn split_revision<'a>(&self, input: &'a str) -> Result<(&'a str, Option<u32>)> {
        let Some(caps) = self.revision_suffix.captures(input) else {
            return Ok((input, None));
        };
        let digits = caps.get(2).map_or("", |m| m.as_str());
        let revision: u32 = digits.parse().map_err(|_| MonikerError::BadRevision {
            found: digits.to_string(),
        })?;
        if revision == 0 {
            return Err(MonikerError::BadRevision {
                found: digits.to_string(),
            });
        }
        let rest_len = caps.get(1).map_or(0, |m| m.as_str().len());
        Ok((&input[..rest_len], Some(revision)))
    }

    /// Splits a trailing `@version`, if present.
    ///
    /// Only `latest` or an eight-digit suffix after the last `@` is taken
    /// as a version; anything else is left for namespace handling. Eight
    /// digits that do not form a real calendar date are rejected.
    fn split_version<'a>(&self, input: &'a str) -> Result<(&'a str, Option<Version>)> {
        let Some(at) = input.rfind('@') else {
            return Ok((input, None));
        };
        let suffix = &input[at + 1..];
        if suffix == "latest" {
            return Ok((&input[..at], Some(Version::Latest)));
        }
        if suffix.len() == 8 && suffix.bytes().all(|b| b.is_ascii_digit()) {
            let date = NaiveDate::parse_from_str(suffix, "%Y%m%d").map_err(|_| {
                MonikerError::BadVersion {
                    found: suffix.to_string(),
                }
            })?;
            return Ok((&input[..at], Some(Version::Date(date))));
        }
        Ok((input, None))
    }
}

impl Default for MonikerParser {
    fn default() -> Self {
        Self::new()
    }
}
