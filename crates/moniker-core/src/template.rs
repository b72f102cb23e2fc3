//! # Query Template Expansion
//!
//! Turns a binding's query template into a concrete query using the
//! parsed parts of the moniker being resolved.
//!
//! ## Placeholders
//!
//! Raw substitutions:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{path}` | segments joined by `/` |
//! | `{segments[N]}` | Nth segment, error when out of range |
//! | `{version}` | raw version suffix, empty when absent |
//! | `{revision}` | revision digits, empty when absent |
//! | `{namespace}` | namespace, empty when absent |
//!
//! SQL-translated substitutions:
//!
//! | Placeholder | Value |
//! |-------------|-------|
//! | `{version_date}` | `CURRENT_DATE()` / `'__LATEST__'` / `TO_DATE('YYYYMMDD','YYYYMMDD')` |
//! | `{filter[N]:column}` | `column = '<segment>'`, or `1=1` for the `ALL` wildcard |
//! | `{is_all[N]}` | `'true'` / `'false'` |
//! | `{is_latest}` | `'true'` / `'false'` |
//!
//! Segment values are single-quoted with embedded quotes doubled.
//! Placeholders the expander does not know are collected and reported as
//! a template error rather than silently passed through.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use moniker_path::{MonikerPath, Version};

static SHARED: OnceLock<TemplateExpander> = OnceLock::new();

/// Errors raised during template expansion.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// Placeholders the expander does not recognize.
    #[error("unresolved template placeholders: {placeholders:?}")]
    Missing {
        /// The unknown placeholders, as written.
        placeholders: Vec<String>,
    },

    /// An indexed placeholder referenced a segment that is not there.
    #[error("segment index {index} out of range ({available} segments)")]
    SegmentOutOfRange {
        /// Requested 0-based index.
        index: usize,
        /// Segments actually present.
        available: usize,
    },

    /// A `{filter[N]}` without its `:column` part.
    #[error("placeholder {placeholder} requires a column, e.g. {{filter[0]:symbol}}")]
    MissingColumn {
        /// The offending placeholder, as written.
        placeholder: String,
    },
}

/// Expands query templates against parsed monikers.
#[derive(Debug)]
pub struct TemplateExpander {
    placeholder: Regex,
}

impl TemplateExpander {
    /// Compiles the placeholder pattern.
    #[must_use]
    pub fn new() -> Self {
        Self {
            // name, optional [index], optional :column
            placeholder: Regex::new(r"\{([A-Za-z_]+)(?:\[([0-9]+)\])?(?::([^{}]+))?\}").unwrap(),
        }
    }

    /// The process-wide expander instance.
    pub fn shared() -> &'static Self {
        SHARED.get_or_init(Self::new)
    }

    /// Expands `template` using the parsed moniker.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for unknown placeholders, out-of-range
    /// segment indexes, or a filter without a column.
    pub fn expand(&self, template: &str, path: &MonikerPath) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut last_end = 0;
        let mut unknown: Vec<String> = Vec::new();

        for caps in self.placeholder.captures_iter(template) {
            let whole = caps.get(0).expect("capture 0 always present");
            out.push_str(&template[last_end..whole.start()]);
            last_end = whole.end();

            let name = caps.get(1).map_or("", |m| m.as_str());
            let index: Option<usize> = caps.get(2).and_then(|m| m.as_str().parse().ok());
            let column = caps.get(3).map(|m| m.as_str());

            match (name, index) {
                ("path", None) => out.push_str(&path.segments.join("/")),
                ("segments", Some(i)) => out.push_str(self.segment_at(path, i)?),
                ("version", None) => out.push_str(&path.version_str()),
                ("revision", None) => {
                    if let Some(rev) = path.revision {
                        out.push_str(&rev.to_string());
                    }
                }
                ("namespace", None) => {
                    if let Some(ns) = &path.namespace {
                        out.push_str(ns);
                    }
                }
                ("version_date", None) => out.push_str(&version_date_sql(path.version)),
                ("filter", Some(i)) => {
                    let Some(column) = column else {
                        return Err(TemplateError::MissingColumn {
                            placeholder: whole.as_str().to_string(),
                        });
                    };
                    let segment = self.segment_at(path, i)?;
                    if path.is_wildcard(i) {
                        out.push_str("1=1");
                    } else {
                        out.push_str(column.trim());
                        out.push_str(" = ");
                        out.push_str(&sql_quote(segment));
                    }
                }
                ("is_all", Some(i)) => {
                    self.segment_at(path, i)?;
                    out.push_str(sql_bool(path.is_wildcard(i)));
                }
                ("is_latest", None) => {
                    out.push_str(sql_bool(matches!(path.version, Some(Version::Latest))));
                }
                _ => unknown.push(whole.as_str().to_string()),
            }
        }
        out.push_str(&template[last_end..]);

        if !unknown.is_empty() {
            return Err(TemplateError::Missing {
                placeholders: unknown,
            });
        }
        Ok(out)
    }

    fn segment_at<'p>(
        &self,
        path: &'p MonikerPath,
        index: usize,
    ) -> Result<&'p str, TemplateError> {
        path.segment(index)
            .ok_or(TemplateError::SegmentOutOfRange {
                index,
                available: path.segments.len(),
            })
    }
}

impl Default for TemplateExpander {
    fn default() -> Self {
        Self::new()
    }
}

/// Expands `template` with the process-wide expander.
pub fn expand(template: &str, path: &MonikerPath) -> Result<String, TemplateError> {
    TemplateExpander::shared().expand(template, path)
}

/// SQL translation of the version pin.
fn version_date_sql(version: Option<Version>) -> String {
    match version {
        None => "CURRENT_DATE()".to_string(),
        Some(Version::Latest) => "'__LATEST__'".to_string(),
        Some(Version::Date(date)) => {
            format!("TO_DATE('{}','YYYYMMDD')", date.format("%Y%m%d"))
        }
    }
}

fn sql_bool(value: bool) -> &'static str {
    if value {
        "'true'"
    } else {
        "'false'"
    }
}

/// Single-quotes a value, doubling embedded quotes.
fn sql_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(raw: &str) -> MonikerPath {
        MonikerPath::parse(raw).unwrap()
    }

    #[test]
    fn filter_and_version_date_with_pinned_date() {
        let query = expand(
            "SELECT s,p FROM E WHERE {filter[0]:symbol} AND trade_date = {version_date}",
            &path("prices.equity/AAPL@20260115"),
        )
        .unwrap();
        assert_eq!(
            query,
            "SELECT s,p FROM E WHERE symbol = 'AAPL' AND trade_date = TO_DATE('20260115','YYYYMMDD')"
        );
    }

    #[test]
    fn wildcard_and_latest() {
        let query = expand(
            "SELECT * FROM E WHERE {filter[0]:symbol} AND d = {version_date} AND {is_latest}",
            &path("prices.equity/ALL@latest"),
        )
        .unwrap();
        assert!(query.contains("1=1"));
        assert!(query.contains("'__LATEST__'"));
        assert!(query.ends_with("'true'"));
    }

    #[test]
    fn absent_version_defaults_to_current_date() {
        let query = expand("d = {version_date}", &path("prices.equity/AAPL")).unwrap();
        assert_eq!(query, "d = CURRENT_DATE()");
    }

    #[test]
    fn raw_placeholders() {
        let p = path("user@prices.equity/AAPL/close@20260115/v2");
        assert_eq!(expand("{path}", &p).unwrap(), "AAPL/close");
        assert_eq!(expand("{segments[1]}", &p).unwrap(), "close");
        assert_eq!(expand("{version}", &p).unwrap(), "20260115");
        assert_eq!(expand("{revision}", &p).unwrap(), "2");
        assert_eq!(expand("{namespace}", &p).unwrap(), "user");
    }

    #[test]
    fn absent_raw_placeholders_expand_empty() {
        let p = path("prices.equity/AAPL");
        assert_eq!(expand("[{version}][{revision}][{namespace}]", &p).unwrap(), "[][][]");
    }

    #[test]
    fn segment_out_of_range_is_an_error() {
        let err = expand("{segments[3]}", &path("prices.equity/AAPL")).unwrap_err();
        assert_eq!(
            err,
            TemplateError::SegmentOutOfRange {
                index: 3,
                available: 1
            }
        );
    }

    #[test]
    fn unknown_placeholders_are_reported() {
        let err = expand(
            "SELECT {mystery} FROM {table}",
            &path("prices.equity/AAPL"),
        )
        .unwrap_err();
        let TemplateError::Missing { placeholders } = err else {
            panic!("expected missing placeholders");
        };
        assert_eq!(placeholders, vec!["{mystery}", "{table}"]);
    }

    #[test]
    fn filter_without_column_is_an_error() {
        let err = expand("WHERE {filter[0]}", &path("prices.equity/AAPL")).unwrap_err();
        assert!(matches!(err, TemplateError::MissingColumn { .. }));
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        // Quote characters cannot appear in parsed segments, but expansion
        // must stay injection-safe for any segment value it is handed.
        let p = MonikerPath {
            domain: "ref_data.clients".into(),
            segments: vec!["O'Brien".into()],
            ..Default::default()
        };
        let query = expand("WHERE {filter[0]:name}", &p).unwrap();
        assert_eq!(query, "WHERE name = 'O''Brien'");
    }

    #[test]
    fn is_all_per_index() {
        let p = path("prices.equity/ALL/close");
        assert_eq!(expand("{is_all[0]},{is_all[1]}", &p).unwrap(), "'true','false'");
    }

    #[test]
    fn text_without_placeholders_passes_through() {
        let p = path("prices.equity");
        assert_eq!(expand("SELECT 1", &p).unwrap(), "SELECT 1");
    }
}
