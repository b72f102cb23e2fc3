//! Canonical JSON hashing for binding fingerprints.
//!
//! A fingerprint must be stable across key order, whitespace, and
//! serialization quirks: semantically identical contracts have to hash to
//! the same bytes. The canonical form used here sorts object keys
//! lexicographically by byte, emits no insignificant whitespace, and
//! serializes numbers minimally. The fingerprint is the first 16 hex
//! characters of SHA-256 over that canonical text.
//!
//! ## Example
//!
//! ```rust
//! use moniker_catalog::fingerprint::canonical_json;
//! use serde_json::json;
//!
//! let a = canonical_json(&json!({"b": 1, "a": 2}));
//! let b = canonical_json(&json!({"a": 2, "b": 1}));
//! assert_eq!(a, b);
//! assert_eq!(a, r#"{"a":2,"b":1}"#);
//! ```

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::SourceBinding;

/// Length of the hex fingerprint prefix.
pub const FINGERPRINT_LEN: usize = 16;

/// Renders a JSON value in canonical form.
///
/// Object keys are sorted bytewise; arrays keep their order; strings use
/// minimal escaping; numbers use their shortest representation.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// The 16-hex-character fingerprint of a JSON value.
#[must_use]
pub fn fingerprint_value(value: &Value) -> String {
    let canonical = canonical_json(value);
    let digest = Sha256::digest(canonical.as_bytes());
    let mut hex = String::with_capacity(FINGERPRINT_LEN);
    for byte in digest.iter().take(FINGERPRINT_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Fingerprints a source binding's contract fields.
///
/// Covers source type, connection config, allowed operations, declared
/// schema, and the read-only flag; a change to any of them flips the
/// fingerprint, while pure key reordering does not.
#[must_use]
pub fn binding_fingerprint(binding: &SourceBinding) -> String {
    let schema = binding
        .schema
        .as_ref()
        .map(|columns| serde_json::to_value(columns).expect("schema serialization cannot fail"))
        .unwrap_or(Value::Null);
    let operations: Vec<Value> = binding
        .allowed_operations
        .iter()
        .map(|op| Value::String(op.clone()))
        .collect();
    let value = serde_json::json!({
        "source_type": binding.config.source_type().to_string(),
        "config": binding.config.config_value(),
        "allowed_operations": operations,
        "schema": schema,
        "read_only": binding.read_only,
    });
    fingerprint_value(&value)
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // serde_json's map does not guarantee ordering; sort explicitly.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            out.push('{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &serde_json::Number) {
    if let Some(i) = n.as_i64() {
        out.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        out.push_str(&u.to_string());
    } else if let Some(f) = n.as_f64() {
        // Whole floats collapse to their integer form.
        if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
            out.push_str(&(f as i64).to_string());
        } else {
            out.push_str(&f.to_string());
        }
    } else {
        out.push_str(&n.to_string());
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x08' => out.push_str("\\b"),
            '\x0C' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c < '\x20' => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SnowflakeConfig, SourceConfig};
    use serde_json::json;

    fn binding(query: &str, read_only: bool) -> SourceBinding {
        let mut b = SourceBinding::new(SourceConfig::Snowflake(SnowflakeConfig {
            account: Some("acme".into()),
            query: Some(query.into()),
            ..Default::default()
        }));
        b.read_only = read_only;
        b
    }

    #[test]
    fn canonical_sorts_keys() {
        let value = json!({"z": 1, "a": 2, "m": [3, {"y": 0, "x": 1}]});
        assert_eq!(canonical_json(&value), r#"{"a":2,"m":[3,{"x":1,"y":0}],"z":1}"#);
    }

    #[test]
    fn canonical_escapes_strings() {
        assert_eq!(canonical_json(&json!("a\"b\\c\nd")), r#""a\"b\\c\nd""#);
    }

    #[test]
    fn canonical_is_order_insensitive() {
        let a = json!({"b": 1, "a": {"d": 2, "c": 3}});
        let b = json!({"a": {"c": 3, "d": 2}, "b": 1});
        assert_eq!(fingerprint_value(&a), fingerprint_value(&b));
    }

    #[test]
    fn fingerprint_changes_with_any_field() {
        let base = binding("SELECT 1", false);
        assert_ne!(base.fingerprint(), binding("SELECT 2", false).fingerprint());
        assert_ne!(base.fingerprint(), binding("SELECT 1", true).fingerprint());

        let with_op = binding("SELECT 1", false).with_operation("READ");
        assert_ne!(base.fingerprint(), with_op.fingerprint());
    }

    #[test]
    fn fingerprint_ignores_operation_insertion_order() {
        let a = binding("SELECT 1", false)
            .with_operation("READ")
            .with_operation("AGGREGATE");
        let b = binding("SELECT 1", false)
            .with_operation("AGGREGATE")
            .with_operation("READ");
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn fingerprint_is_stable() {
        let a = binding("SELECT 1", false);
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
    }
}
