//! Content-addressed cache keys.
//!
//! A key is the SHA-256 of the operation identity and the canonical JSON of
//! the parameters. Object keys are sorted recursively before hashing, so two
//! parameter sets that differ only in key order share a fingerprint. The
//! hash is stable across processes, which lets the key address a shared
//! store as well as the in-memory one.

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Fingerprint of `(operation, params)`. Lowercase hex SHA-256.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the cache key for an operation and its parameters.
///
/// Pure and deterministic. Collisions are treated as hits; with a 256-bit
/// hash that risk is accepted.
pub fn fingerprint(operation: &str, params: &Value) -> CacheKey {
    let mut canonical = String::new();
    write_canonical(params, &mut canonical);

    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.as_bytes());
    CacheKey(hex::encode(hasher.finalize()))
}

/// Serialize `value` as compact JSON with object keys in sorted order.
///
/// Does not rely on the map ordering of `serde_json::Map`, which changes
/// when the `preserve_order` feature is enabled anywhere in the build.
pub(crate) fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(k.clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_deterministic() {
        let p = json!({"url": "https://example.com", "limit": 10});
        assert_eq!(fingerprint("scrape", &p), fingerprint("scrape", &p));
    }

    #[test]
    fn fingerprint_ignores_key_order() {
        let a: Value =
            serde_json::from_str(r#"{"a":1,"b":{"y":[1,2],"x":"s"},"c":null}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{"c":null,"b":{"x":"s","y":[1,2]},"a":1}"#).unwrap();
        assert_eq!(fingerprint("op", &a), fingerprint("op", &b));
    }

    #[test]
    fn fingerprint_differs_on_operation() {
        let p = json!({"q": "rust"});
        assert_ne!(fingerprint("search", &p), fingerprint("profile", &p));
    }

    #[test]
    fn fingerprint_differs_on_params() {
        assert_ne!(
            fingerprint("op", &json!({"q": "rust"})),
            fingerprint("op", &json!({"q": "go"}))
        );
    }

    #[test]
    fn array_order_matters() {
        assert_ne!(
            fingerprint("op", &json!({"ids": [1, 2]})),
            fingerprint("op", &json!({"ids": [2, 1]}))
        );
    }

    #[test]
    fn operation_and_params_do_not_bleed() {
        assert_ne!(
            fingerprint("ab", &json!("c")),
            fingerprint("a", &json!("bc"))
        );
    }

    #[test]
    fn key_is_hex_sha256() {
        let key = fingerprint("op", &json!({}));
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn canonical_form_sorts_nested_keys() {
        let mut out = String::new();
        write_canonical(&json!({"b": {"d": 1, "c": 2}, "a": [true, "x"]}), &mut out);
        assert_eq!(out, r#"{"a":[true,"x"],"b":{"c":2,"d":1}}"#);
    }
}
