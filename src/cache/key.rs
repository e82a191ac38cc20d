//! Cache key construction.
//!
//! A key is the first 32 hex characters of the SHA-256 of a canonical JSON
//! rendering of `[operation, {sorted params}]`. Binary fields never enter
//! the rendering; a short content hash stands in for them.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Hex characters kept from the request digest
pub const KEY_LEN: usize = 32;

/// Hex characters kept from a binary field's digest
pub const CONTENT_HASH_LEN: usize = 16;

// == Cache Params ==
/// Named parameters of one cacheable request.
///
/// Stored sorted by name, so insertion order never affects the key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheParams {
    fields: BTreeMap<String, Value>,
}

impl CacheParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Adds a large binary field by content hash only, as `<name>_hash`.
    pub fn with_binary(mut self, name: &str, bytes: &[u8]) -> Self {
        self.fields
            .insert(format!("{}_hash", name), Value::String(content_hash(bytes)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Deterministic JSON text the key is hashed from.
    pub fn canonical(&self, operation: &str) -> String {
        let object: serde_json::Map<String, Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Array(vec![Value::String(operation.to_string()), Value::Object(object)])
            .to_string()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for CacheParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = CacheParams::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

// == Cache Key ==
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derives the key for `operation` over `params`.
    pub fn build(operation: &str, params: &CacheParams) -> Self {
        let digest = Sha256::digest(params.canonical(operation).as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(KEY_LEN);
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short SHA-256 digest of a binary field.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(bytes));
    hex.truncate(CONTENT_HASH_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> CacheParams {
        CacheParams::new()
            .with("prompt", "a lighthouse at dusk")
            .with("quality", "high")
            .with("size", "1024x1024")
            .with("compression", 100)
    }

    #[test]
    fn test_key_shape() {
        let key = CacheKey::build("image_gen", &base());
        assert_eq!(key.as_str().len(), KEY_LEN);
        assert!(key.as_str().bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_is_order_independent() {
        let reversed = CacheParams::new()
            .with("compression", 100)
            .with("size", "1024x1024")
            .with("quality", "high")
            .with("prompt", "a lighthouse at dusk");
        assert_eq!(
            CacheKey::build("image_gen", &base()),
            CacheKey::build("image_gen", &reversed)
        );
    }

    #[test]
    fn test_key_changes_with_any_value() {
        let original = CacheKey::build("image_gen", &base());
        let changed = CacheKey::build("image_gen", &base().with("quality", "low"));
        let numeric = CacheKey::build("image_gen", &base().with("compression", 90));
        assert_ne!(original, changed);
        assert_ne!(original, numeric);
    }

    #[test]
    fn test_key_separates_operations() {
        assert_ne!(
            CacheKey::build("image_gen", &base()),
            CacheKey::build("image_edit", &base())
        );
    }

    #[test]
    fn test_binary_field_replaced_by_hash() {
        let params = base().with_binary("image_data", &[7u8; 4096]);
        assert_eq!(params.get("image_data"), None);
        assert_eq!(
            params.get("image_data_hash"),
            Some(&json!(content_hash(&[7u8; 4096])))
        );
        assert!(params.canonical("image_edit").len() < 512);
    }

    #[test]
    fn test_binary_content_distinguishes_keys() {
        let a = CacheKey::build("image_edit", &base().with_binary("image_data", b"first"));
        let b = CacheKey::build("image_edit", &base().with_binary("image_data", b"second"));
        let a_again = CacheKey::build("image_edit", &base().with_binary("image_data", b"first"));
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_content_hash_length() {
        assert_eq!(content_hash(b"").len(), CONTENT_HASH_LEN);
    }

    #[test]
    fn test_from_iterator() {
        let params: CacheParams = vec![("b", json!(2)), ("a", json!(1))].into_iter().collect();
        assert_eq!(params.canonical("op"), r#"["op",{"a":1,"b":2}]"#);
    }
}
