//! Per-host knowledge base shared between plugins
//!
//! Plugins that run early record what they learned (the DBMS behind an
//! injection point, a working login) so later plugins can skip redundant
//! work. Accessors never fail: a missing key or a value of the wrong type
//! reads as `None`/`false`.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::http::Uri;

#[derive(Debug, Default)]
pub struct Kb {
    global: RwLock<HashMap<String, Vec<Value>>>,
    by_uri: RwLock<HashMap<String, HashMap<String, Vec<Value>>>>,
}

impl Kb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value under `key`
    pub fn add(&self, key: &str, value: impl Into<Value>) {
        self.global
            .write()
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }

    /// First value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.global.read().get(key).and_then(|v| v.first().cloned())
    }

    /// Every value stored under `key`, in insertion order
    pub fn get_list(&self, key: &str) -> Option<Vec<Value>> {
        self.global.read().get(key).cloned()
    }

    pub fn get_boolean(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Value::Bool(true)))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Append a value that only applies to one resource
    pub fn add_for(&self, uri: &Uri, key: &str, value: impl Into<Value>) {
        self.by_uri
            .write()
            .entry(uri.without_query())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push(value.into());
    }

    pub fn get_for(&self, uri: &Uri, key: &str) -> Option<Value> {
        self.by_uri
            .read()
            .get(&uri.without_query())
            .and_then(|m| m.get(key))
            .and_then(|v| v.first().cloned())
    }

    pub fn get_string_for(&self, uri: &Uri, key: &str) -> Option<String> {
        match self.get_for(uri, key) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn get_boolean_for(&self, uri: &Uri, key: &str) -> bool {
        matches!(self.get_for(uri, key), Some(Value::Bool(true)))
    }

    pub fn clear(&self) {
        self.global.write().clear();
        self.by_uri.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_accessors_never_fail() {
        let kb = Kb::new();
        assert!(kb.get("missing").is_none());
        assert!(kb.get_list("missing").is_none());
        assert!(!kb.get_boolean("missing"));
        assert!(kb.get_string("missing").is_none());

        kb.add("sql/dbms", "MySQL");
        kb.add("flag", true);
        kb.add("count", 3);

        assert_eq!(kb.get_string("sql/dbms").as_deref(), Some("MySQL"));
        assert!(!kb.get_boolean("sql/dbms"));
        assert!(kb.get_boolean("flag"));
        assert!(kb.get_string("count").is_none());
    }

    #[test]
    fn test_values_accumulate_in_order() {
        let kb = Kb::new();
        kb.add("paths", "/a");
        kb.add("paths", "/b");
        assert_eq!(
            kb.get_list("paths").unwrap(),
            vec![Value::from("/a"), Value::from("/b")]
        );
        assert_eq!(kb.get_string("paths").as_deref(), Some("/a"));
    }

    #[test]
    fn test_uri_scoped_values_ignore_query() {
        let kb = Kb::new();
        let uri = Uri::parse("https://example.com/item?id=1").unwrap();
        kb.add_for(&uri, "sql/dbms", "PostgreSQL");

        let other_query = Uri::parse("https://example.com/item?id=2").unwrap();
        assert_eq!(
            kb.get_string_for(&other_query, "sql/dbms").as_deref(),
            Some("PostgreSQL")
        );
        assert!(kb.get_for(&Uri::parse("https://example.com/other").unwrap(), "sql/dbms").is_none());
        assert!(kb.get("sql/dbms").is_none());
    }
}
