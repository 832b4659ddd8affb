//! Hierarchical key/value configuration store
//!
//! Plugin tunables persist under dotted keys such as
//! `plugins.p40012.level`. A store handle is cheap to clone and every clone
//! sees the same entries; `deep_clone` detaches a copy.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Thread-safe dotted-key configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    pub fn clear(&self, key: &str) {
        self.entries.write().remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// All entries under `prefix.` (prefix included in the returned keys)
    pub fn subset(&self, prefix: &str) -> Vec<(String, String)> {
        let dotted = format!("{}.", prefix);
        self.entries
            .read()
            .range(dotted.clone()..)
            .take_while(|(k, _)| k.starts_with(&dotted))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// True when both handles point at the same entries
    pub fn same_store(&self, other: &ConfigStore) -> bool {
        Arc::ptr_eq(&self.entries, &other.entries)
    }

    /// Independent copy of the current entries
    pub fn deep_clone(&self) -> Self {
        Self {
            entries: Arc::new(RwLock::new(self.entries.read().clone())),
        }
    }

    /// Flatten a TOML table into dotted keys below `prefix`
    pub fn from_toml(prefix: &str, table: &toml::Table) -> Self {
        let store = Self::new();
        store.merge_toml(prefix, table);
        store
    }

    pub fn merge_toml(&self, prefix: &str, table: &toml::Table) {
        let mut entries = self.entries.write();
        flatten_into(&mut entries, prefix, table);
    }

    /// Rebuild the nested TOML table for everything below `prefix`
    pub fn to_toml(&self, prefix: &str) -> toml::Table {
        let mut root = toml::Table::new();
        let strip = format!("{}.", prefix);
        for (key, value) in self.subset(prefix) {
            let relative = key.strip_prefix(&strip).unwrap_or(&key);
            let parts: Vec<&str> = relative.split('.').collect();
            let value = match value.as_str() {
                "true" => toml::Value::Boolean(true),
                "false" => toml::Value::Boolean(false),
                _ => toml::Value::String(value),
            };
            insert_nested(&mut root, &parts, value);
        }
        root
    }
}

fn insert_nested(table: &mut toml::Table, path: &[&str], value: toml::Value) {
    match path {
        [] => {}
        [leaf] => {
            table.insert(leaf.to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = table
                .entry(head.to_string())
                .or_insert_with(|| toml::Value::Table(toml::Table::new()));
            if let toml::Value::Table(inner) = entry {
                insert_nested(inner, rest, value);
            }
        }
    }
}

fn flatten_into(entries: &mut BTreeMap<String, String>, prefix: &str, table: &toml::Table) {
    for (key, value) in table {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(inner) => flatten_into(entries, &full, inner),
            toml::Value::String(s) => {
                entries.insert(full, s.clone());
            }
            other => {
                entries.insert(full, other.to_string());
            }
        }
    }
}
