// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Keyed store shared by every node of a run.
///
/// There is no ordering between writers: readers get an eventually-consistent snapshot. Use
/// [`GlobalContext::update`] for read-modify-write cycles such as counters.
///
/// # Examples
/// ```
/// use dagline::context::GlobalContext;
/// use serde_json::json;
///
/// let globals = GlobalContext::new();
/// globals.set("line", json!("A3"));
/// globals.update("frames", |old| json!(old.and_then(|v| v.as_u64()).unwrap_or(0) + 1));
/// assert_eq!(globals.get("frames"), Some(json!(1)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct GlobalContext {
    entries: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl GlobalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Returns the previous value, if any.
    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) -> Option<serde_json::Value> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Atomically replaces the value under `key` with `f(old)` and returns the new value.
    pub fn update<F>(&self, key: &str, f: F) -> serde_json::Value
    where
        F: FnOnce(Option<&serde_json::Value>) -> serde_json::Value,
    {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let next = f(entries.get(key));
        entries.insert(key.to_string(), next.clone());
        next
    }

    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
