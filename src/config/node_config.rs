// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Newtype wrapper for a node's option map.
///
/// Values are JSON so that YAML, JSON and TOML documents all land in the same shape. The map is
/// ordered, which keeps re-serialized documents stable.
///
/// # Examples
/// ```
/// use dagline::config::NodeConfig;
/// use serde_json::json;
///
/// let config = NodeConfig::from_pairs([("width", json!(64)), ("label", json!("part"))]);
/// assert_eq!(config.get_u64("width"), Some(64));
/// assert_eq!(config.get_str("label"), Some("part"));
/// assert_eq!(config.get_u64("height"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeConfig(pub BTreeMap<String, serde_json::Value>);

impl NodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        Self(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.0.insert(key.into(), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(serde_json::Value::as_u64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(serde_json::Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(serde_json::Value::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(serde_json::Value::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(serde_json::Value::as_str)
    }

    /// Reads an unsigned option that must fit `[min, max]`. Absent keys yield `default`.
    pub fn bounded_u64(&self, key: &str, default: u64, min: u64, max: u64) -> Result<u64, String> {
        match self.0.get(key) {
            None => Ok(default),
            Some(value) => match value.as_u64() {
                Some(n) if (min..=max).contains(&n) => Ok(n),
                Some(n) => Err(format!("'{}' must be within {}..={}, got {}", key, min, max, n)),
                None => Err(format!("'{}' must be an unsigned integer, got {}", key, value)),
            },
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, serde_json::Value>> for NodeConfig {
    fn from(map: BTreeMap<String, serde_json::Value>) -> Self {
        Self(map)
    }
}

impl From<NodeConfig> for BTreeMap<String, serde_json::Value> {
    fn from(config: NodeConfig) -> Self {
        config.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bounded_u64() {
        let config = NodeConfig::from_pairs([("level", json!(300)), ("name", json!("x"))]);
        assert_eq!(config.bounded_u64("missing", 7, 0, 10), Ok(7));
        assert!(config.bounded_u64("level", 0, 0, 255).unwrap_err().contains("0..=255"));
        assert!(config.bounded_u64("name", 0, 0, 255).unwrap_err().contains("unsigned"));
    }

    #[test]
    fn test_yaml_and_toml_land_in_same_shape() {
        let from_yaml: NodeConfig = serde_yaml::from_str("width: 10\nlabel: cam\n").unwrap();
        let from_toml: NodeConfig = toml::from_str("width = 10\nlabel = \"cam\"\n").unwrap();
        assert_eq!(from_yaml, from_toml);
    }
}
