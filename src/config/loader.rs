// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_CPU_WORKERS, DEFAULT_DRAIN_TIMEOUT_MS, DEFAULT_EVENT_BUFFER, DEFAULT_MAX_RETRIES,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_BACKOFF_MS, DEFAULT_STALL_TIMEOUT_MS,
    MAX_CPU_WORKERS, MAX_QUEUE_CAPACITY,
};
use crate::config::NodeConfig;
use crate::engine::QueuePolicy;
use crate::errors::{ConfigError, ErrorStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A complete graph document.
///
/// # Example
/// ```yaml
/// name: inspection-line
/// error_strategy: skip
/// executor:
///   queue_capacity: 4
/// nodes:
///   - id: cam
///     type: test_pattern
///     config: { width: 64, height: 48, frames: 100 }
///   - id: counter
///     type: frame_counter
/// connections:
///   - { from_node: cam, from_port: image, to_node: counter, to_port: input }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_graph_name")]
    pub name: String,
    #[serde(default = "default_graph_version")]
    pub version: String,
    #[serde(default)]
    pub error_strategy: ErrorStrategy,
    #[serde(default)]
    pub executor: ExecutorOptions,
    /// Seeded into the global context when a run starts.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub globals: BTreeMap<String, serde_json::Value>,
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
}

fn default_graph_name() -> String {
    "unnamed".to_string()
}

fn default_graph_version() -> String {
    "1.0.0".to_string()
}

/// One `nodes` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "NodeConfig::is_empty")]
    pub config: NodeConfig,
    /// Overrides the node type's default lane.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_bound: Option<bool>,
}

/// One `connections` entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionEntry {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<EdgeOptions>,
}

/// Per-edge queue settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeOptions {
    /// Falls back to `executor.queue_capacity`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(default)]
    pub policy: QueuePolicy,
}

/// Executor tuning. Every field is optional and falls back to `config::consts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalate_on_exhausted_retries: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drain_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stall_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_timeout_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_workers: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_buffer: Option<usize>,
}

impl ExecutorOptions {
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms.unwrap_or(DEFAULT_RETRY_BACKOFF_MS))
    }

    pub fn escalate_on_exhausted_retries(&self) -> bool {
        self.escalate_on_exhausted_retries.unwrap_or(false)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms.unwrap_or(DEFAULT_DRAIN_TIMEOUT_MS))
    }

    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms.unwrap_or(DEFAULT_STALL_TIMEOUT_MS))
    }

    pub fn node_timeout(&self) -> Option<Duration> {
        self.node_timeout_ms.map(Duration::from_millis)
    }

    pub fn cpu_workers(&self) -> usize {
        self.cpu_workers.unwrap_or(DEFAULT_CPU_WORKERS)
    }

    pub fn event_buffer(&self) -> usize {
        self.event_buffer.unwrap_or(DEFAULT_EVENT_BUFFER)
    }

    /// Rejects values that would make the executor misbehave rather than clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacity = self.queue_capacity();
        if capacity == 0 || capacity > MAX_QUEUE_CAPACITY {
            return Err(ConfigError::InvalidOption {
                option: "queue_capacity",
                reason: format!("must be within 1..={}, got {}", MAX_QUEUE_CAPACITY, capacity),
            });
        }
        let workers = self.cpu_workers();
        if workers == 0 || workers > MAX_CPU_WORKERS {
            return Err(ConfigError::InvalidOption {
                option: "cpu_workers",
                reason: format!("must be within 1..={}, got {}", MAX_CPU_WORKERS, workers),
            });
        }
        if self.event_buffer() == 0 {
            return Err(ConfigError::InvalidOption {
                option: "event_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.node_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidOption {
                option: "node_timeout_ms",
                reason: "must be greater than zero when set".to_string(),
            });
        }
        Ok(())
    }
}

/// Document encodings, selected by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        match extension.as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            "toml" => Ok(ConfigFormat::Toml),
            _ => Err(ConfigError::UnsupportedFormat { extension }),
        }
    }
}

pub fn parse_graph_config(text: &str, format: ConfigFormat) -> Result<GraphConfig, ConfigError> {
    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(text)?,
        ConfigFormat::Json => serde_json::from_str(text)?,
        ConfigFormat::Toml => toml::from_str(text)?,
    };
    Ok(config)
}

/// Load a graph document from a `.yaml`, `.yml`, `.json` or `.toml` file.
pub fn load_graph_config<P: AsRef<Path>>(path: P) -> Result<GraphConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_graph_config(&text, format)
}
