// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::types::{PortSet, SharedValue, Value};

/// Static description of a node type, used by the registry and by lane selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NodeMetadata {
    /// Registry key used in graph documents.
    pub type_name: &'static str,
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    /// Runs on the dedicated CPU lane instead of the primary scheduling loop.
    pub cpu_bound: bool,
}

/// The uniform capability every plugin implements.
///
/// The executor owns each instance exclusively for the duration of a run, so `run` takes
/// `&mut self` and nodes keep their runtime state in plain fields.
#[async_trait]
pub trait Node: Send + Sync {
    fn metadata(&self) -> NodeMetadata;

    /// Called once when the node is added to a graph.
    fn ports(&self) -> Result<PortSet, PortError>;

    /// The configuration the node was created with, echoed back when a graph is serialized.
    fn config(&self) -> NodeConfig {
        NodeConfig::default()
    }

    /// Pure check of the configuration. The error is a human readable reason.
    fn validate_config(&self) -> Result<(), String> {
        Ok(())
    }

    /// Replaces the configuration between runs.
    fn reconfigure(&mut self, _config: NodeConfig) -> Result<(), NodeError> {
        Err(NodeError::Config(format!(
            "node type '{}' cannot be reconfigured",
            self.metadata().type_name
        )))
    }

    /// Acquires runtime resources. Must be idempotent.
    async fn initialize(&mut self) -> Result<(), NodeError> {
        Ok(())
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult;

    /// Releases runtime resources. Must be idempotent.
    async fn cleanup(&mut self) -> Result<(), NodeError> {
        Ok(())
    }
}

/// A node type that can be constructed from a graph document.
pub trait NodePlugin: Node + Sized + 'static {
    fn descriptor() -> NodeMetadata;

    fn from_config(config: NodeConfig) -> Result<Self, NodeError>;
}

/// Outcome of one invocation.
///
/// # Examples
/// ```
/// use dagline::traits::NodeResult;
/// use dagline::types::Value;
///
/// let ok = NodeResult::success().with_output("count", Value::Integer(3));
/// assert!(ok.success);
///
/// let failed = NodeResult::failure("boom");
/// assert_eq!(failed.error.as_deref(), Some("boom"));
/// assert!(failed.outputs.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct NodeResult {
    pub success: bool,
    /// Only meaningful when `success` is true.
    pub outputs: HashMap<String, SharedValue>,
    pub error: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Filled by the executor when the node leaves it empty.
    pub duration: Option<Duration>,
    /// The node will not produce anything further; its unit finishes after this result.
    pub end_of_stream: bool,
}

impl NodeResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn end_of_stream() -> Self {
        Self {
            success: true,
            end_of_stream: true,
            ..Default::default()
        }
    }

    pub fn with_output(self, port: &str, value: Value) -> Self {
        self.with_shared_output(port, Arc::new(value))
    }

    /// Forwards an already shared value without copying it.
    pub fn with_shared_output(mut self, port: &str, value: SharedValue) -> Self {
        self.outputs.insert(port.to_string(), value);
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}
