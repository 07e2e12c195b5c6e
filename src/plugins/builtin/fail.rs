// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, PortSet};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "fail",
    name: "Fail",
    version: "1.0.0",
    description: "Fails every invocation; for exercising error strategies",
    cpu_bound: false,
};

const DEFAULT_MESSAGE: &str = "configured to fail";

/// Fails every invocation with `message`. The `input` port is optional so the node works as a
/// source or as a sink.
pub struct FailNode {
    config: NodeConfig,
}

#[async_trait]
impl Node for FailNode {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.optional_input("input", DataType::Any)?;
        ports.optional_output("output", DataType::Any)?;
        Ok(ports)
    }

    fn config(&self) -> NodeConfig {
        self.config.clone()
    }

    fn validate_config(&self) -> Result<(), String> {
        match self.config.get("message") {
            Some(value) if !value.is_string() => Err(format!("'message' must be a string, got {}", value)),
            _ => Ok(()),
        }
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        NodeResult::failure(self.config.get_str("message").unwrap_or(DEFAULT_MESSAGE))
    }
}

impl NodePlugin for FailNode {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(config: NodeConfig) -> Result<Self, NodeError> {
        Ok(Self { config })
    }
}
