// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, PortSet};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "passthrough",
    name: "Passthrough",
    version: "1.0.0",
    description: "Forwards its input unchanged",
    cpu_bound: false,
};

/// Forwards `input` to `output` without copying.
pub struct Passthrough;

#[async_trait]
impl Node for Passthrough {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("input", DataType::Any)?;
        ports.output("output", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        match ctx.take_input("input") {
            Some(value) => NodeResult::success().with_shared_output("output", value),
            None => NodeResult::failure("missing input 'input'"),
        }
    }
}

impl NodePlugin for Passthrough {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(_config: NodeConfig) -> Result<Self, NodeError> {
        Ok(Self)
    }
}
