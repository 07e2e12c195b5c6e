// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::json;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, PortSet};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "frame_counter",
    name: "Frame Counter",
    version: "1.0.0",
    description: "Sink that counts received items into the global context",
    cpu_bound: false,
};

/// Global context key the counter for `node_id` is written under.
pub fn counter_key(node_id: &str) -> String {
    format!("frame_counter.{}", node_id)
}

/// Sink. Every received item increments `frame_counter.<node id>` in the global context.
pub struct FrameCounter {
    seen: u64,
}

impl FrameCounter {
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

#[async_trait]
impl Node for FrameCounter {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("input", DataType::Any)?;
        Ok(ports)
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
        self.seen = 0;
        Ok(())
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult {
        self.seen += 1;
        let total = ctx.globals().update(&counter_key(ctx.node_id()), |current| {
            json!(current.and_then(|v| v.as_u64()).unwrap_or(0) + 1)
        });
        NodeResult::success().with_metadata("count", total)
    }
}

impl NodePlugin for FrameCounter {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(_config: NodeConfig) -> Result<Self, NodeError> {
        Ok(Self { seen: 0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlobalContext;
    use crate::events::EventBus;
    use crate::types::Value;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_counts_into_globals() {
        let globals = GlobalContext::new();
        let mut node = FrameCounter::from_config(NodeConfig::new()).unwrap();
        for _ in 0..3 {
            let inputs = HashMap::from([("input".to_string(), Arc::new(Value::Integer(1)))]);
            let ctx = ExecutionContext::new("sink", inputs, globals.clone(), EventBus::new(4));
            assert!(node.run(ctx).await.success);
        }
        assert_eq!(node.seen(), 3);
        assert_eq!(globals.get("frame_counter.sink"), Some(json!(3)));
    }
}
