// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, PortSet};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "invert",
    name: "Invert",
    version: "1.0.0",
    description: "Inverts every pixel in place",
    cpu_bound: false,
};

/// Edits the received image in place. When the frame is shared with another branch the copy
/// manager has already handed this node its own copy, so `Arc::make_mut` does not clone again.
/// The exception is an attempt that may still be retried: the executor keeps that input set, and
/// the edit lands on a private copy.
pub struct Invert;

#[async_trait]
impl Node for Invert {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("image", DataType::Image)?;
        ports.output("image", DataType::Image)?;
        Ok(ports)
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        let Some(mut frame) = ctx.take_input("image") else {
            return NodeResult::failure("missing input 'image'");
        };
        match Arc::make_mut(&mut frame).as_image_mut() {
            Some(image) => image.data.iter_mut().for_each(|b| *b = 255 - *b),
            None => {
                return NodeResult::failure(format!("expected an image, got {}", frame.data_type()))
            }
        }
        NodeResult::success().with_shared_output("image", frame)
    }
}

impl NodePlugin for Invert {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(_config: NodeConfig) -> Result<Self, NodeError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlobalContext;
    use crate::events::EventBus;
    use crate::types::{Image, Value};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_inverts_without_touching_other_holders() {
        let original = Arc::new(Value::Image(Image::filled(2, 2, 1, 10)));
        let inputs = HashMap::from([("image".to_string(), Arc::clone(&original))]);
        let ctx = ExecutionContext::new("inv", inputs, GlobalContext::new(), EventBus::new(4));

        let result = Invert.run(ctx).await;
        let inverted = result.outputs["image"].as_image().unwrap();
        assert!(inverted.data.iter().all(|b| *b == 245));
        assert!(original.as_image().unwrap().data.iter().all(|b| *b == 10));
    }

    #[tokio::test]
    async fn test_sole_owner_is_edited_in_place() {
        let frame = Arc::new(Value::Image(Image::zeros(3, 1, 1)));
        let address = Arc::as_ptr(&frame);
        let inputs = HashMap::from([("image".to_string(), frame)]);
        let ctx = ExecutionContext::new("inv", inputs, GlobalContext::new(), EventBus::new(4));

        let result = Invert.run(ctx).await;
        assert_eq!(Arc::as_ptr(&result.outputs["image"]), address);
    }
}
