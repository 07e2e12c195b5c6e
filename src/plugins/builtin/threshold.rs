// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, Image, PortSet, Value};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "threshold",
    name: "Threshold",
    version: "1.0.0",
    description: "Binarizes an image into a single-channel mask",
    cpu_bound: false,
};

const DEFAULT_LEVEL: u64 = 128;

fn parse_level(config: &NodeConfig) -> Result<u8, String> {
    config
        .bounded_u64("level", DEFAULT_LEVEL, 0, 255)
        .map(|level| level as u8)
}

/// Pixels whose mean intensity is at least `level` become 255, all others 0.
pub(crate) fn binarize(image: &Image, level: u8) -> Image {
    let mut mask = Image::zeros(image.width, image.height, 1);
    for y in 0..image.height {
        for x in 0..image.width {
            if image.intensity(x, y).unwrap_or(0) >= level {
                mask.data[(y * image.width + x) as usize] = 255;
            }
        }
    }
    mask
}

/// Config: `level` (0..=255, default 128). Can be reconfigured between runs.
pub struct Threshold {
    config: NodeConfig,
    level: u8,
}

impl Threshold {
    pub fn level(&self) -> u8 {
        self.level
    }
}

#[async_trait]
impl Node for Threshold {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("image", DataType::Image)?;
        ports.output("mask", DataType::Mask)?;
        Ok(ports)
    }

    fn config(&self) -> NodeConfig {
        self.config.clone()
    }

    fn validate_config(&self) -> Result<(), String> {
        parse_level(&self.config).map(|_| ())
    }

    fn reconfigure(&mut self, config: NodeConfig) -> Result<(), NodeError> {
        self.level = parse_level(&config).map_err(NodeError::Config)?;
        self.config = config;
        Ok(())
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult {
        match ctx.input("image").and_then(|v| v.as_image()) {
            Some(image) => {
                NodeResult::success().with_output("mask", Value::Mask(binarize(image, self.level)))
            }
            None => NodeResult::failure("missing input 'image'"),
        }
    }
}

impl NodePlugin for Threshold {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(config: NodeConfig) -> Result<Self, NodeError> {
        let level = parse_level(&config).map_err(NodeError::Config)?;
        Ok(Self { config, level })
    }
}
