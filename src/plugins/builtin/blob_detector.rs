// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::plugins::builtin::threshold::binarize;
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, Detection, Image, PortSet, Region, Value};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "blob_detector",
    name: "Blob Detector",
    version: "1.0.0",
    description: "Finds bright connected regions and reports their bounding boxes",
    cpu_bound: true,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct BlobSettings {
    level: u8,
    min_area: u64,
}

impl BlobSettings {
    fn parse(config: &NodeConfig) -> Result<Self, String> {
        Ok(Self {
            level: config.bounded_u64("level", 128, 0, 255)? as u8,
            min_area: config.bounded_u64("min_area", 4, 1, u32::MAX as u64)?,
        })
    }
}

/// Labels 4-connected foreground regions of a binary mask.
fn find_blobs(mask: &Image, min_area: u64) -> Result<Vec<Detection>, String> {
    let (width, height) = (mask.width as usize, mask.height as usize);
    if mask.data.len() < width * height {
        return Err(format!(
            "mask is {}x{} but holds only {} bytes",
            width,
            height,
            mask.data.len()
        ));
    }
    let mut visited = vec![false; width * height];
    let mut detections = Vec::new();
    let mut frontier = VecDeque::new();

    for start in 0..width * height {
        if visited[start] || mask.data[start] == 0 {
            continue;
        }
        visited[start] = true;
        frontier.push_back(start);

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (width, height, 0, 0);
        let mut area = 0u64;
        while let Some(index) = frontier.pop_front() {
            let (x, y) = (index % width, index / width);
            area += 1;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);

            let mut visit = |neighbour: usize| {
                if !visited[neighbour] && mask.data[neighbour] != 0 {
                    visited[neighbour] = true;
                    frontier.push_back(neighbour);
                }
            };
            if x > 0 {
                visit(index - 1);
            }
            if x + 1 < width {
                visit(index + 1);
            }
            if y > 0 {
                visit(index - width);
            }
            if y + 1 < height {
                visit(index + width);
            }
        }

        if area < min_area {
            continue;
        }
        let bbox = Region {
            x: min_x as u32,
            y: min_y as u32,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        };
        let fill = area as f32 / (bbox.width as f32 * bbox.height as f32);
        detections.push(Detection {
            class_id: 0,
            label: "blob".to_string(),
            confidence: fill,
            bbox,
        });
    }
    Ok(detections)
}

/// CPU-heavy detector. Config: `level` (0..=255, default 128), `min_area` (pixels, default 4).
pub struct BlobDetector {
    config: NodeConfig,
    settings: BlobSettings,
}

#[async_trait]
impl Node for BlobDetector {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("image", DataType::Image)?;
        ports.output("detections", DataType::DetectionList)?;
        ports.optional_output("count", DataType::Integer)?;
        Ok(ports)
    }

    fn config(&self) -> NodeConfig {
        self.config.clone()
    }

    fn validate_config(&self) -> Result<(), String> {
        BlobSettings::parse(&self.config).map(|_| ())
    }

    fn reconfigure(&mut self, config: NodeConfig) -> Result<(), NodeError> {
        self.settings = BlobSettings::parse(&config).map_err(NodeError::Config)?;
        self.config = config;
        Ok(())
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult {
        let Some(frame) = ctx.input("image") else {
            return NodeResult::failure("missing input 'image'");
        };
        let detections = match frame.as_ref() {
            Value::Mask(mask) if mask.channels == 1 => find_blobs(mask, self.settings.min_area),
            Value::Image(image) | Value::Mask(image) => find_blobs(
                &binarize(image, self.settings.level),
                self.settings.min_area,
            ),
            other => {
                return NodeResult::failure(format!("expected an image, got {}", other.data_type()))
            }
        };
        let detections = match detections {
            Ok(detections) => detections,
            Err(reason) => return NodeResult::failure(reason),
        };
        let count = detections.len() as i64;
        NodeResult::success()
            .with_output("detections", Value::DetectionList(detections))
            .with_output("count", Value::Integer(count))
    }
}

impl NodePlugin for BlobDetector {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(config: NodeConfig) -> Result<Self, NodeError> {
        let settings = BlobSettings::parse(&config).map_err(NodeError::Config)?;
        Ok(Self { config, settings })
    }
}
