// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::time::Duration;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodePlugin, NodeResult};
use crate::types::{DataType, Image, PortSet, Value};

const METADATA: NodeMetadata = NodeMetadata {
    type_name: "test_pattern",
    name: "Test Pattern",
    version: "1.0.0",
    description: "Synthetic camera: a bright square moving across a flat background",
    cpu_bound: false,
};

#[derive(Debug, Clone, PartialEq)]
struct PatternSettings {
    width: u32,
    height: u32,
    channels: u8,
    background: u8,
    /// Stops after this many frames; unlimited when absent.
    frames: Option<u64>,
    interval: Duration,
}

impl PatternSettings {
    fn parse(config: &NodeConfig) -> Result<Self, String> {
        let frames = match config.get("frames") {
            None => None,
            Some(_) => Some(config.bounded_u64("frames", 1, 1, u64::MAX)?),
        };
        Ok(Self {
            width: config.bounded_u64("width", 64, 1, 8192)? as u32,
            height: config.bounded_u64("height", 48, 1, 8192)? as u32,
            channels: config.bounded_u64("channels", 1, 1, 4)? as u8,
            background: config.bounded_u64("background", 0, 0, 255)? as u8,
            frames,
            interval: Duration::from_millis(config.bounded_u64("interval_ms", 0, 0, 60_000)?),
        })
    }
}

/// Source producing one frame per invocation.
///
/// Config: `width`, `height`, `channels`, `background`, `frames`, `interval_ms`. The optional
/// `frame_index` output carries the zero-based index of each frame.
pub struct TestPattern {
    config: NodeConfig,
    settings: PatternSettings,
    produced: u64,
}

impl TestPattern {
    fn render(&self, index: u64) -> Image {
        let s = &self.settings;
        let mut image = Image::filled(s.width, s.height, s.channels, s.background);
        let side = (s.width.min(s.height) / 4).max(1);
        let travel = s.width.saturating_sub(side).max(1) as u64;
        let left = (index % travel) as u32;
        let top = (s.height - side) / 2;

        let channels = s.channels as usize;
        for y in top..top + side {
            for x in left..(left + side).min(s.width) {
                let offset = (y as usize * s.width as usize + x as usize) * channels;
                image.data[offset..offset + channels].fill(255);
            }
        }
        image
    }
}

#[async_trait]
impl Node for TestPattern {
    fn metadata(&self) -> NodeMetadata {
        METADATA
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.output("image", DataType::Image)?;
        ports.optional_output("frame_index", DataType::Integer)?;
        Ok(ports)
    }

    fn config(&self) -> NodeConfig {
        self.config.clone()
    }

    fn validate_config(&self) -> Result<(), String> {
        PatternSettings::parse(&self.config).map(|_| ())
    }

    fn reconfigure(&mut self, config: NodeConfig) -> Result<(), NodeError> {
        self.settings = PatternSettings::parse(&config).map_err(NodeError::Config)?;
        self.config = config;
        Ok(())
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
        self.produced = 0;
        Ok(())
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult {
        if let Some(limit) = self.settings.frames {
            if self.produced >= limit {
                return NodeResult::end_of_stream();
            }
        }
        if !self.settings.interval.is_zero() {
            tokio::select! {
                _ = ctx.cancelled() => return NodeResult::failure("cancelled"),
                _ = tokio::time::sleep(self.settings.interval) => {}
            }
        }

        let index = self.produced;
        self.produced += 1;
        let mut result = NodeResult::success()
            .with_output("image", Value::Image(self.render(index)))
            .with_output("frame_index", Value::Integer(index as i64));
        result.end_of_stream = self.settings.frames == Some(self.produced);
        result
    }

    async fn cleanup(&mut self) -> Result<(), NodeError> {
        Ok(())
    }
}

impl NodePlugin for TestPattern {
    fn descriptor() -> NodeMetadata {
        METADATA
    }

    fn from_config(config: NodeConfig) -> Result<Self, NodeError> {
        let settings = PatternSettings::parse(&config).map_err(NodeError::Config)?;
        Ok(Self {
            config,
            settings,
            produced: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GlobalContext;
    use crate::events::EventBus;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new("cam", HashMap::new(), GlobalContext::new(), EventBus::new(4))
    }

    #[tokio::test]
    async fn test_frames_limit_ends_the_stream() {
        let config = NodeConfig::from_pairs([
            ("width", json!(16)),
            ("height", json!(8)),
            ("frames", json!(2)),
        ]);
        let mut node = TestPattern::from_config(config).unwrap();
        node.initialize().await.unwrap();

        let first = node.run(ctx()).await;
        assert!(first.success);
        assert!(!first.end_of_stream);
        let image = first.outputs["image"].as_image().unwrap().clone();
        assert_eq!((image.width, image.height, image.channels), (16, 8, 1));
        assert_eq!(image.intensity(0, 3), Some(255));
        assert_eq!(image.intensity(15, 0), Some(0));

        let second = node.run(ctx()).await;
        assert!(second.end_of_stream);
        assert_eq!(*second.outputs["frame_index"], Value::Integer(1));

        let third = node.run(ctx()).await;
        assert!(third.end_of_stream);
        assert!(third.outputs.is_empty());
    }

    #[tokio::test]
    async fn test_square_moves_between_frames() {
        let mut node = TestPattern::from_config(NodeConfig::from_pairs([
            ("width", json!(32)),
            ("height", json!(16)),
        ]))
        .unwrap();
        let a = node.run(ctx()).await.outputs["image"].clone();
        let b = node.run(ctx()).await.outputs["image"].clone();
        assert_ne!(a, b);
    }

    #[test]
    fn test_config_bounds() {
        struct TestCase {
            config: NodeConfig,
            valid: bool,
        }
        let test_cases = vec![
            TestCase { config: NodeConfig::new(), valid: true },
            TestCase { config: NodeConfig::from_pairs([("width", json!(0))]), valid: false },
            TestCase { config: NodeConfig::from_pairs([("channels", json!(5))]), valid: false },
            TestCase { config: NodeConfig::from_pairs([("frames", json!(0))]), valid: false },
            TestCase { config: NodeConfig::from_pairs([("frames", json!("ten"))]), valid: false },
            TestCase { config: NodeConfig::from_pairs([("interval_ms", json!(33))]), valid: true },
        ];
        for case in test_cases {
            assert_eq!(
                TestPattern::from_config(case.config.clone()).is_ok(),
                case.valid,
                "{:?}",
                case.config
            );
        }
    }
}
