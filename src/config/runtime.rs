// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::path::Path;

use crate::config::{load_graph_config, GraphConfig};
use crate::engine::StreamingExecutor;
use crate::errors::ConfigError;
use crate::graph::Graph;
use crate::observability::messages::graph::{GraphDocumentLoaded, GraphValidationFailed};
use crate::observability::messages::StructuredLog;
use crate::plugins::NodeRegistry;

/// Turns a graph document into a ready-to-start executor.
///
/// The `RuntimeBuilder` checks the executor options, instantiates every node through the
/// registry, validates the resulting graph and hands back a `StreamingExecutor` configured with
/// the document's error strategy and globals. Every build problem in the document is reported
/// at once.
///
/// # Examples
///
/// ```
/// use dagline::config::{parse_graph_config, ConfigFormat, RuntimeBuilder};
/// use dagline::engine::ExecutorState;
/// use dagline::plugins::NodeRegistry;
///
/// let yaml = r#"
/// name: demo
/// nodes:
///   - id: cam
///     type: test_pattern
///     config: { frames: 3 }
///   - id: count
///     type: frame_counter
/// connections:
///   - { from_node: cam, from_port: image, to_node: count, to_port: input }
/// "#;
/// let config = parse_graph_config(yaml, ConfigFormat::Yaml).unwrap();
/// let executor = RuntimeBuilder::from_config(&config, &NodeRegistry::with_builtins()).unwrap();
///
/// assert_eq!(executor.graph_name(), "demo");
/// assert_eq!(executor.state(), ExecutorState::Idle);
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build an executor from an already parsed document.
    pub fn from_config(
        cfg: &GraphConfig,
        registry: &NodeRegistry,
    ) -> Result<StreamingExecutor, ConfigError> {
        cfg.executor.validate()?;
        let graph = Graph::from_config(cfg, registry).map_err(|errors| {
            GraphValidationFailed {
                graph: &cfg.name,
                errors: &errors,
            }
            .log();
            ConfigError::from(errors)
        })?;
        graph.validate()?;

        Ok(
            StreamingExecutor::new(graph, cfg.error_strategy, cfg.executor.clone())
                .with_globals(cfg.globals.clone()),
        )
    }

    /// Load a `.yaml`, `.yml`, `.json` or `.toml` document and build an executor from it.
    pub fn load_and_build<P: AsRef<Path>>(
        path: P,
        registry: &NodeRegistry,
    ) -> Result<StreamingExecutor, ConfigError> {
        let path = path.as_ref();
        let cfg = load_graph_config(path)?;
        GraphDocumentLoaded {
            path: &path.display().to_string(),
            graph: &cfg.name,
            node_count: cfg.nodes.len(),
            connection_count: cfg.connections.len(),
        }
        .log();
        Self::from_config(&cfg, registry)
    }
}
