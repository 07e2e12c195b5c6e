// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::NodeConfig;
use crate::errors::{BuildError, NodeError};
use crate::observability::messages::graph::NodeTypeRegistered;
use crate::observability::messages::StructuredLog;
use crate::plugins::builtin::{
    BlobDetector, FailNode, FrameCounter, Invert, Passthrough, TestPattern, Threshold,
};
use crate::traits::{Node, NodeMetadata, NodePlugin};

/// Builds a node instance from its configuration.
pub type NodeFactory = Arc<dyn Fn(NodeConfig) -> Result<Box<dyn Node>, NodeError> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    metadata: NodeMetadata,
    factory: NodeFactory,
}

/// Maps type names used in graph documents to node factories.
///
/// # Examples
/// ```
/// use dagline::config::NodeConfig;
/// use dagline::plugins::NodeRegistry;
///
/// let registry = NodeRegistry::with_builtins();
/// assert!(registry.contains("threshold"));
///
/// let node = registry.create("bin", "threshold", NodeConfig::new()).unwrap();
/// assert_eq!(node.metadata().type_name, "threshold");
///
/// assert!(registry.create("x", "no_such_type", NodeConfig::new()).is_err());
/// ```
#[derive(Clone, Default)]
pub struct NodeRegistry {
    types: BTreeMap<String, Registration>,
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every node type shipped with dagline.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        // Names are distinct, so none of these can collide.
        let _ = registry.register_plugin::<TestPattern>();
        let _ = registry.register_plugin::<Passthrough>();
        let _ = registry.register_plugin::<Invert>();
        let _ = registry.register_plugin::<Threshold>();
        let _ = registry.register_plugin::<BlobDetector>();
        let _ = registry.register_plugin::<FrameCounter>();
        let _ = registry.register_plugin::<FailNode>();
        registry
    }

    pub fn register_plugin<P: NodePlugin>(&mut self) -> Result<(), BuildError> {
        self.register(
            P::descriptor(),
            Arc::new(|config| P::from_config(config).map(|node| Box::new(node) as Box<dyn Node>)),
        )
    }

    pub fn register(&mut self, metadata: NodeMetadata, factory: NodeFactory) -> Result<(), BuildError> {
        if self.types.contains_key(metadata.type_name) {
            return Err(BuildError::DuplicateType {
                type_name: metadata.type_name.to_string(),
            });
        }
        NodeTypeRegistered {
            type_name: metadata.type_name,
            version: metadata.version,
            cpu_bound: metadata.cpu_bound,
        }
        .log();
        self.types
            .insert(metadata.type_name.to_string(), Registration { metadata, factory });
        Ok(())
    }

    /// Instantiates `type_name` for the node `node_id`.
    pub fn create(
        &self,
        node_id: &str,
        type_name: &str,
        config: NodeConfig,
    ) -> Result<Box<dyn Node>, BuildError> {
        let registration = self
            .types
            .get(type_name)
            .ok_or_else(|| BuildError::UnregisteredType {
                node_id: node_id.to_string(),
                type_name: type_name.to_string(),
            })?;
        (registration.factory)(config).map_err(|e| BuildError::InvalidConfig {
            node_id: node_id.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn metadata(&self, type_name: &str) -> Option<NodeMetadata> {
        self.types.get(type_name).map(|r| r.metadata)
    }

    /// Every registered type, ordered by name.
    pub fn list_available_types(&self) -> Vec<NodeMetadata> {
        self.types.values().map(|r| r.metadata).collect()
    }
}
