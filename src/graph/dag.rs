// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use crate::config::{
    ConnectionEntry, EdgeOptions, ExecutorOptions, GraphConfig, NodeConfig, NodeEntry,
};
use crate::errors::{BuildError, ErrorStrategy};
use crate::graph::validation::{topological_order, validate_topology};
use crate::graph::{Connection, NodeDescriptor, Topology};
use crate::observability::messages::graph::{
    ConfigRestoreFailed, GraphValidated, GraphValidationFailed,
};
use crate::observability::messages::StructuredLog;
use crate::plugins::NodeRegistry;
use crate::traits::Node;
use crate::types::{check_connection, PortDirection};

/// Nodes plus connections: the static blueprint handed to the executor.
///
/// Topology is fixed once built. Between runs only node configuration may change, through
/// [`Graph::reconfigure`].
///
/// # Examples
/// ```
/// use dagline::config::NodeConfig;
/// use dagline::graph::Graph;
/// use dagline::plugins::NodeRegistry;
///
/// let registry = NodeRegistry::with_builtins();
/// let mut graph = Graph::new("demo");
/// graph.add_node("cam", registry.create("cam", "test_pattern", NodeConfig::new()).unwrap()).unwrap();
/// graph.add_node("inv", registry.create("inv", "invert", NodeConfig::new()).unwrap()).unwrap();
/// graph.add_connection("cam", "image", "inv", "image").unwrap();
///
/// assert!(graph.validate().is_ok());
/// assert_eq!(graph.topological_order().unwrap(), vec!["cam", "inv"]);
/// ```
pub struct Graph {
    name: String,
    version: String,
    topology: Topology,
    instances: BTreeMap<String, Box<dyn Node>>,
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("name", &self.name)
            .field("node_ids", &self.topology.node_ids().collect::<Vec<_>>())
            .field("connection_count", &self.topology.connections().len())
            .finish()
    }
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: "1.0.0".to_string(),
            topology: Topology::default(),
            instances: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn len(&self) -> usize {
        self.topology.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topology.is_empty()
    }

    /// Adds a node, reading its ports and checking its configuration once.
    pub fn add_node(&mut self, id: impl Into<String>, node: Box<dyn Node>) -> Result<(), BuildError> {
        let id = id.into();
        if self.topology.nodes.contains_key(&id) {
            return Err(BuildError::DuplicateId { node_id: id });
        }

        let ports = node
            .ports()
            .map_err(|e| BuildError::from_port_error(&id, e))?;
        node.validate_config()
            .map_err(|reason| BuildError::InvalidConfig {
                node_id: id.clone(),
                reason,
            })?;

        let metadata = node.metadata();
        let descriptor = NodeDescriptor {
            id: id.clone(),
            metadata,
            ports,
            config: node.config(),
            cpu_bound: metadata.cpu_bound,
        };
        self.topology.nodes.insert(id.clone(), descriptor);
        self.instances.insert(id, node);
        Ok(())
    }

    pub fn add_connection(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
    ) -> Result<(), BuildError> {
        self.add_connection_with(from_node, from_port, to_node, to_port, EdgeOptions::default())
    }

    /// Adds a connection with explicit queue settings.
    pub fn add_connection_with(
        &mut self,
        from_node: &str,
        from_port: &str,
        to_node: &str,
        to_port: &str,
        options: EdgeOptions,
    ) -> Result<(), BuildError> {
        let source = self
            .topology
            .node(from_node)
            .ok_or_else(|| BuildError::UnknownNode {
                node_id: from_node.to_string(),
            })?;
        let dest = self
            .topology
            .node(to_node)
            .ok_or_else(|| BuildError::UnknownNode {
                node_id: to_node.to_string(),
            })?;

        let source_port =
            source
                .ports
                .get_output(from_port)
                .ok_or_else(|| BuildError::UnknownPort {
                    node_id: from_node.to_string(),
                    port: from_port.to_string(),
                    direction: PortDirection::Output,
                })?;
        let dest_port = dest
            .ports
            .get_input(to_port)
            .ok_or_else(|| BuildError::UnknownPort {
                node_id: to_node.to_string(),
                port: to_port.to_string(),
                direction: PortDirection::Input,
            })?;

        if !check_connection(source_port, dest_port).is_compatible() {
            return Err(BuildError::TypeMismatch {
                from_node: from_node.to_string(),
                from_port: from_port.to_string(),
                from_type: source_port.data_type,
                to_node: to_node.to_string(),
                to_port: to_port.to_string(),
                to_type: dest_port.data_type,
            });
        }

        if let Some(existing) = self.topology.binding(to_node, to_port) {
            return Err(BuildError::PortAlreadyBound {
                node_id: to_node.to_string(),
                port: to_port.to_string(),
                bound_from: format!("{}.{}", existing.from_node, existing.from_port),
            });
        }

        self.topology.connections.push(Connection {
            from_node: from_node.to_string(),
            from_port: from_port.to_string(),
            to_node: to_node.to_string(),
            to_port: to_port.to_string(),
            options,
        });
        Ok(())
    }

    /// Cycle detection plus required-port binding. Reports every problem found.
    pub fn validate(&self) -> Result<(), Vec<BuildError>> {
        match validate_topology(&self.topology) {
            Ok(()) => {
                GraphValidated {
                    graph: &self.name,
                    node_count: self.topology.len(),
                    connection_count: self.topology.connections().len(),
                }
                .log();
                Ok(())
            }
            Err(errors) => {
                GraphValidationFailed {
                    graph: &self.name,
                    errors: &errors,
                }
                .log();
                Err(errors)
            }
        }
    }

    /// Worker start order. Fails on a cycle.
    pub fn topological_order(&self) -> Result<Vec<String>, BuildError> {
        topological_order(&self.topology)
    }

    /// Moves a node between the primary loop and the CPU lane.
    pub fn set_cpu_bound(&mut self, id: &str, cpu_bound: bool) -> Result<(), BuildError> {
        let descriptor = self
            .topology
            .nodes
            .get_mut(id)
            .ok_or_else(|| BuildError::UnknownNode {
                node_id: id.to_string(),
            })?;
        descriptor.cpu_bound = cpu_bound;
        Ok(())
    }

    /// Replaces a node's configuration between runs. Ports and connections are unchanged.
    pub fn reconfigure(&mut self, id: &str, config: NodeConfig) -> Result<(), BuildError> {
        let node = self
            .instances
            .get_mut(id)
            .ok_or_else(|| BuildError::UnknownNode {
                node_id: id.to_string(),
            })?;
        let previous = node.config();

        node.reconfigure(config)
            .map_err(|e| BuildError::InvalidConfig {
                node_id: id.to_string(),
                reason: e.to_string(),
            })?;
        if let Err(mut reason) = node.validate_config() {
            // Put the last accepted configuration back so the graph stays runnable.
            if let Err(e) = node.reconfigure(previous) {
                let error = e.to_string();
                ConfigRestoreFailed {
                    node_id: id,
                    error: &error,
                }
                .log();
                reason = format!("{}; previous configuration not restored: {}", reason, error);
            }
            return Err(BuildError::InvalidConfig {
                node_id: id.to_string(),
                reason,
            });
        }

        if let Some(descriptor) = self.topology.nodes.get_mut(id) {
            descriptor.config = node.config();
        }
        Ok(())
    }

    /// Builds a graph from a document, accumulating every error instead of stopping at the first.
    pub fn from_config(cfg: &GraphConfig, registry: &NodeRegistry) -> Result<Graph, Vec<BuildError>> {
        let mut graph = Graph::new(cfg.name.clone()).with_version(cfg.version.clone());
        let mut errors = Vec::new();

        for entry in &cfg.nodes {
            let added = registry
                .create(&entry.id, &entry.type_name, entry.config.clone())
                .and_then(|node| graph.add_node(entry.id.clone(), node));
            match added {
                Ok(()) => {
                    if let Some(cpu_bound) = entry.cpu_bound {
                        if let Err(e) = graph.set_cpu_bound(&entry.id, cpu_bound) {
                            errors.push(e);
                        }
                    }
                }
                Err(e) => errors.push(e),
            }
        }

        for entry in &cfg.connections {
            // Endpoints of a rejected node were already reported once.
            let endpoint_failed = |id: &str| !graph.topology.nodes.contains_key(id)
                && cfg.nodes.iter().any(|n| n.id == id);
            if endpoint_failed(&entry.from_node) || endpoint_failed(&entry.to_node) {
                continue;
            }
            if let Err(e) = graph.add_connection_with(
                &entry.from_node,
                &entry.from_port,
                &entry.to_node,
                &entry.to_port,
                entry.queue.unwrap_or_default(),
            ) {
                errors.push(e);
            }
        }

        if errors.is_empty() {
            Ok(graph)
        } else {
            Err(errors)
        }
    }

    /// Serializes the topology and node configurations back into a document.
    pub fn to_config(&self) -> GraphConfig {
        let nodes = self
            .topology
            .nodes()
            .map(|d| NodeEntry {
                id: d.id.clone(),
                type_name: d.metadata.type_name.to_string(),
                config: d.config.clone(),
                cpu_bound: (d.cpu_bound != d.metadata.cpu_bound).then_some(d.cpu_bound),
            })
            .collect();
        let connections = self
            .topology
            .connections()
            .iter()
            .map(|c| ConnectionEntry {
                from_node: c.from_node.clone(),
                from_port: c.from_port.clone(),
                to_node: c.to_node.clone(),
                to_port: c.to_port.clone(),
                queue: (c.options != EdgeOptions::default()).then_some(c.options),
            })
            .collect();

        GraphConfig {
            name: self.name.clone(),
            version: self.version.clone(),
            error_strategy: ErrorStrategy::default(),
            executor: ExecutorOptions::default(),
            globals: BTreeMap::new(),
            nodes,
            connections,
        }
    }

    pub(crate) fn into_parts(self) -> (GraphHeader, Topology, BTreeMap<String, Box<dyn Node>>) {
        (
            GraphHeader {
                name: self.name,
                version: self.version,
            },
            self.topology,
            self.instances,
        )
    }

    pub(crate) fn from_parts(
        header: GraphHeader,
        topology: Topology,
        instances: BTreeMap<String, Box<dyn Node>>,
    ) -> Self {
        Self {
            name: header.name,
            version: header.version,
            topology,
            instances,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct GraphHeader {
    pub name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::stub::{RecordingSink, ReconfigureOnce, StubNode};
    use crate::types::DataType;
    use serde_json::json;

    fn image_chain() -> Graph {
        let mut graph = Graph::new("chain");
        graph.add_node("cam", Box::new(StubNode::source(DataType::Image))).unwrap();
        graph.add_node("det", Box::new(StubNode::transform(DataType::Image))).unwrap();
        graph
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let mut graph = image_chain();
        let err = graph
            .add_node("cam", Box::new(StubNode::source(DataType::Image)))
            .unwrap_err();
        assert_eq!(err, BuildError::DuplicateId { node_id: "cam".into() });
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_add_connection_failures() {
        let mut graph = image_chain();
        graph.add_node("sum", Box::new(StubNode::transform(DataType::Number))).unwrap();

        assert!(matches!(
            graph.add_connection("ghost", "out", "det", "in"),
            Err(BuildError::UnknownNode { node_id }) if node_id == "ghost"
        ));
        assert!(matches!(
            graph.add_connection("cam", "nope", "det", "in"),
            Err(BuildError::UnknownPort { direction: PortDirection::Output, .. })
        ));
        assert!(matches!(
            graph.add_connection("cam", "out", "det", "nope"),
            Err(BuildError::UnknownPort { direction: PortDirection::Input, .. })
        ));
        assert_eq!(
            graph.add_connection("cam", "out", "sum", "in"),
            Err(BuildError::TypeMismatch {
                from_node: "cam".into(),
                from_port: "out".into(),
                from_type: DataType::Image,
                to_node: "sum".into(),
                to_port: "in".into(),
                to_type: DataType::Number,
            })
        );

        graph.add_connection("cam", "out", "det", "in").unwrap();
        assert!(matches!(
            graph.add_connection("det", "out", "det", "in"),
            Err(BuildError::PortAlreadyBound { bound_from, .. }) if bound_from == "cam.out"
        ));
    }

    #[test]
    fn test_fan_out_is_allowed() {
        let mut graph = image_chain();
        graph.add_node("rec", Box::new(RecordingSink::new(DataType::Image).0)).unwrap();
        graph.add_connection("cam", "out", "det", "in").unwrap();
        graph.add_connection("cam", "out", "rec", "in").unwrap();
        assert_eq!(graph.topology().outgoing("cam", "out").count(), 2);
        assert!(graph.validate().is_ok());
    }

    #[test]
    fn test_unbound_required_port_fails_validation() {
        let graph = image_chain();
        let errors = graph.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![BuildError::UnboundRequiredPort {
                node_id: "det".into(),
                port: "in".into()
            }]
        );
    }

    #[test]
    fn test_cycle_fails_validation() {
        let mut graph = Graph::new("loop");
        graph.add_node("a", Box::new(StubNode::transform(DataType::Any))).unwrap();
        graph.add_node("b", Box::new(StubNode::transform(DataType::Any))).unwrap();
        graph.add_connection("a", "out", "b", "in").unwrap();
        graph.add_connection("b", "out", "a", "in").unwrap();

        let errors = graph.validate().unwrap_err();
        assert_eq!(
            errors,
            vec![BuildError::CycleDetected {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }]
        );
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_invalid_config_rejected_at_add() {
        let mut graph = Graph::new("cfg");
        let mut node = StubNode::source(DataType::Number);
        node.config_error = Some("threshold out of range".into());
        let err = graph.add_node("bad", Box::new(node)).unwrap_err();
        assert_eq!(
            err,
            BuildError::InvalidConfig {
                node_id: "bad".into(),
                reason: "threshold out of range".into()
            }
        );
    }

    #[test]
    fn test_reconfigure_keeps_previous_config_on_rejection() {
        let registry = NodeRegistry::with_builtins();
        let mut graph = Graph::new("cfg");
        let config = NodeConfig::from_pairs([("level", json!(100))]);
        graph
            .add_node("thr", registry.create("thr", "threshold", config.clone()).unwrap())
            .unwrap();

        let err = graph
            .reconfigure("thr", NodeConfig::from_pairs([("level", json!(999))]))
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidConfig { .. }));
        assert_eq!(graph.topology().node("thr").unwrap().config, config);

        graph
            .reconfigure("thr", NodeConfig::from_pairs([("level", json!(42))]))
            .unwrap();
        assert_eq!(
            graph.topology().node("thr").unwrap().config.get_u64("level"),
            Some(42)
        );
    }

    #[test]
    fn test_reconfigure_reports_failed_restore() {
        let mut graph = Graph::new("cfg");
        graph.add_node("lens", Box::new(ReconfigureOnce::default())).unwrap();

        let err = graph
            .reconfigure("lens", NodeConfig::from_pairs([("bad", json!(true))]))
            .unwrap_err();
        match err {
            BuildError::InvalidConfig { node_id, reason } => {
                assert_eq!(node_id, "lens");
                assert_eq!(
                    reason,
                    "bad flag set; previous configuration not restored: \
                     configuration error: already reconfigured"
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
