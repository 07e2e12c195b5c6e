// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::{EdgeOptions, NodeConfig};
use crate::traits::NodeMetadata;
use crate::types::PortSet;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

/// Everything the graph knows about a node besides the instance itself.
#[derive(Debug, Clone)]
pub struct NodeDescriptor {
    pub id: String,
    pub metadata: NodeMetadata,
    pub ports: PortSet,
    pub config: NodeConfig,
    pub cpu_bound: bool,
}

/// A directed, type-checked link from one output port to one input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from_node: String,
    pub from_port: String,
    pub to_node: String,
    pub to_port: String,
    pub options: EdgeOptions,
}

impl Display for Connection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}->{}.{}",
            self.from_node, self.from_port, self.to_node, self.to_port
        )
    }
}

/// The static blueprint: node descriptors plus connections.
///
/// Node ids are kept ordered so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    pub(crate) nodes: BTreeMap<String, NodeDescriptor>,
    pub(crate) connections: Vec<Connection>,
}

impl Topology {
    pub fn node(&self, id: &str) -> Option<&NodeDescriptor> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.values()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Connections leaving `node.port`, in the order they were added.
    pub fn outgoing<'a>(
        &'a self,
        node: &'a str,
        port: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Connection)> + 'a {
        self.connections
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.from_node == node && c.from_port == port)
    }

    /// Connections arriving at any input of `node`.
    pub fn incoming<'a>(&'a self, node: &'a str) -> impl Iterator<Item = (usize, &'a Connection)> + 'a {
        self.connections
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.to_node == node)
    }

    /// The connection bound to `node.port`, if any.
    pub fn binding(&self, node: &str, port: &str) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.to_node == node && c.to_port == port)
    }

    /// Distinct downstream node ids.
    pub fn successors(&self, node: &str) -> BTreeSet<&str> {
        self.connections
            .iter()
            .filter(|c| c.from_node == node)
            .map(|c| c.to_node.as_str())
            .collect()
    }

    /// A source has no connected inputs and is driven repeatedly by the executor.
    pub fn is_source(&self, node: &str) -> bool {
        !self.connections.iter().any(|c| c.to_node == node)
    }
}
