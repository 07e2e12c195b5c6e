// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::types::{DataType, PortDirection};
use thiserror::Error;

/// Raised while a node declares its ports.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("{direction} port '{port}' is declared twice")]
    DuplicatePort {
        port: String,
        direction: PortDirection,
    },
}

/// Errors raised while building or validating a graph. Always fatal: a run never starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A node id is already present in the graph
    #[error("duplicate node id: '{node_id}'")]
    DuplicateId { node_id: String },

    /// A node declared the same port name twice for one direction
    #[error("node '{node_id}' declares {direction} port '{port}' twice")]
    DuplicatePort {
        node_id: String,
        port: String,
        direction: PortDirection,
    },

    /// A connection references a node that is not in the graph
    #[error("unknown node '{node_id}'")]
    UnknownNode { node_id: String },

    /// A connection references a port the node does not declare
    #[error("node '{node_id}' has no {direction} port '{port}'")]
    UnknownPort {
        node_id: String,
        port: String,
        direction: PortDirection,
    },

    /// Source and destination port tags are not compatible
    #[error(
        "type mismatch: {from_node}.{from_port} ({from_type}) cannot feed {to_node}.{to_port} ({to_type})"
    )]
    TypeMismatch {
        from_node: String,
        from_port: String,
        from_type: DataType,
        to_node: String,
        to_port: String,
        to_type: DataType,
    },

    /// The destination input already has an incoming connection
    #[error("input {node_id}.{port} is already bound to {bound_from}")]
    PortAlreadyBound {
        node_id: String,
        port: String,
        bound_from: String,
    },

    /// The graph contains a cycle; the first node is repeated at the end of the path
    #[error("cycle detected: {}", .cycle.join(" -> "))]
    CycleDetected { cycle: Vec<String> },

    /// A required input port has no incoming connection
    #[error("required input {node_id}.{port} is not connected")]
    UnboundRequiredPort { node_id: String, port: String },

    /// The configuration names a node type the registry does not know
    #[error("node '{node_id}' uses unregistered type '{type_name}'")]
    UnregisteredType { node_id: String, type_name: String },

    /// A node rejected its own configuration
    #[error("node '{node_id}' has invalid configuration: {reason}")]
    InvalidConfig { node_id: String, reason: String },

    /// A node type was registered twice
    #[error("node type '{type_name}' is already registered")]
    DuplicateType { type_name: String },
}

impl BuildError {
    pub(crate) fn from_port_error(node_id: &str, err: PortError) -> Self {
        match err {
            PortError::DuplicatePort { port, direction } => BuildError::DuplicatePort {
                node_id: node_id.to_string(),
                port,
                direction,
            },
        }
    }
}

pub(crate) fn join_errors(errors: &[BuildError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
