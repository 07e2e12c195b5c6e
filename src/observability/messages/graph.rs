// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for graph construction and validation.

use crate::errors::{join_errors, BuildError};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Graph passed validation.
///
/// # Log Level
/// `debug!` - Validation runs on every start
///
/// # Example
/// ```
/// use dagline::observability::messages::graph::GraphValidated;
///
/// let msg = GraphValidated {
///     graph: "line",
///     node_count: 3,
///     connection_count: 2,
/// };
///
/// assert_eq!(msg.to_string(), "Graph 'line' is valid: 3 nodes, 2 connections");
/// ```
pub struct GraphValidated<'a> {
    pub graph: &'a str,
    pub node_count: usize,
    pub connection_count: usize,
}

impl Display for GraphValidated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' is valid: {} nodes, {} connections",
            self.graph, self.node_count, self.connection_count
        )
    }
}

impl StructuredLog for GraphValidated<'_> {
    fn log(&self) {
        tracing::debug!(
            graph = self.graph,
            node_count = self.node_count,
            connection_count = self.connection_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "graph_validation",
            span_name = name,
            graph = self.graph,
            node_count = self.node_count,
        )
    }
}

/// Graph failed validation. Every problem is listed.
///
/// # Log Level
/// `error!` - The graph cannot run
pub struct GraphValidationFailed<'a> {
    pub graph: &'a str,
    pub errors: &'a [BuildError],
}

impl Display for GraphValidationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' failed validation with {} error(s): {}",
            self.graph,
            self.errors.len(),
            join_errors(self.errors)
        )
    }
}

impl StructuredLog for GraphValidationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            graph = self.graph,
            error_count = self.errors.len(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "graph_validation",
            span_name = name,
            graph = self.graph,
            error_count = self.errors.len(),
        )
    }
}

/// A graph document was read and parsed.
///
/// # Log Level
/// `info!` - Important operational event
pub struct GraphDocumentLoaded<'a> {
    pub path: &'a str,
    pub graph: &'a str,
    pub node_count: usize,
    pub connection_count: usize,
}

impl Display for GraphDocumentLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded graph '{}' from {}: {} nodes, {} connections",
            self.graph, self.path, self.node_count, self.connection_count
        )
    }
}

impl StructuredLog for GraphDocumentLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            graph = self.graph,
            node_count = self.node_count,
            connection_count = self.connection_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("graph_load", span_name = name, path = self.path, graph = self.graph)
    }
}

/// A rejected reconfiguration could not be rolled back; the node keeps the rejected config.
///
/// # Log Level
/// `error!` - The node may not run as configured
pub struct ConfigRestoreFailed<'a> {
    pub node_id: &'a str,
    pub error: &'a str,
}

impl Display for ConfigRestoreFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' could not restore its previous configuration: {}",
            self.node_id, self.error
        )
    }
}

impl StructuredLog for ConfigRestoreFailed<'_> {
    fn log(&self) {
        tracing::error!(node_id = self.node_id, error = self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("reconfigure", span_name = name, node_id = self.node_id)
    }
}

/// A node type was added to a registry.
pub struct NodeTypeRegistered<'a> {
    pub type_name: &'a str,
    pub version: &'a str,
    pub cpu_bound: bool,
}

impl Display for NodeTypeRegistered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered node type '{}' v{}{}",
            self.type_name,
            self.version,
            if self.cpu_bound { " (cpu-bound)" } else { "" }
        )
    }
}

impl StructuredLog for NodeTypeRegistered<'_> {
    fn log(&self) {
        tracing::trace!(
            type_name = self.type_name,
            version = self.version,
            cpu_bound = self.cpu_bound,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("registry", span_name = name, type_name = self.type_name)
    }
}
