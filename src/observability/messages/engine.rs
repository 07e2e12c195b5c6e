// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the executor lifecycle.
//!
//! This module contains message types for logging events related to:
//! * Run start and stop
//! * State transitions driven by the control surface
//! * Node initialization and cleanup failures
//! * Shutdown draining

use crate::engine::ExecutorState;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A run started: every node initialized and every unit spawned.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dagline::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     graph: "line",
///     node_count: 4,
///     connection_count: 3,
///     cpu_workers: 0,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStarted<'a> {
    pub graph: &'a str,
    pub node_count: usize,
    pub connection_count: usize,
    /// Zero when no node runs on the CPU lane.
    pub cpu_workers: usize,
}

impl Display for RunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' running: {} nodes, {} connections, cpu_workers={}",
            self.graph, self.node_count, self.connection_count, self.cpu_workers
        )
    }
}

impl StructuredLog for RunStarted<'_> {
    fn log(&self) {
        tracing::info!(
            graph = self.graph,
            node_count = self.node_count,
            connection_count = self.connection_count,
            cpu_workers = self.cpu_workers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            graph = self.graph,
            node_count = self.node_count,
            connection_count = self.connection_count,
        )
    }
}

/// A run finished and every node was cleaned up.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use dagline::observability::messages::engine::RunStopped;
/// use std::time::Duration;
///
/// let msg = RunStopped {
///     graph: "line",
///     duration: Duration::from_secs(2),
///     frames: 60,
///     reason: "stop requested",
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStopped<'a> {
    pub graph: &'a str,
    pub duration: Duration,
    pub frames: u64,
    pub reason: &'a str,
}

impl Display for RunStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' stopped ({}) after {:?}: {} frames",
            self.graph, self.reason, self.duration, self.frames
        )
    }
}

impl StructuredLog for RunStopped<'_> {
    fn log(&self) {
        tracing::info!(
            graph = self.graph,
            duration_ms = self.duration.as_millis() as u64,
            frames = self.frames,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("run", span_name = name, graph = self.graph, reason = self.reason)
    }
}

/// Lifecycle transition.
///
/// # Log Level
/// `debug!` - Useful when following a control sequence
pub struct StateChanged<'a> {
    pub graph: &'a str,
    pub from: ExecutorState,
    pub to: ExecutorState,
}

impl Display for StateChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph '{}' state {} -> {}", self.graph, self.from, self.to)
    }
}

impl StructuredLog for StateChanged<'_> {
    fn log(&self) {
        tracing::debug!(
            graph = self.graph,
            from = self.from.as_str(),
            to = self.to.as_str(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("state", span_name = name, graph = self.graph, to = self.to.as_str())
    }
}

/// A node's initialize hook failed; startup is aborted.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct NodeInitializationFailed<'a> {
    pub node_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeInitializationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' failed to initialize: {}", self.node_id, self.error)
    }
}

impl StructuredLog for NodeInitializationFailed<'_> {
    fn log(&self) {
        tracing::error!(node_id = self.node_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("node_init", span_name = name, node_id = self.node_id)
    }
}

/// A node's cleanup hook failed. Shutdown continues with the next node.
///
/// # Log Level
/// `warn!` - Potential resource leak
pub struct NodeCleanupFailed<'a> {
    pub node_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for NodeCleanupFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' cleanup failed: {}", self.node_id, self.error)
    }
}

impl StructuredLog for NodeCleanupFailed<'_> {
    fn log(&self) {
        tracing::warn!(node_id = self.node_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("node_cleanup", span_name = name, node_id = self.node_id)
    }
}

/// Units were still busy when the drain deadline passed; the rest are cancelled.
///
/// # Log Level
/// `warn!` - Queued items were discarded
pub struct DrainTimedOut<'a> {
    pub graph: &'a str,
    pub timeout: Duration,
    pub remaining_units: usize,
}

impl Display for DrainTimedOut<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Graph '{}' did not drain within {:?}; cancelling {} unit(s)",
            self.graph, self.timeout, self.remaining_units
        )
    }
}

impl StructuredLog for DrainTimedOut<'_> {
    fn log(&self) {
        tracing::warn!(
            graph = self.graph,
            timeout_ms = self.timeout.as_millis() as u64,
            remaining_units = self.remaining_units,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("drain", span_name = name, graph = self.graph)
    }
}

/// A unit task ended abnormally and its node instance could not be recovered.
///
/// # Log Level
/// `error!` - The node will not be cleaned up
pub struct UnitLost<'a> {
    pub graph: &'a str,
    pub reason: &'a str,
}

impl Display for UnitLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Graph '{}' lost a node unit: {}", self.graph, self.reason)
    }
}

impl StructuredLog for UnitLost<'_> {
    fn log(&self) {
        tracing::error!(graph = self.graph, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("unit", span_name = name, graph = self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NodeError;

    #[test]
    fn test_state_change_text() {
        let msg = StateChanged {
            graph: "line",
            from: ExecutorState::Running,
            to: ExecutorState::Pausing,
        };
        assert_eq!(msg.to_string(), "Graph 'line' state running -> pausing");
    }

    #[test]
    fn test_initialization_failure_includes_error() {
        let error = NodeError::Resource("camera busy".to_string());
        let msg = NodeInitializationFailed {
            node_id: "cam",
            error: &error,
        };
        assert_eq!(
            msg.to_string(),
            "Node 'cam' failed to initialize: resource error: camera busy"
        );
    }
}
