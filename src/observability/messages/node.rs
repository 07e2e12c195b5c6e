// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for node invocations and node units.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// One invocation failed. What happens next depends on the error strategy.
///
/// # Log Level
/// `warn!` - The run may continue
///
/// # Example
/// ```
/// use dagline::observability::messages::node::NodeInvocationFailed;
///
/// let msg = NodeInvocationFailed {
///     node_id: "det",
///     attempt: 1,
///     strategy: "retry",
///     error: "model not loaded",
/// };
///
/// assert_eq!(
///     msg.to_string(),
///     "Node 'det' failed on attempt 1 (strategy retry): model not loaded"
/// );
/// ```
pub struct NodeInvocationFailed<'a> {
    pub node_id: &'a str,
    pub attempt: u32,
    pub strategy: &'a str,
    pub error: &'a str,
}

impl Display for NodeInvocationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' failed on attempt {} (strategy {}): {}",
            self.node_id, self.attempt, self.strategy, self.error
        )
    }
}

impl StructuredLog for NodeInvocationFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            node_id = self.node_id,
            attempt = self.attempt,
            strategy = self.strategy,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "node_invocation",
            span_name = name,
            node_id = self.node_id,
            attempt = self.attempt,
        )
    }
}

/// A failed invocation will be re-submitted with the same inputs.
///
/// # Log Level
/// `info!` - Operational event
pub struct NodeRetryScheduled<'a> {
    pub node_id: &'a str,
    pub attempt: u32,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Display for NodeRetryScheduled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Retrying node '{}' ({}/{}) in {:?}",
            self.node_id, self.attempt, self.max_retries, self.backoff
        )
    }
}

impl StructuredLog for NodeRetryScheduled<'_> {
    fn log(&self) {
        tracing::info!(
            node_id = self.node_id,
            attempt = self.attempt,
            max_retries = self.max_retries,
            backoff_ms = self.backoff.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("node_retry", span_name = name, node_id = self.node_id, attempt = self.attempt)
    }
}

/// A successful result broke the node's output contract and is treated as a failure.
///
/// # Log Level
/// `warn!` - Plugin bug
pub struct OutputContractViolated<'a> {
    pub node_id: &'a str,
    pub reason: &'a str,
}

impl Display for OutputContractViolated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' broke its output contract: {}", self.node_id, self.reason)
    }
}

impl StructuredLog for OutputContractViolated<'_> {
    fn log(&self) {
        tracing::warn!(node_id = self.node_id, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("node_outputs", span_name = name, node_id = self.node_id)
    }
}

/// A node unit left its loop.
///
/// # Log Level
/// `debug!` - Normal during shutdown
pub struct UnitFinished<'a> {
    pub node_id: &'a str,
    pub reason: &'a str,
    pub invocations: u64,
}

impl Display for UnitFinished<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Unit '{}' finished ({}) after {} invocation(s)",
            self.node_id, self.reason, self.invocations
        )
    }
}

impl StructuredLog for UnitFinished<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            reason = self.reason,
            invocations = self.invocations,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("unit", span_name = name, node_id = self.node_id)
    }
}
