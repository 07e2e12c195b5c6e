// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for edge backpressure.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A push found the edge queue at capacity.
///
/// # Log Level
/// `debug!` - Expected under load; counted in the run metrics
pub struct QueueFull<'a> {
    pub edge: &'a str,
    pub capacity: usize,
    pub policy: &'a str,
}

impl Display for QueueFull<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Queue {} full at {} item(s), policy {}",
            self.edge, self.capacity, self.policy
        )
    }
}

impl StructuredLog for QueueFull<'_> {
    fn log(&self) {
        tracing::debug!(
            edge = self.edge,
            capacity = self.capacity,
            policy = self.policy,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("queue", span_name = name, edge = self.edge)
    }
}

/// A blocked producer has waited longer than the stall timeout.
///
/// # Log Level
/// `warn!` - The consumer may be stuck
///
/// # Example
/// ```
/// use dagline::observability::messages::queue::QueueStalled;
/// use std::time::Duration;
///
/// let msg = QueueStalled {
///     edge: "cam.image->det.image",
///     capacity: 3,
///     waited: Duration::from_secs(2),
/// };
///
/// assert_eq!(msg.to_string(), "Queue cam.image->det.image stalled: full at 3 for 2s");
/// ```
pub struct QueueStalled<'a> {
    pub edge: &'a str,
    pub capacity: usize,
    pub waited: Duration,
}

impl Display for QueueStalled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Queue {} stalled: full at {} for {:?}",
            self.edge, self.capacity, self.waited
        )
    }
}

impl StructuredLog for QueueStalled<'_> {
    fn log(&self) {
        tracing::warn!(
            edge = self.edge,
            capacity = self.capacity,
            waited_ms = self.waited.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("queue", span_name = name, edge = self.edge)
    }
}
