// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! # Organization
//!
//! * `graph` - graph construction, validation and document loading
//! * `engine` - executor lifecycle
//! * `node` - node invocation and unit events
//! * `queue` - edge backpressure
//!
//! # Usage Pattern
//!
//! ```rust
//! use dagline::observability::messages::engine::RunStarted;
//!
//! let msg = RunStarted {
//!     graph: "line",
//!     node_count: 4,
//!     connection_count: 3,
//!     cpu_workers: 2,
//! };
//!
//! tracing::info!("{}", msg);
//! ```

use tracing::Span;

pub mod engine;
pub mod graph;
pub mod node;
pub mod queue;

/// A message that knows its own level and structured fields.
pub trait StructuredLog {
    /// Emits the message at its level, with its fields attached.
    fn log(&self);

    /// A span carrying the same fields, for work done on behalf of this message.
    fn span(&self, name: &str) -> Span;
}
