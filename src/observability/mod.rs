// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic line dagline writes goes through a message type from [`messages`]. Each
//! message is a small struct that implements `Display` for the human readable text and
//! [`messages::StructuredLog`] for the level plus the structured fields, so the same event
//! reads the same whether it lands in a terminal or a JSON log pipeline.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::graph` - graph construction, validation and document loading
//! * `messages::engine` - executor lifecycle: start, state changes, shutdown
//! * `messages::node` - per-node invocation failures, retries and unit exits
//! * `messages::queue` - backpressure on edges
//!
//! # Usage
//!
//! ```rust
//! use dagline::observability::messages::node::NodeInvocationFailed;
//! use dagline::observability::messages::StructuredLog;
//!
//! NodeInvocationFailed {
//!     node_id: "det",
//!     attempt: 0,
//!     strategy: "skip",
//!     error: "model not loaded",
//! }
//! .log();
//! ```

pub mod messages;
