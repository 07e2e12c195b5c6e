// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::engine::ExecutorState;
use crate::errors::build::join_errors;
use crate::errors::BuildError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How the executor reacts to a failed node invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategy {
    /// Any node error halts the whole run.
    #[default]
    #[serde(alias = "circuit_break")]
    CircuitBreak,
    /// Discard the failed invocation and keep going.
    Skip,
    /// Re-submit the same inputs, then skip or escalate once attempts run out.
    Retry,
}

impl ErrorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorStrategy::CircuitBreak => "circuit-break",
            ErrorStrategy::Skip => "skip",
            ErrorStrategy::Retry => "retry",
        }
    }
}

/// Failure reported by a node's lifecycle hooks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("resource error: {0}")]
    Resource(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("cancelled")]
    Cancelled,
}

/// Errors surfaced by the runtime control surface and kept as the "last fatal error".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Graph validation failed before any node was initialized
    #[error("graph is invalid: {}", join_errors(.errors))]
    InvalidGraph { errors: Vec<BuildError> },

    /// A node's initialize hook failed and startup was aborted
    #[error("node '{node_id}' failed to initialize: {reason}")]
    Initialization { node_id: String, reason: String },

    /// A node invocation failed and the error strategy escalated it
    #[error("node '{node_id}' failed: {reason}")]
    NodeFailed { node_id: String, reason: String },

    /// The control call is not valid in the current state
    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: ExecutorState,
    },

    #[error("internal executor error: {message}")]
    Internal { message: String },
}
