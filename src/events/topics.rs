// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Topic names published by the executor.

pub const NODE_START: &str = "node.start";
pub const NODE_COMPLETE: &str = "node.complete";
pub const NODE_ERROR: &str = "node.error";
pub const NODE_RETRY: &str = "node.retry";
pub const NODE_INIT_ERROR: &str = "node.init_error";
pub const NODE_CLEANUP_ERROR: &str = "node.cleanup_error";

pub const GRAPH_START: &str = "graph.start";
pub const GRAPH_STOP: &str = "graph.stop";
/// Every executor state transition.
pub const GRAPH_STATE: &str = "graph.state";

pub const QUEUE_FULL: &str = "queue.full";
/// A blocked push made no progress for the configured stall timeout.
pub const QUEUE_STALL: &str = "queue.stall";

pub const BRANCH_COPY: &str = "branch.copy";
