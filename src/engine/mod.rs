// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Streaming execution: edge queues, fan-out copies, node units and the executor that drives
//! them.

mod copy_manager;
mod executor;
pub mod lanes;
pub mod metrics;
mod queue;
mod state;
mod unit;


pub use copy_manager::{CopyManager, CopyStats, Distribution};
pub use executor::StreamingExecutor;
pub use lanes::{CpuLane, Lane};
pub use metrics::{MetricsSnapshot, NodeStatsSnapshot, QueueDepth};
pub use queue::{EdgeQueue, Packet, PushError, QueuePolicy};
pub use state::ExecutorState;
