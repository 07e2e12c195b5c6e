// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::engine::{ExecutorState, MetricsSnapshot};
use crate::errors::ExecutionError;

/// Control surface consumed by a host process.
///
/// Every call is idempotent with respect to the current state: asking for the state the runtime
/// is already in (or moving towards) succeeds without doing anything.
#[async_trait]
pub trait RuntimeControl: Send + Sync {
    async fn start(&self) -> Result<(), ExecutionError>;

    /// Graceful stop. Resolves once the runtime is `Stopped`.
    async fn stop(&self) -> Result<(), ExecutionError>;

    /// Resolves once in-flight invocations have finished.
    async fn pause(&self) -> Result<(), ExecutionError>;

    async fn resume(&self) -> Result<(), ExecutionError>;

    fn state(&self) -> ExecutorState;

    /// Why the last run ended, if it ended abnormally.
    fn last_error(&self) -> Option<ExecutionError>;

    fn metrics(&self) -> MetricsSnapshot;
}
