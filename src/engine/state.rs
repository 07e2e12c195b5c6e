// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Executor lifecycle.
///
/// `Idle → Starting → Running → (Pausing → Paused → Running)* → Stopping → Stopped`.
/// A failed start goes straight from `Starting` to `Stopped`; `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    Idle,
    Starting,
    Running,
    Pausing,
    Paused,
    Stopping,
    Stopped,
}

impl ExecutorState {
    /// A run exists and its units are alive.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ExecutorState::Running | ExecutorState::Pausing | ExecutorState::Paused
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutorState::Idle => "idle",
            ExecutorState::Starting => "starting",
            ExecutorState::Running => "running",
            ExecutorState::Pausing => "pausing",
            ExecutorState::Paused => "paused",
            ExecutorState::Stopping => "stopping",
            ExecutorState::Stopped => "stopped",
        }
    }
}

impl Display for ExecutorState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
