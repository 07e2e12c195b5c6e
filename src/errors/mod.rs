// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod build;
mod config;
mod execution;

pub(crate) use build::join_errors;
pub use build::{BuildError, PortError};
pub use config::ConfigError;
pub use execution::{ErrorStrategy, ExecutionError, NodeError};
