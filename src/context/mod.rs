// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-invocation execution context and the process-wide keyed store.

mod execution;
mod global;

pub use execution::ExecutionContext;
pub use global::GlobalContext;
