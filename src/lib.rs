// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // graph documents + executor options
pub mod context;    // per-invocation and global state
pub mod engine;     // streaming executor
pub mod errors;     // error handling
pub mod events;     // event bus
pub mod graph;      // topology, validation, build
pub mod observability;
pub mod plugins;    // node registry + builtin nodes
pub mod traits;     // node contract + control surface
pub mod types;      // data tags, values, ports
