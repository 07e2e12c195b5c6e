// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod node_config;
mod runtime;

pub mod consts;

pub use loader::{
    load_graph_config, parse_graph_config, ConfigFormat, ConnectionEntry, EdgeOptions,
    ExecutorOptions, GraphConfig, NodeEntry,
};
pub use node_config::NodeConfig;
pub use runtime::RuntimeBuilder;
