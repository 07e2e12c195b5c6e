// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod control;
pub mod node;

pub use control::RuntimeControl;
pub use node::{Node, NodeMetadata, NodePlugin, NodeResult};
