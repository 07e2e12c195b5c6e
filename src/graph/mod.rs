// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Static graph: nodes, typed connections, validation and ordering.

mod dag;
mod topology;
pub mod validation;

pub use dag::Graph;
pub(crate) use dag::GraphHeader;
pub use topology::{Connection, NodeDescriptor, Topology};
