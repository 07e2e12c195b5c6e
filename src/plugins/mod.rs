// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node implementations and the registry that maps graph-document type names to them.

pub mod builtin;
mod registry;

#[cfg(test)]
pub(crate) mod stub;

pub use registry::{NodeFactory, NodeRegistry};
