// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Port and type system.
//!
//! Every port carries a [`DataType`] tag that is fixed at declaration time. Connections are
//! checked against a static subtype table at graph-build time, and the copy manager consults a
//! static mutability table when an output fans out to several consumers.

mod data_type;
mod port;
mod value;

pub use data_type::{mutability_of, DataType, Mutability, MUTABILITY_TABLE, SUBTYPE_TABLE};
pub use port::{check_connection, Compatibility, PortDirection, PortSet, PortSpec};
pub use value::{Detection, Image, Point, Region, SharedValue, Value};
