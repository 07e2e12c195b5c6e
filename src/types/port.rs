// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::PortError;
use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl Display for PortDirection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PortDirection::Input => f.write_str("input"),
            PortDirection::Output => f.write_str("output"),
        }
    }
}

/// Static descriptor of one port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortSpec {
    pub name: String,
    pub direction: PortDirection,
    pub data_type: DataType,
    /// Inputs: the node cannot run without it. Outputs: a successful result must carry it.
    pub required: bool,
}

/// The declared inputs and outputs of a node.
///
/// Port names are unique per direction; an input and an output may share a name.
///
/// # Examples
/// ```
/// use dagline::types::{DataType, PortSet};
///
/// let mut ports = PortSet::new();
/// ports.input("image", DataType::Image).unwrap();
/// ports.output("image", DataType::Image).unwrap();
/// assert!(ports.input("image", DataType::Mask).is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSet {
    inputs: Vec<PortSpec>,
    outputs: Vec<PortSpec>,
}

impl PortSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_port(
        &mut self,
        name: &str,
        direction: PortDirection,
        data_type: DataType,
        required: bool,
    ) -> Result<(), PortError> {
        let ports = match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        };
        if ports.iter().any(|p| p.name == name) {
            return Err(PortError::DuplicatePort {
                port: name.to_string(),
                direction,
            });
        }
        ports.push(PortSpec {
            name: name.to_string(),
            direction,
            data_type,
            required,
        });
        Ok(())
    }

    pub fn input(&mut self, name: &str, data_type: DataType) -> Result<(), PortError> {
        self.declare_port(name, PortDirection::Input, data_type, true)
    }

    pub fn optional_input(&mut self, name: &str, data_type: DataType) -> Result<(), PortError> {
        self.declare_port(name, PortDirection::Input, data_type, false)
    }

    pub fn output(&mut self, name: &str, data_type: DataType) -> Result<(), PortError> {
        self.declare_port(name, PortDirection::Output, data_type, true)
    }

    pub fn optional_output(&mut self, name: &str, data_type: DataType) -> Result<(), PortError> {
        self.declare_port(name, PortDirection::Output, data_type, false)
    }

    pub fn inputs(&self) -> &[PortSpec] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[PortSpec] {
        &self.outputs
    }

    pub fn get_input(&self, name: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn get_output(&self, name: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compatibility {
    Compatible,
    Incompatible,
}

impl Compatibility {
    pub fn is_compatible(&self) -> bool {
        matches!(self, Compatibility::Compatible)
    }
}

/// Checks whether `source` may feed `dest`.
///
/// The source must be an output and the destination an input; tags must be equal, the source
/// tag a declared subtype of the destination tag, or either side `any`.
pub fn check_connection(source: &PortSpec, dest: &PortSpec) -> Compatibility {
    if source.direction != PortDirection::Output || dest.direction != PortDirection::Input {
        return Compatibility::Incompatible;
    }
    if source.data_type.flows_into(dest.data_type) {
        Compatibility::Compatible
    } else {
        Compatibility::Incompatible
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(direction: PortDirection, data_type: DataType) -> PortSpec {
        PortSpec {
            name: "p".into(),
            direction,
            data_type,
            required: true,
        }
    }

    #[test]
    fn test_duplicate_port_same_direction_is_rejected() {
        let mut ports = PortSet::new();
        ports.input("img", DataType::Image).unwrap();

        let err = ports.optional_input("img", DataType::Mask).unwrap_err();
        assert_eq!(
            err,
            PortError::DuplicatePort {
                port: "img".into(),
                direction: PortDirection::Input
            }
        );
        assert_eq!(ports.inputs().len(), 1);
    }

    #[test]
    fn test_same_name_in_both_directions_is_allowed() {
        let mut ports = PortSet::new();
        ports.input("img", DataType::Image).unwrap();
        ports.output("img", DataType::Image).unwrap();
        assert!(ports.get_input("img").is_some());
        assert!(ports.get_output("img").is_some());
    }

    #[test]
    fn test_check_connection() {
        use PortDirection::{Input, Output};

        assert!(check_connection(&spec(Output, DataType::Image), &spec(Input, DataType::Image))
            .is_compatible());
        assert!(check_connection(&spec(Output, DataType::Mask), &spec(Input, DataType::Image))
            .is_compatible());
        assert!(check_connection(&spec(Output, DataType::Any), &spec(Input, DataType::Number))
            .is_compatible());
        assert_eq!(
            check_connection(&spec(Output, DataType::Image), &spec(Input, DataType::Number)),
            Compatibility::Incompatible
        );
        assert_eq!(
            check_connection(&spec(Input, DataType::Image), &spec(Input, DataType::Image)),
            Compatibility::Incompatible
        );
    }
}
