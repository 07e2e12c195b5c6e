// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Type tag carried by every port.
///
/// Tags are compared structurally at build time; no value is ever inspected to decide whether
/// two ports may be connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataType {
    /// Generic tag, compatible with everything in either direction.
    Any,
    Image,
    /// Single channel image. Accepted wherever an image is expected.
    Mask,
    DetectionList,
    Number,
    /// Accepted wherever a number is expected.
    Integer,
    Boolean,
    Text,
    Point,
    Region,
    /// Small key/value record of JSON values.
    Record,
}

impl DataType {
    pub const ALL: [DataType; 11] = [
        DataType::Any,
        DataType::Image,
        DataType::Mask,
        DataType::DetectionList,
        DataType::Number,
        DataType::Integer,
        DataType::Boolean,
        DataType::Text,
        DataType::Point,
        DataType::Region,
        DataType::Record,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Any => "any",
            DataType::Image => "image",
            DataType::Mask => "mask",
            DataType::DetectionList => "detection-list",
            DataType::Number => "number",
            DataType::Integer => "integer",
            DataType::Boolean => "boolean",
            DataType::Text => "text",
            DataType::Point => "point",
            DataType::Region => "region",
            DataType::Record => "record",
        }
    }

    /// True when `self` is listed as a direct subtype of `parent` in [`SUBTYPE_TABLE`].
    ///
    /// The relation is deliberately not transitive; every accepted pair is spelled out.
    pub fn is_subtype_of(&self, parent: DataType) -> bool {
        SUBTYPE_TABLE
            .iter()
            .any(|(child, p)| *child == *self && *p == parent)
    }

    /// Whether a value tagged `self` may flow into a port tagged `target`.
    pub fn flows_into(&self, target: DataType) -> bool {
        *self == DataType::Any
            || target == DataType::Any
            || *self == target
            || self.is_subtype_of(target)
    }

    pub fn mutability(&self) -> Mutability {
        mutability_of(*self)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .iter()
            .copied()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| format!("unknown data type '{}'", s))
    }
}

/// `(child, parent)` pairs: a source port tagged `child` may feed a destination tagged `parent`.
pub const SUBTYPE_TABLE: &[(DataType, DataType)] = &[
    (DataType::Integer, DataType::Number),
    (DataType::Mask, DataType::Image),
];

/// How a downstream node is allowed to treat a delivered value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mutability {
    /// Consumers may edit the payload in place, so fan-out needs one copy per extra consumer.
    MutableByConsumer,
    /// Consumers only read; fan-out shares a single allocation.
    ImmutableByConvention,
}

/// Mutability class per type tag, consulted by the copy manager.
pub const MUTABILITY_TABLE: &[(DataType, Mutability)] = &[
    (DataType::Any, Mutability::MutableByConsumer),
    (DataType::Image, Mutability::MutableByConsumer),
    (DataType::Mask, Mutability::MutableByConsumer),
    (DataType::DetectionList, Mutability::MutableByConsumer),
    (DataType::Record, Mutability::MutableByConsumer),
    (DataType::Number, Mutability::ImmutableByConvention),
    (DataType::Integer, Mutability::ImmutableByConvention),
    (DataType::Boolean, Mutability::ImmutableByConvention),
    (DataType::Text, Mutability::ImmutableByConvention),
    (DataType::Point, Mutability::ImmutableByConvention),
    (DataType::Region, Mutability::ImmutableByConvention),
];

/// Looks up a tag in [`MUTABILITY_TABLE`]. Unlisted tags are treated as mutable.
pub fn mutability_of(data_type: DataType) -> Mutability {
    MUTABILITY_TABLE
        .iter()
        .find(|(tag, _)| *tag == data_type)
        .map(|(_, class)| *class)
        .unwrap_or(Mutability::MutableByConsumer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_tag_has_a_mutability_entry() {
        for tag in DataType::ALL {
            assert!(
                MUTABILITY_TABLE.iter().any(|(t, _)| *t == tag),
                "missing mutability entry for {}",
                tag
            );
        }
    }

    #[test]
    fn test_flows_into() {
        struct TestCase {
            from: DataType,
            to: DataType,
            expected: bool,
        }

        let cases = vec![
            TestCase { from: DataType::Image, to: DataType::Image, expected: true },
            TestCase { from: DataType::Mask, to: DataType::Image, expected: true },
            TestCase { from: DataType::Image, to: DataType::Mask, expected: false },
            TestCase { from: DataType::Integer, to: DataType::Number, expected: true },
            TestCase { from: DataType::Number, to: DataType::Integer, expected: false },
            TestCase { from: DataType::Any, to: DataType::DetectionList, expected: true },
            TestCase { from: DataType::Text, to: DataType::Any, expected: true },
            TestCase { from: DataType::Text, to: DataType::Number, expected: false },
        ];

        for case in cases {
            assert_eq!(
                case.from.flows_into(case.to),
                case.expected,
                "{} -> {}",
                case.from,
                case.to
            );
        }
    }

    #[test]
    fn test_tag_names_parse_back() {
        for tag in DataType::ALL {
            assert_eq!(tag.as_str().parse::<DataType>(), Ok(tag));
        }
        assert!("tensor".parse::<DataType>().is_err());
    }

    #[test]
    fn test_serde_uses_kebab_case() {
        let json = serde_json::to_string(&DataType::DetectionList).unwrap();
        assert_eq!(json, "\"detection-list\"");
    }

    #[test]
    fn test_scalars_are_shared_and_buffers_are_copied() {
        assert_eq!(DataType::Image.mutability(), Mutability::MutableByConsumer);
        assert_eq!(DataType::Number.mutability(), Mutability::ImmutableByConvention);
    }
}
