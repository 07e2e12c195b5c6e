// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::types::DataType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// A value as it travels along an edge.
///
/// Consumers that need to edit a payload call [`Arc::make_mut`]; the copy manager guarantees the
/// allocation is not visible to any other branch when the type is mutable-by-consumer.
pub type SharedValue = Arc<Value>;

/// Interleaved 8-bit image buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl Image {
    pub fn zeros(width: u32, height: u32, channels: u8) -> Self {
        Self::filled(width, height, channels, 0)
    }

    pub fn filled(width: u32, height: u32, channels: u8, level: u8) -> Self {
        let len = width as usize * height as usize * channels as usize;
        Self {
            width,
            height,
            channels,
            data: vec![level; len],
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.channels as usize;
        let offset = (y as usize * self.width as usize + x as usize) * channels;
        self.data.get(offset..offset + channels)
    }

    /// Mean over all channels of one pixel.
    pub fn intensity(&self, x: u32, y: u32) -> Option<u8> {
        self.pixel(x, y).map(|p| {
            let sum: u32 = p.iter().map(|c| *c as u32).sum();
            (sum / p.len().max(1) as u32) as u8
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: u32,
    pub label: String,
    pub confidence: f32,
    pub bbox: Region,
}

/// Payload of a port. The variant determines the runtime type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum Value {
    Image(Image),
    Mask(Image),
    DetectionList(Vec<Detection>),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Point(Point),
    Region(Region),
    Record(BTreeMap<String, serde_json::Value>),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Image(_) => DataType::Image,
            Value::Mask(_) => DataType::Mask,
            Value::DetectionList(_) => DataType::DetectionList,
            Value::Number(_) => DataType::Number,
            Value::Integer(_) => DataType::Integer,
            Value::Boolean(_) => DataType::Boolean,
            Value::Text(_) => DataType::Text,
            Value::Point(_) => DataType::Point,
            Value::Region(_) => DataType::Region,
            Value::Record(_) => DataType::Record,
        }
    }

    /// Rough payload size, used for copy accounting.
    pub fn approx_size(&self) -> usize {
        match self {
            Value::Image(image) | Value::Mask(image) => image.data.len(),
            Value::DetectionList(list) => list
                .iter()
                .map(|d| std::mem::size_of::<Detection>() + d.label.len())
                .sum(),
            Value::Text(text) => text.len(),
            Value::Record(record) => record
                .iter()
                .map(|(k, v)| k.len() + v.to_string().len())
                .sum(),
            _ => std::mem::size_of::<Value>(),
        }
    }

    pub fn as_image(&self) -> Option<&Image> {
        match self {
            Value::Image(image) | Value::Mask(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_image_mut(&mut self) -> Option<&mut Image> {
        match self {
            Value::Image(image) | Value::Mask(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl From<Image> for Value {
    fn from(image: Image) -> Self {
        Value::Image(image)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<Detection>> for Value {
    fn from(list: Vec<Detection>) -> Self {
        Value::DetectionList(list)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeros_has_expected_length() {
        let image = Image::zeros(10, 10, 3);
        assert_eq!(image.data.len(), 300);
        assert_eq!(image.pixel(9, 9), Some(&[0u8, 0, 0][..]));
        assert_eq!(image.pixel(10, 0), None);
    }

    #[test]
    fn test_intensity_averages_channels() {
        let mut image = Image::zeros(2, 1, 3);
        image.data[3..6].copy_from_slice(&[30, 60, 90]);
        assert_eq!(image.intensity(1, 0), Some(60));
        assert_eq!(image.intensity(0, 0), Some(0));
    }

    #[test]
    fn test_value_reports_its_tag() {
        assert_eq!(Value::from(Image::zeros(1, 1, 1)).data_type(), DataType::Image);
        assert_eq!(Value::Mask(Image::zeros(1, 1, 1)).data_type(), DataType::Mask);
        assert_eq!(Value::from(3i64).data_type(), DataType::Integer);
        assert_eq!(Value::from(Vec::new()).data_type(), DataType::DetectionList);
    }

    #[test]
    fn test_make_mut_detaches_shared_buffers() {
        let original: SharedValue = Arc::new(Image::zeros(2, 2, 1).into());
        let mut edited = Arc::clone(&original);

        if let Some(image) = Arc::make_mut(&mut edited).as_image_mut() {
            image.data.fill(255);
        }

        assert_eq!(original.as_image().map(|i| i.data[0]), Some(0));
        assert_eq!(edited.as_image().map(|i| i.data[0]), Some(255));
    }
}
