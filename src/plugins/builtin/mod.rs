// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod blob_detector;
pub mod fail;
pub mod frame_counter;
pub mod invert;
pub mod passthrough;
pub mod test_pattern;
pub mod threshold;

pub use blob_detector::BlobDetector;
pub use fail::FailNode;
pub use frame_counter::{counter_key, FrameCounter};
pub use invert::Invert;
pub use passthrough::Passthrough;
pub use test_pattern::TestPattern;
pub use threshold::Threshold;
