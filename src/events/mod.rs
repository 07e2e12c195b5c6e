// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Lifecycle and performance event stream.
//!
//! The executor publishes `(topic, payload)` pairs; monitoring collaborators subscribe by exact
//! topic or wildcard pattern. Publishing never waits: a subscriber whose buffer is full simply
//! misses the event.

mod bus;
pub mod topics;

pub use bus::{Event, EventBus, EventBusStats, Subscription, TopicPattern};
