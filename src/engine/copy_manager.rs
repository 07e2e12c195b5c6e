// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Copy-versus-share decisions for fan-out.
//!
//! The decision depends only on the number of consumers and the mutability class of the
//! declared port type (see [`crate::types::MUTABILITY_TABLE`]); payload size never matters.
//! A port declared `any` is classified by the tag of the value actually produced.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::{mutability_of, DataType, Mutability, SharedValue};

/// How one produced value was handed to its consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    /// No consumer is connected; the value is dropped.
    Discarded,
    /// Exactly one consumer: the value moves without copying.
    Transferred,
    /// Immutable type: every consumer gets the same allocation.
    Shared { consumers: usize },
    /// Mutable type: the first consumer gets the original, every other one a deep copy.
    DeepCopied { consumers: usize, copies: usize, bytes: usize },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CopyStats {
    pub transfers: u64,
    pub shares: u64,
    pub deep_copies: u64,
    pub bytes_copied: u64,
}

/// Applies the fan-out policy and keeps counters.
#[derive(Debug, Default)]
pub struct CopyManager {
    transfers: AtomicU64,
    shares: AtomicU64,
    deep_copies: AtomicU64,
    bytes_copied: AtomicU64,
}

impl CopyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies a value leaving a port declared as `declared`.
    pub fn classify(declared: DataType, value: &SharedValue) -> Mutability {
        match declared {
            DataType::Any => mutability_of(value.data_type()),
            tag => mutability_of(tag),
        }
    }

    /// Returns one handle per consumer, in consumer order.
    ///
    /// # Examples
    /// ```
    /// use dagline::engine::{CopyManager, Distribution};
    /// use dagline::types::{DataType, Image, Value};
    /// use std::sync::Arc;
    ///
    /// let manager = CopyManager::new();
    /// let frame = Arc::new(Value::Image(Image::zeros(4, 4, 1)));
    /// let (handles, how) = manager.distribute(Arc::clone(&frame), DataType::Image, 3);
    ///
    /// assert!(Arc::ptr_eq(&handles[0], &frame));
    /// assert!(!Arc::ptr_eq(&handles[1], &handles[2]));
    /// assert_eq!(how, Distribution::DeepCopied { consumers: 3, copies: 2, bytes: 32 });
    /// ```
    pub fn distribute(
        &self,
        value: SharedValue,
        declared: DataType,
        consumers: usize,
    ) -> (Vec<SharedValue>, Distribution) {
        match consumers {
            0 => (Vec::new(), Distribution::Discarded),
            1 => {
                self.transfers.fetch_add(1, Ordering::Relaxed);
                (vec![value], Distribution::Transferred)
            }
            n => match Self::classify(declared, &value) {
                Mutability::ImmutableByConvention => {
                    self.shares.fetch_add(1, Ordering::Relaxed);
                    let handles = (0..n).map(|_| Arc::clone(&value)).collect();
                    (handles, Distribution::Shared { consumers: n })
                }
                Mutability::MutableByConsumer => {
                    let copies = n - 1;
                    let bytes = value.approx_size() * copies;
                    let mut handles = Vec::with_capacity(n);
                    for _ in 0..copies {
                        handles.push(Arc::new(value.as_ref().clone()));
                    }
                    handles.insert(0, value);

                    self.deep_copies.fetch_add(copies as u64, Ordering::Relaxed);
                    self.bytes_copied.fetch_add(bytes as u64, Ordering::Relaxed);
                    (
                        handles,
                        Distribution::DeepCopied {
                            consumers: n,
                            copies,
                            bytes,
                        },
                    )
                }
            },
        }
    }

    pub fn stats(&self) -> CopyStats {
        CopyStats {
            transfers: self.transfers.load(Ordering::Relaxed),
            shares: self.shares.load(Ordering::Relaxed),
            deep_copies: self.deep_copies.load(Ordering::Relaxed),
            bytes_copied: self.bytes_copied.load(Ordering::Relaxed),
        }
    }
}
