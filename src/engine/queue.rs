// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Bounded single-producer, single-consumer edge queue.
//!
//! Each edge gets one queue. The producer side closes it when its unit finishes so the
//! consumer can drain what is left and then observe the end of the stream; the consumer side
//! closes it so a blocked producer is released instead of waiting forever.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::Notify;

use crate::types::SharedValue;

/// What a full queue does with a new item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueuePolicy {
    /// The producer waits for space.
    #[default]
    Block,
    /// Evict the oldest queued item to make room.
    DropOldest,
    /// Discard the item being pushed.
    DropNewest,
}

/// One delivered value plus the frame it belongs to.
#[derive(Debug, Clone)]
pub struct Packet {
    pub value: SharedValue,
    pub execution_id: Option<Arc<str>>,
    pub enqueued_at: Instant,
}

impl Packet {
    pub fn new(value: SharedValue, execution_id: Option<Arc<str>>) -> Self {
        Self {
            value,
            execution_id,
            enqueued_at: Instant::now(),
        }
    }
}

#[derive(Debug)]
pub enum PushError {
    /// The queue is at capacity; the packet is handed back.
    Full(Packet),
    /// The consumer is gone; the packet is handed back.
    Closed(Packet),
}

struct QueueState {
    items: VecDeque<Packet>,
    producer_done: bool,
    consumer_gone: bool,
}

struct QueueShared {
    state: Mutex<QueueState>,
    capacity: usize,
    items_available: Notify,
    space_available: Notify,
}

/// Cloneable handle to one edge queue.
#[derive(Clone)]
pub struct EdgeQueue {
    shared: Arc<QueueShared>,
}

impl std::fmt::Debug for EdgeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeQueue")
            .field("len", &self.len())
            .field("capacity", &self.shared.capacity)
            .finish()
    }
}

impl EdgeQueue {
    /// `capacity` is fixed for the lifetime of the queue (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(QueueShared {
                state: Mutex::new(QueueState {
                    items: VecDeque::with_capacity(capacity.max(1)),
                    producer_done: false,
                    consumer_gone: false,
                }),
                capacity: capacity.max(1),
                items_available: Notify::new(),
                space_available: Notify::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn try_push(&self, packet: Packet) -> Result<(), PushError> {
        let mut state = self.lock();
        if state.consumer_gone {
            return Err(PushError::Closed(packet));
        }
        if state.items.len() >= self.shared.capacity {
            return Err(PushError::Full(packet));
        }
        state.items.push_back(packet);
        drop(state);
        self.shared.items_available.notify_one();
        Ok(())
    }

    /// Pushes, evicting the oldest item when full. Returns the evicted packet.
    pub fn push_evicting(&self, packet: Packet) -> Result<Option<Packet>, PushError> {
        let mut state = self.lock();
        if state.consumer_gone {
            return Err(PushError::Closed(packet));
        }
        let evicted = if state.items.len() >= self.shared.capacity {
            state.items.pop_front()
        } else {
            None
        };
        state.items.push_back(packet);
        drop(state);
        self.shared.items_available.notify_one();
        Ok(evicted)
    }

    /// Resolves once there is room for one item or the consumer is gone.
    pub async fn space_available(&self) {
        loop {
            let notified = self.shared.space_available.notified();
            {
                let state = self.lock();
                if state.consumer_gone || state.items.len() < self.shared.capacity {
                    return;
                }
            }
            notified.await;
        }
    }

    /// Takes the oldest item, waiting if the queue is empty.
    ///
    /// Returns `None` once the producer has finished and everything has been drained. Dropping
    /// the future never loses an item.
    pub async fn pop(&self) -> Option<Packet> {
        loop {
            let notified = self.shared.items_available.notified();
            {
                let mut state = self.lock();
                if let Some(packet) = state.items.pop_front() {
                    drop(state);
                    self.shared.space_available.notify_one();
                    return Some(packet);
                }
                if state.producer_done || state.consumer_gone {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn try_pop(&self) -> Option<Packet> {
        let packet = self.lock().items.pop_front();
        if packet.is_some() {
            self.shared.space_available.notify_one();
        }
        packet
    }

    /// Nothing is queued and the producer will never push again.
    pub fn is_exhausted(&self) -> bool {
        let state = self.lock();
        state.items.is_empty() && (state.producer_done || state.consumer_gone)
    }

    /// Producer side is finished. Queued items remain available to the consumer.
    pub fn close_producer(&self) {
        self.lock().producer_done = true;
        self.shared.items_available.notify_one();
    }

    /// Consumer side is finished. Pending and future pushes fail with `Closed`.
    pub fn close_consumer(&self) {
        {
            let mut state = self.lock();
            state.consumer_gone = true;
            state.items.clear();
        }
        self.shared.space_available.notify_one();
    }
}
