// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::config::consts::DEFAULT_EVENT_BUFFER;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub topic: String,
    /// Node id, or the graph name for graph-level events.
    pub source: String,
    pub payload: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u64,
}

impl Event {
    pub fn new(topic: &str, source: &str, payload: serde_json::Value) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            topic: topic.to_string(),
            source: source.to_string(),
            payload,
            timestamp_ms,
        }
    }
}

/// Subscription pattern. `*` matches any run of characters, so `node.*`, `*.error` and `*`
/// all work; a pattern without `*` must match the topic exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPattern {
    segments: Vec<String>,
    wildcard: bool,
}

impl TopicPattern {
    pub fn parse(pattern: &str) -> Self {
        Self {
            segments: pattern.split('*').map(str::to_string).collect(),
            wildcard: pattern.contains('*'),
        }
    }

    pub fn matches(&self, topic: &str) -> bool {
        if !self.wildcard {
            return self.segments.first().map(|s| s == topic).unwrap_or(false);
        }

        let (first, rest) = match self.segments.split_first() {
            Some(parts) => parts,
            None => return true,
        };
        let (last, middle) = match rest.split_last() {
            Some(parts) => parts,
            None => return topic.starts_with(first.as_str()),
        };

        if topic.len() < first.len() + last.len()
            || !topic.starts_with(first.as_str())
            || !topic.ends_with(last.as_str())
        {
            return false;
        }

        let mut remaining = &topic[first.len()..topic.len() - last.len()];
        for segment in middle {
            match remaining.find(segment.as_str()) {
                Some(index) => remaining = &remaining[index + segment.len()..],
                None => return false,
            }
        }
        true
    }
}

struct Subscriber {
    id: u64,
    pattern: TopicPattern,
    sender: mpsc::Sender<Arc<Event>>,
}

struct BusInner {
    subscribers: RwLock<Vec<Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventBusStats {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub subscribers: usize,
}

/// Fan-out publisher with one bounded buffer per subscriber.
///
/// # Examples
/// ```
/// use dagline::events::EventBus;
/// use serde_json::json;
///
/// let bus = EventBus::new(8);
/// let mut errors = bus.subscribe("node.*");
/// bus.publish("node.error", "det", json!({ "error": "boom" }));
/// bus.publish("graph.start", "line", json!({}));
///
/// let event = errors.try_recv().unwrap();
/// assert_eq!(event.source, "det");
/// assert!(errors.try_recv().is_none());
/// ```
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").field("stats", &self.stats()).finish()
    }
}

impl EventBus {
    /// `buffer` is the per-subscriber capacity (minimum 1).
    pub fn new(buffer: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                published: AtomicU64::new(0),
                delivered: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self, pattern: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.inner.buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                pattern: TopicPattern::parse(pattern),
                sender,
            });
        Subscription {
            id,
            receiver,
            bus: Arc::downgrade(&self.inner),
        }
    }

    pub fn publish(&self, topic: &str, source: &str, payload: serde_json::Value) {
        self.publish_event(Event::new(topic, source, payload));
    }

    /// Delivers to every matching subscriber without waiting.
    pub fn publish_event(&self, event: Event) {
        self.inner.published.fetch_add(1, Ordering::Relaxed);
        let subscribers = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let mut shared: Option<Arc<Event>> = None;
        for subscriber in subscribers.iter() {
            if !subscriber.pattern.matches(&event.topic) {
                continue;
            }
            let event = shared.get_or_insert_with(|| Arc::new(event.clone()));
            match subscriber.sender.try_send(Arc::clone(event)) {
                Ok(()) => {
                    self.inner.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    pub fn stats(&self) -> EventBusStats {
        EventBusStats {
            published: self.inner.published.load(Ordering::Relaxed),
            delivered: self.inner.delivered.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
            subscribers: self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .len(),
        }
    }
}

/// Receiving end of a subscription. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<Arc<Event>>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.try_recv().ok()
    }

    /// Everything currently buffered.
    pub fn drain(&mut self) -> Vec<Arc<Event>> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|s| s.id != self.id);
        }
    }
}
