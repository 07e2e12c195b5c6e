// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::engine::CopyStats;

/// Lock-free counters for one node. Written only by that node's unit.
#[derive(Debug, Default)]
pub struct NodeStats {
    invocations: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    retries: AtomicU64,
    skipped: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl NodeStats {
    pub fn record_success(&self, duration: Duration) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.successes.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    pub fn record_failure(&self, duration: Duration) {
        self.invocations.fetch_add(1, Ordering::Relaxed);
        self.failures.fetch_add(1, Ordering::Relaxed);
        self.record_duration(duration);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duration(&self, duration: Duration) {
        let nanos = duration.as_nanos().min(u64::MAX as u128) as u64;
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    pub fn snapshot(&self, node_id: &str) -> NodeStatsSnapshot {
        let invocations = self.invocations.load(Ordering::Relaxed);
        let failures = self.failures.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        NodeStatsSnapshot {
            node_id: node_id.to_string(),
            invocations,
            successes: self.successes.load(Ordering::Relaxed),
            failures,
            retries: self.retries.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            avg_duration_ms: if invocations == 0 {
                0.0
            } else {
                total as f64 / invocations as f64 / 1_000_000.0
            },
            max_duration_ms: self.max_nanos.load(Ordering::Relaxed) as f64 / 1_000_000.0,
            error_rate: if invocations == 0 {
                0.0
            } else {
                failures as f64 / invocations as f64
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStatsSnapshot {
    pub node_id: String,
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub retries: u64,
    pub skipped: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: f64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    pub edge: String,
    pub depth: usize,
    pub capacity: usize,
}

/// Point-in-time view of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub nodes: Vec<NodeStatsSnapshot>,
    /// Successful source invocations.
    pub frames: u64,
    pub queue_full: u64,
    pub dropped_items: u64,
    pub stalls: u64,
    pub copies: CopyStats,
    pub queues: Vec<QueueDepth>,
    pub uptime_ms: u64,
}

impl MetricsSnapshot {
    pub fn node(&self, node_id: &str) -> Option<&NodeStatsSnapshot> {
        self.nodes.iter().find(|n| n.node_id == node_id)
    }

    /// Frames per second over the uptime.
    pub fn throughput(&self) -> f64 {
        if self.uptime_ms == 0 {
            0.0
        } else {
            self.frames as f64 * 1000.0 / self.uptime_ms as f64
        }
    }
}

/// Run-wide counters shared by all units.
#[derive(Debug, Default)]
pub struct RunMetrics {
    nodes: BTreeMap<String, Arc<NodeStats>>,
    frames: AtomicU64,
    queue_full: AtomicU64,
    dropped_items: AtomicU64,
    stalls: AtomicU64,
}

impl RunMetrics {
    pub fn new<'a>(node_ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            nodes: node_ids
                .into_iter()
                .map(|id| (id.to_string(), Arc::new(NodeStats::default())))
                .collect(),
            ..Default::default()
        }
    }

    pub fn node(&self, node_id: &str) -> Arc<NodeStats> {
        self.nodes.get(node_id).cloned().unwrap_or_default()
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn record_queue_full(&self) {
        self.queue_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped_items.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stall(&self) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self, copies: CopyStats, queues: Vec<QueueDepth>, uptime: Duration) -> MetricsSnapshot {
        MetricsSnapshot {
            nodes: self
                .nodes
                .iter()
                .map(|(id, stats)| stats.snapshot(id))
                .collect(),
            frames: self.frames.load(Ordering::Relaxed),
            queue_full: self.queue_full.load(Ordering::Relaxed),
            dropped_items: self.dropped_items.load(Ordering::Relaxed),
            stalls: self.stalls.load(Ordering::Relaxed),
            copies,
            queues,
            uptime_ms: uptime.as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_stats_snapshot() {
        let stats = NodeStats::default();
        stats.record_success(Duration::from_millis(2));
        stats.record_success(Duration::from_millis(4));
        stats.record_failure(Duration::from_millis(6));
        stats.record_retry();
        stats.record_skip();

        let snapshot = stats.snapshot("det");
        assert_eq!(snapshot.invocations, 3);
        assert_eq!(snapshot.successes, 2);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.retries, 1);
        assert_eq!(snapshot.skipped, 1);
        assert!((snapshot.avg_duration_ms - 4.0).abs() < 1e-9);
        assert!((snapshot.max_duration_ms - 6.0).abs() < 1e-9);
        assert!((snapshot.error_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_run_snapshot_lists_nodes_in_id_order() {
        let metrics = RunMetrics::new(["det", "cam"]);
        metrics.record_frame();
        metrics.record_frame();
        metrics.node("cam").record_success(Duration::from_millis(1));

        let snapshot = metrics.snapshot(CopyStats::default(), Vec::new(), Duration::from_secs(1));
        let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["cam", "det"]);
        assert_eq!(snapshot.node("cam").unwrap().invocations, 1);
        assert_eq!(snapshot.frames, 2);
        assert!((snapshot.throughput() - 2.0).abs() < 1e-9);
    }
}
