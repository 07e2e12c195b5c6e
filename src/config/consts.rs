// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Default bounded capacity of an edge queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;
/// Retry attempts after the first failure under the retry strategy
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Linear backoff step between retry attempts
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 100;
/// Budget for draining queued items on graceful stop
pub const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 5_000;
/// Blocked push duration before a stall is reported
pub const DEFAULT_STALL_TIMEOUT_MS: u64 = 2_000;
/// Worker threads of the dedicated CPU lane
pub const DEFAULT_CPU_WORKERS: usize = 2;
/// Per-subscriber event buffer
pub const DEFAULT_EVENT_BUFFER: usize = 1_024;

/// Upper bound accepted for `queue_capacity`, guards against typos that would defeat backpressure
pub const MAX_QUEUE_CAPACITY: usize = 65_536;
/// Upper bound accepted for `cpu_workers`
pub const MAX_CPU_WORKERS: usize = 256;

/// Thread name used by the CPU lane workers
pub const CPU_LANE_THREAD_NAME: &str = "dagline-cpu-lane";
