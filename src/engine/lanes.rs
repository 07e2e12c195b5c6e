// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

use crate::config::consts::CPU_LANE_THREAD_NAME;

/// Where a node unit is scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    /// The runtime that called `start`.
    Primary,
    /// The dedicated worker pool for CPU-heavy nodes.
    Cpu,
}

/// Dedicated multi-thread runtime for CPU-bound nodes.
///
/// A slow CPU-bound node only ever occupies these workers, so capture and display nodes on the
/// primary runtime keep being scheduled. The runtime is shut down in the background on drop,
/// which is safe from inside async code.
pub struct CpuLane {
    runtime: Option<Runtime>,
    workers: usize,
}

impl CpuLane {
    pub fn new(workers: usize) -> std::io::Result<Self> {
        let workers = workers.max(1);
        let runtime = Builder::new_multi_thread()
            .worker_threads(workers)
            .thread_name(CPU_LANE_THREAD_NAME)
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Some(runtime),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn handle(&self) -> Option<Handle> {
        self.runtime.as_ref().map(|rt| rt.handle().clone())
    }

    pub fn shutdown(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for CpuLane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawns `future` on the CPU lane when one is given, otherwise on the current runtime.
pub(crate) fn spawn_on<F>(cpu: Option<&Handle>, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match cpu {
        Some(handle) => handle.spawn(future),
        None => tokio::spawn(future),
    }
}
