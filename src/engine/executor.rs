// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::ExecutorOptions;
use crate::context::GlobalContext;
use crate::engine::lanes::{spawn_on, CpuLane, Lane};
use crate::engine::metrics::{MetricsSnapshot, QueueDepth, RunMetrics};
use crate::engine::unit::{NodeUnit, UnitExit};
use crate::engine::{CopyManager, EdgeQueue, ExecutorState};
use crate::errors::{ErrorStrategy, ExecutionError, NodeError};
use crate::events::{topics, EventBus};
use crate::graph::validation::{topological_order, validate_topology};
use crate::graph::{Graph, GraphHeader, Topology};
use crate::observability::messages::engine::{
    DrainTimedOut, NodeCleanupFailed, NodeInitializationFailed, RunStarted, RunStopped,
    StateChanged, UnitLost,
};
use crate::observability::messages::graph::{GraphValidated, GraphValidationFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::{Node, RuntimeControl};

type NodeMap = BTreeMap<String, Box<dyn Node>>;

/// Resolved executor options for one run.
#[derive(Debug, Clone)]
pub(crate) struct RunSettings {
    pub strategy: ErrorStrategy,
    pub queue_capacity: usize,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub escalate_on_exhausted_retries: bool,
    pub drain_timeout: Duration,
    pub stall_timeout: Duration,
    pub node_timeout: Option<Duration>,
    pub cpu_workers: usize,
}

impl RunSettings {
    fn resolve(strategy: ErrorStrategy, options: &ExecutorOptions) -> Self {
        Self {
            strategy,
            queue_capacity: options.queue_capacity(),
            max_retries: options.max_retries(),
            retry_backoff: options.retry_backoff(),
            escalate_on_exhausted_retries: options.escalate_on_exhausted_retries(),
            drain_timeout: options.drain_timeout(),
            stall_timeout: options.stall_timeout(),
            node_timeout: options.node_timeout(),
            cpu_workers: options.cpu_workers(),
        }
    }
}

/// State shared between the control surface, the supervisor and every unit.
pub(crate) struct RunShared {
    pub graph_name: String,
    pub state: watch::Sender<ExecutorState>,
    pub paused: watch::Sender<bool>,
    pub in_flight: watch::Sender<usize>,
    pub live_units: watch::Sender<usize>,
    /// Sources stop producing; everything else keeps draining.
    pub sources_stop: CancellationToken,
    /// Every unit leaves its loop as soon as it can.
    pub halt: CancellationToken,
    pub stop_requested: CancellationToken,
    /// Set by the error strategy when a failure must end the run.
    pub fatal: CancellationToken,
    pub last_error: Mutex<Option<ExecutionError>>,
    pub events: EventBus,
    pub globals: GlobalContext,
    pub metrics: RunMetrics,
    pub copy_manager: CopyManager,
    pub nodes: Mutex<Option<NodeMap>>,
    pub queues: Mutex<Vec<(String, EdgeQueue)>>,
    pub cpu_lane: Mutex<Option<CpuLane>>,
    pub started_at: Mutex<Option<Instant>>,
    pub stopped_at: Mutex<Option<Instant>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RunShared {
    /// Moves to `to` if the current state is one of `from`. Returns the state that was replaced.
    fn transition(&self, from: &[ExecutorState], to: ExecutorState) -> Option<ExecutorState> {
        let mut previous = None;
        self.state.send_if_modified(|state| {
            if from.contains(state) {
                previous = Some(*state);
                *state = to;
                true
            } else {
                false
            }
        });
        if let Some(from) = previous {
            StateChanged {
                graph: &self.graph_name,
                from,
                to,
            }
            .log();
            self.events.publish(
                topics::GRAPH_STATE,
                &self.graph_name,
                json!({ "from": from.as_str(), "to": to.as_str() }),
            );
        }
        previous
    }

    fn record_error(&self, error: ExecutionError) {
        let mut last = lock(&self.last_error);
        if last.is_none() {
            *last = Some(error);
        }
    }

    fn uptime(&self) -> Duration {
        match (*lock(&self.started_at), *lock(&self.stopped_at)) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }
}

/// Resolves once `predicate` holds for the watched value. Returns `false` if the sender is gone.
pub(crate) async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, predicate: F) -> bool
where
    F: Fn(&T) -> bool,
{
    loop {
        let done = predicate(&rx.borrow_and_update());
        if done {
            return true;
        }
        if rx.changed().await.is_err() {
            return false;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownMode {
    /// Stop sources, let queued items flow through, then halt.
    Drain,
    /// Halt immediately.
    Halt,
}

/// Streaming executor: one long-lived unit per node, bounded queues on every edge.
///
/// Every control call takes `&self`, so an executor can be shared behind an `Arc` and driven
/// from several tasks. Calls are idempotent where the lifecycle allows it.
///
/// # Examples
/// ```no_run
/// use dagline::config::ExecutorOptions;
/// use dagline::engine::{ExecutorState, StreamingExecutor};
/// use dagline::errors::ErrorStrategy;
/// use dagline::graph::Graph;
///
/// # async fn demo(graph: Graph) -> Result<(), dagline::errors::ExecutionError> {
/// let executor = StreamingExecutor::new(graph, ErrorStrategy::Skip, ExecutorOptions::default());
/// executor.start().await?;
/// executor.pause().await?;
/// executor.resume().await?;
/// executor.stop().await?;
/// assert_eq!(executor.state(), ExecutorState::Stopped);
/// # Ok(())
/// # }
/// ```
pub struct StreamingExecutor {
    header: GraphHeader,
    topology: Arc<Topology>,
    settings: Arc<RunSettings>,
    initial_globals: BTreeMap<String, serde_json::Value>,
    shared: Arc<RunShared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for StreamingExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingExecutor")
            .field("graph", &self.header.name)
            .field("state", &self.state())
            .field("strategy", &self.settings.strategy)
            .finish()
    }
}

impl StreamingExecutor {
    pub fn new(graph: Graph, strategy: ErrorStrategy, options: ExecutorOptions) -> Self {
        let (header, topology, instances) = graph.into_parts();
        let settings = RunSettings::resolve(strategy, &options);
        let (state, _) = watch::channel(ExecutorState::Idle);
        let (paused, _) = watch::channel(false);
        let (in_flight, _) = watch::channel(0usize);
        let (live_units, _) = watch::channel(0usize);

        let shared = RunShared {
            graph_name: header.name.clone(),
            state,
            paused,
            in_flight,
            live_units,
            sources_stop: CancellationToken::new(),
            halt: CancellationToken::new(),
            stop_requested: CancellationToken::new(),
            fatal: CancellationToken::new(),
            last_error: Mutex::new(None),
            events: EventBus::new(options.event_buffer()),
            globals: GlobalContext::new(),
            metrics: RunMetrics::new(topology.node_ids()),
            copy_manager: CopyManager::new(),
            nodes: Mutex::new(Some(instances)),
            queues: Mutex::new(Vec::new()),
            cpu_lane: Mutex::new(None),
            started_at: Mutex::new(None),
            stopped_at: Mutex::new(None),
        };

        Self {
            header,
            topology: Arc::new(topology),
            settings: Arc::new(settings),
            initial_globals: BTreeMap::new(),
            shared: Arc::new(shared),
            supervisor: Mutex::new(None),
        }
    }

    /// Publishes on `events` instead of a private bus. Call before `start`.
    pub fn with_event_bus(mut self, events: EventBus) -> Self {
        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            shared.events = events;
        }
        self
    }

    /// Values written into the global context when a run starts.
    pub fn with_globals(mut self, globals: BTreeMap<String, serde_json::Value>) -> Self {
        self.initial_globals = globals;
        self
    }

    pub fn graph_name(&self) -> &str {
        &self.header.name
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn error_strategy(&self) -> ErrorStrategy {
        self.settings.strategy
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn global_context(&self) -> &GlobalContext {
        &self.shared.globals
    }

    pub fn state(&self) -> ExecutorState {
        *self.shared.state.borrow()
    }

    /// Follows lifecycle transitions.
    pub fn watch_state(&self) -> watch::Receiver<ExecutorState> {
        self.shared.state.subscribe()
    }

    pub fn last_error(&self) -> Option<ExecutionError> {
        lock(&self.shared.last_error).clone()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        let queues = lock(&self.shared.queues)
            .iter()
            .map(|(edge, queue)| QueueDepth {
                edge: edge.clone(),
                depth: queue.len(),
                capacity: queue.capacity(),
            })
            .collect();
        self.shared.metrics.snapshot(
            self.shared.copy_manager.stats(),
            queues,
            self.shared.uptime(),
        )
    }

    /// Validates, initializes every node in dependency order and spawns one unit per node.
    ///
    /// Calling it on a running or paused executor is a no-op. A validation or initialization
    /// failure leaves the executor `Stopped` with the cause in [`Self::last_error`].
    pub async fn start(&self) -> Result<(), ExecutionError> {
        let claimed = self
            .shared
            .transition(&[ExecutorState::Idle], ExecutorState::Starting)
            .is_some();
        if !claimed {
            let state = self.state();
            return match state {
                ExecutorState::Starting
                | ExecutorState::Running
                | ExecutorState::Pausing
                | ExecutorState::Paused => Ok(()),
                _ => Err(ExecutionError::InvalidState {
                    operation: "start",
                    state,
                }),
            };
        }

        if let Err(errors) = validate_topology(&self.topology) {
            GraphValidationFailed {
                graph: &self.header.name,
                errors: &errors,
            }
            .log();
            return self.abort_start(ExecutionError::InvalidGraph { errors });
        }
        let order = match topological_order(&self.topology) {
            Ok(order) => order,
            Err(error) => {
                return self.abort_start(ExecutionError::InvalidGraph {
                    errors: vec![error],
                })
            }
        };
        GraphValidated {
            graph: &self.header.name,
            node_count: self.topology.len(),
            connection_count: self.topology.connections().len(),
        }
        .log();

        let Some(mut nodes) = lock(&self.shared.nodes).take() else {
            return self.abort_start(ExecutionError::Internal {
                message: "node instances are not available".to_string(),
            });
        };

        let cpu_lane = if self.topology.nodes().any(|d| d.cpu_bound) {
            match CpuLane::new(self.settings.cpu_workers) {
                Ok(lane) => Some(lane),
                Err(e) => {
                    *lock(&self.shared.nodes) = Some(nodes);
                    return self.abort_start(ExecutionError::Internal {
                        message: format!("failed to build the cpu lane: {}", e),
                    });
                }
            }
        } else {
            None
        };

        for id in &order {
            let Some(node) = nodes.get_mut(id) else {
                continue;
            };
            if let Err(error) = node.initialize().await {
                NodeInitializationFailed {
                    node_id: id,
                    error: &error,
                }
                .log();
                self.shared.events.publish(
                    topics::NODE_INIT_ERROR,
                    id,
                    json!({ "error": error.to_string() }),
                );
                cleanup_nodes(&self.shared, &mut nodes, &order).await;
                *lock(&self.shared.nodes) = Some(nodes);
                return self.abort_start(ExecutionError::Initialization {
                    node_id: id.clone(),
                    reason: error.to_string(),
                });
            }
        }

        let queues: Vec<EdgeQueue> = self
            .topology
            .connections()
            .iter()
            .map(|c| EdgeQueue::new(c.options.capacity.unwrap_or(self.settings.queue_capacity)))
            .collect();
        *lock(&self.shared.queues) = self
            .topology
            .connections()
            .iter()
            .map(ToString::to_string)
            .zip(queues.iter().cloned())
            .collect();

        for (key, value) in &self.initial_globals {
            self.shared.globals.set(key.clone(), value.clone());
        }

        let cpu_handle = cpu_lane.as_ref().and_then(CpuLane::handle);
        let cpu_workers = cpu_lane.as_ref().map_or(0, CpuLane::workers);
        *lock(&self.shared.cpu_lane) = cpu_lane;
        *lock(&self.shared.started_at) = Some(Instant::now());

        let started = RunStarted {
            graph: &self.header.name,
            node_count: self.topology.len(),
            connection_count: self.topology.connections().len(),
            cpu_workers,
        };
        started.log();
        let run_span = started.span("graph_run");
        self.shared.events.publish(
            topics::GRAPH_START,
            &self.header.name,
            json!({
                "version": self.header.version,
                "node_count": self.topology.len(),
                "connection_count": self.topology.connections().len(),
                "strategy": self.settings.strategy.as_str(),
            }),
        );

        self.shared.live_units.send_replace(order.len());
        self.shared
            .transition(&[ExecutorState::Starting], ExecutorState::Running);

        let mut handles = Vec::with_capacity(order.len());
        for id in &order {
            let Some(node) = nodes.remove(id) else {
                self.shared
                    .live_units
                    .send_modify(|n| *n = n.saturating_sub(1));
                continue;
            };
            let lane = match self.topology.node(id) {
                Some(descriptor) if descriptor.cpu_bound => Lane::Cpu,
                _ => Lane::Primary,
            };
            let unit = NodeUnit::new(
                id,
                node,
                &self.topology,
                &queues,
                Arc::clone(&self.shared),
                Arc::clone(&self.settings),
            );
            let target = match lane {
                Lane::Cpu => cpu_handle.as_ref(),
                Lane::Primary => None,
            };
            handles.push(spawn_on(target, unit.run().instrument(run_span.clone())));
        }

        let supervisor = tokio::spawn(
            supervise(
                Arc::clone(&self.shared),
                order,
                handles,
                self.settings.drain_timeout,
            )
            .instrument(run_span),
        );
        *lock(&self.supervisor) = Some(supervisor);
        Ok(())
    }

    fn abort_start(&self, error: ExecutionError) -> Result<(), ExecutionError> {
        self.shared.record_error(error.clone());
        self.shared.events.publish(
            topics::GRAPH_STOP,
            &self.header.name,
            json!({ "reason": "start failed", "error": error.to_string() }),
        );
        self.shared
            .transition(&[ExecutorState::Starting], ExecutorState::Stopped);
        Err(error)
    }

    /// Stops sources, drains what is queued, cleans up every node. Idempotent.
    ///
    /// Stopping an executor that never started moves it straight to `Stopped`.
    pub async fn stop(&self) -> Result<(), ExecutionError> {
        let mut states = self.shared.state.subscribe();
        loop {
            match self.state() {
                ExecutorState::Idle => {
                    if self
                        .shared
                        .transition(&[ExecutorState::Idle], ExecutorState::Stopped)
                        .is_some()
                    {
                        return Ok(());
                    }
                }
                ExecutorState::Starting => {
                    wait_until(&mut states, |s| *s != ExecutorState::Starting).await;
                }
                ExecutorState::Stopped => {
                    self.join_supervisor().await;
                    return Ok(());
                }
                ExecutorState::Running
                | ExecutorState::Pausing
                | ExecutorState::Paused
                | ExecutorState::Stopping => {
                    self.shared.stop_requested.cancel();
                    wait_until(&mut states, |s| *s == ExecutorState::Stopped).await;
                    self.join_supervisor().await;
                    return Ok(());
                }
            }
        }
    }

    async fn join_supervisor(&self) {
        let handle = lock(&self.supervisor).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                UnitLost {
                    graph: &self.header.name,
                    reason: &format!("supervisor task failed: {}", e),
                }
                .log();
            }
        }
    }

    /// Blocks new invocations and waits for the ones in flight to finish. Queues keep their
    /// contents. Pausing a paused executor is a no-op.
    pub async fn pause(&self) -> Result<(), ExecutionError> {
        match self.state() {
            ExecutorState::Paused | ExecutorState::Pausing => return Ok(()),
            ExecutorState::Running => {}
            state => {
                return Err(ExecutionError::InvalidState {
                    operation: "pause",
                    state,
                })
            }
        }

        self.shared.paused.send_replace(true);
        if self
            .shared
            .transition(&[ExecutorState::Running], ExecutorState::Pausing)
            .is_none()
        {
            // Raced with another control call; report whatever it left behind.
            let state = self.state();
            if state != ExecutorState::Paused && state != ExecutorState::Pausing {
                self.shared.paused.send_replace(false);
                return Err(ExecutionError::InvalidState {
                    operation: "pause",
                    state,
                });
            }
            return Ok(());
        }

        let mut in_flight = self.shared.in_flight.subscribe();
        tokio::select! {
            _ = wait_until(&mut in_flight, |n| *n == 0) => {}
            _ = self.shared.halt.cancelled() => {}
        }
        self.shared
            .transition(&[ExecutorState::Pausing], ExecutorState::Paused);
        Ok(())
    }

    /// Lets units pick up where they left off. Resuming a running executor is a no-op.
    pub async fn resume(&self) -> Result<(), ExecutionError> {
        match self.state() {
            ExecutorState::Running => Ok(()),
            ExecutorState::Paused | ExecutorState::Pausing => {
                self.shared.transition(
                    &[ExecutorState::Paused, ExecutorState::Pausing],
                    ExecutorState::Running,
                );
                self.shared.paused.send_replace(false);
                Ok(())
            }
            state => Err(ExecutionError::InvalidState {
                operation: "resume",
                state,
            }),
        }
    }

    /// Resolves once every unit has left its loop, for example after every source reported
    /// the end of its stream. Resolves immediately when nothing is running.
    pub async fn wait_until_drained(&self) {
        let mut live = self.shared.live_units.subscribe();
        wait_until(&mut live, |n| *n == 0).await;
    }

    /// Hands the graph back once the executor is idle or stopped, so it can be reconfigured and
    /// run again by a new executor.
    pub fn into_graph(self) -> Option<Graph> {
        match self.state() {
            ExecutorState::Idle | ExecutorState::Stopped => {}
            _ => return None,
        }
        let instances = lock(&self.shared.nodes).take()?;
        let topology = Arc::try_unwrap(Arc::clone(&self.topology))
            .unwrap_or_else(|shared| shared.as_ref().clone());
        Some(Graph::from_parts(self.header.clone(), topology, instances))
    }
}

impl Drop for StreamingExecutor {
    fn drop(&mut self) {
        // Let the supervisor wind down a run nobody is going to stop.
        self.shared.stop_requested.cancel();
        self.shared.halt.cancel();
    }
}

async fn supervise(
    shared: Arc<RunShared>,
    order: Vec<String>,
    handles: Vec<JoinHandle<UnitExit>>,
    drain_timeout: Duration,
) {
    let mode = tokio::select! {
        biased;
        _ = shared.fatal.cancelled() => ShutdownMode::Halt,
        _ = shared.stop_requested.cancelled() => ShutdownMode::Drain,
    };

    shared.transition(
        &[
            ExecutorState::Running,
            ExecutorState::Pausing,
            ExecutorState::Paused,
        ],
        ExecutorState::Stopping,
    );
    shared.sources_stop.cancel();
    shared.paused.send_replace(false);

    if mode == ShutdownMode::Drain {
        let mut live = shared.live_units.subscribe();
        let drained = tokio::time::timeout(drain_timeout, wait_until(&mut live, |n| *n == 0)).await;
        if drained.is_err() {
            DrainTimedOut {
                graph: &shared.graph_name,
                timeout: drain_timeout,
                remaining_units: *shared.live_units.borrow(),
            }
            .log();
        }
    }
    shared.halt.cancel();

    let mut nodes = NodeMap::new();
    for handle in handles {
        match handle.await {
            Ok(exit) => {
                nodes.insert(exit.node_id, exit.node);
            }
            Err(e) => {
                let reason = format!("unit task failed: {}", e);
                UnitLost {
                    graph: &shared.graph_name,
                    reason: &reason,
                }
                .log();
                shared.record_error(ExecutionError::Internal { message: reason });
            }
        }
    }

    cleanup_nodes(&shared, &mut nodes, &order).await;
    if let Some(mut lane) = lock(&shared.cpu_lane).take() {
        lane.shutdown();
    }
    shared.globals.clear();
    *lock(&shared.stopped_at) = Some(Instant::now());

    let reason = match mode {
        ShutdownMode::Drain => "stop requested",
        ShutdownMode::Halt => "node failure",
    };
    let duration = shared.uptime();
    let frames = shared.metrics.frames();
    RunStopped {
        graph: &shared.graph_name,
        duration,
        frames,
        reason,
    }
    .log();
    shared.events.publish(
        topics::GRAPH_STOP,
        &shared.graph_name,
        json!({
            "reason": reason,
            "duration_ms": duration.as_millis() as u64,
            "frames": frames,
            "error": lock(&shared.last_error).as_ref().map(ToString::to_string),
        }),
    );

    *lock(&shared.nodes) = Some(nodes);
    shared.transition(&[ExecutorState::Stopping], ExecutorState::Stopped);
}

/// Runs every cleanup hook once, in reverse dependency order. Failures are reported and skipped.
async fn cleanup_nodes(shared: &RunShared, nodes: &mut NodeMap, order: &[String]) {
    for id in order.iter().rev() {
        let Some(node) = nodes.get_mut(id) else {
            continue;
        };
        if let Err(error) = node.cleanup().await {
            report_cleanup_failure(shared, id, &error);
        }
    }
}

fn report_cleanup_failure(shared: &RunShared, node_id: &str, error: &NodeError) {
    NodeCleanupFailed { node_id, error }.log();
    shared.events.publish(
        topics::NODE_CLEANUP_ERROR,
        node_id,
        json!({ "error": error.to_string() }),
    );
}

#[async_trait]
impl RuntimeControl for StreamingExecutor {
    async fn start(&self) -> Result<(), ExecutionError> {
        StreamingExecutor::start(self).await
    }

    async fn stop(&self) -> Result<(), ExecutionError> {
        StreamingExecutor::stop(self).await
    }

    async fn pause(&self) -> Result<(), ExecutionError> {
        StreamingExecutor::pause(self).await
    }

    async fn resume(&self) -> Result<(), ExecutionError> {
        StreamingExecutor::resume(self).await
    }

    fn state(&self) -> ExecutorState {
        StreamingExecutor::state(self)
    }

    fn last_error(&self) -> Option<ExecutionError> {
        StreamingExecutor::last_error(self)
    }

    fn metrics(&self) -> MetricsSnapshot {
        StreamingExecutor::metrics(self)
    }
}
