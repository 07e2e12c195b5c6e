// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One long-lived worker per node.
//!
//! A unit owns its node instance for the duration of a run. Each turn of its loop gathers one
//! value per required input (sources are simply invoked again), runs the node under the pause
//! gate, applies the error strategy and delivers the outputs downstream. When the loop ends the
//! unit closes its edges so neighbours observe the end of the stream, and hands the node back to
//! the supervisor for cleanup.

use futures::future::select_all;
use futures::FutureExt;
use serde_json::json;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

use crate::engine::executor::{wait_until, RunSettings, RunShared};
use crate::engine::metrics::NodeStats;
use crate::engine::{Distribution, EdgeQueue, Packet, PushError, QueuePolicy};
use crate::context::ExecutionContext;
use crate::errors::ErrorStrategy;
use crate::events::topics;
use crate::graph::Topology;
use crate::observability::messages::node::{
    NodeInvocationFailed, NodeRetryScheduled, OutputContractViolated, UnitFinished,
};
use crate::observability::messages::queue::{QueueFull, QueueStalled};
use crate::observability::messages::StructuredLog;
use crate::traits::{Node, NodeResult};
use crate::types::{PortSpec, SharedValue};

/// What a finished unit hands back to the supervisor.
pub(crate) struct UnitExit {
    pub node_id: String,
    pub node: Box<dyn Node>,
}

struct InputSlot {
    port: String,
    required: bool,
    queue: EdgeQueue,
}

struct OutputEdge {
    label: String,
    queue: EdgeQueue,
    policy: QueuePolicy,
    open: bool,
}

struct OutputSlot {
    spec: PortSpec,
    edges: Vec<OutputEdge>,
}

enum Gathered {
    Ready(HashMap<String, SharedValue>, Option<Arc<str>>),
    /// Every upstream producer is done and nothing is left to read.
    Exhausted,
    Halted,
}

enum Step {
    Deliver(NodeResult),
    Skipped,
    Finish(&'static str),
}

enum PushOutcome {
    Delivered,
    Dropped,
    Closed,
    Halted,
}

/// Holds one slot in the in-flight counter that `pause` waits on.
struct InFlight {
    shared: Arc<RunShared>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.shared
            .in_flight
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}

pub(crate) struct NodeUnit {
    node_id: Arc<str>,
    node: Box<dyn Node>,
    inputs: Vec<InputSlot>,
    outputs: Vec<OutputSlot>,
    is_source: bool,
    has_consumers: bool,
    shared: Arc<RunShared>,
    settings: Arc<RunSettings>,
    stats: Arc<NodeStats>,
    sequence: u64,
}

impl NodeUnit {
    /// Wires a node to the queues of its connections. `queues` is indexed like
    /// [`Topology::connections`].
    pub(crate) fn new(
        node_id: &str,
        node: Box<dyn Node>,
        topology: &Topology,
        queues: &[EdgeQueue],
        shared: Arc<RunShared>,
        settings: Arc<RunSettings>,
    ) -> Self {
        let mut inputs = Vec::new();
        let mut outputs = Vec::new();

        if let Some(descriptor) = topology.node(node_id) {
            for spec in descriptor.ports.inputs() {
                let bound = topology
                    .incoming(node_id)
                    .find(|(_, c)| c.to_port == spec.name);
                if let Some((index, _)) = bound {
                    inputs.push(InputSlot {
                        port: spec.name.clone(),
                        required: spec.required,
                        queue: queues[index].clone(),
                    });
                }
            }
            for spec in descriptor.ports.outputs() {
                let edges = topology
                    .outgoing(node_id, &spec.name)
                    .map(|(index, c)| OutputEdge {
                        label: c.to_string(),
                        queue: queues[index].clone(),
                        policy: c.options.policy,
                        open: true,
                    })
                    .collect();
                outputs.push(OutputSlot {
                    spec: spec.clone(),
                    edges,
                });
            }
        }

        let has_consumers = outputs.iter().any(|o| !o.edges.is_empty());
        let stats = shared.metrics.node(node_id);
        Self {
            node_id: Arc::from(node_id),
            is_source: inputs.is_empty(),
            node,
            inputs,
            outputs,
            has_consumers,
            shared,
            settings,
            stats,
            sequence: 0,
        }
    }

    pub(crate) async fn run(mut self) -> UnitExit {
        let reason = loop {
            // Keeps a producer whose pushes never block from monopolizing its worker.
            tokio::task::yield_now().await;

            let (inputs, execution_id) = if self.is_source {
                if self.shared.sources_stop.is_cancelled() || self.shared.halt.is_cancelled() {
                    break "source stopped";
                }
                self.sequence += 1;
                let execution_id: Arc<str> = Arc::from(format!("{}-{}", self.node_id, self.sequence));
                (HashMap::new(), Some(execution_id))
            } else {
                match self.gather().await {
                    Gathered::Ready(inputs, execution_id) => (inputs, execution_id),
                    Gathered::Exhausted => break "inputs exhausted",
                    Gathered::Halted => break "halted",
                }
            };

            match self.execute(inputs, execution_id.clone()).await {
                Step::Deliver(result) => {
                    if self.is_source {
                        self.shared.metrics.record_frame();
                    }
                    let end_of_stream = result.end_of_stream;
                    if !self.deliver(result, execution_id).await {
                        break "halted";
                    }
                    if end_of_stream {
                        break "end of stream";
                    }
                    if self.has_consumers && !self.any_consumer_open() {
                        break "consumers gone";
                    }
                }
                Step::Skipped => {}
                Step::Finish(reason) => break reason,
            }
        };

        self.close_edges();
        let snapshot = self.stats.snapshot(&self.node_id);
        UnitFinished {
            node_id: &self.node_id,
            reason,
            invocations: snapshot.invocations,
        }
        .log();
        self.shared
            .live_units
            .send_modify(|n| *n = n.saturating_sub(1));

        UnitExit {
            node_id: self.node_id.to_string(),
            node: self.node,
        }
    }

    async fn gather(&self) -> Gathered {
        let halt = &self.shared.halt;
        let mut paused = self.shared.paused.subscribe();
        let mut values = HashMap::new();
        let mut execution_id = None;

        if self.inputs.iter().any(|slot| slot.required) {
            for slot in self.inputs.iter().filter(|slot| slot.required) {
                let Some(packet) = self.pop_while_running(&slot.queue).await else {
                    return Gathered::Halted;
                };
                match packet {
                    Some(packet) => {
                        if execution_id.is_none() {
                            execution_id = packet.execution_id.clone();
                        }
                        values.insert(slot.port.clone(), packet.value);
                    }
                    None => return Gathered::Exhausted,
                }
            }
        } else {
            // Only optional inputs: run as soon as any of them has a value.
            let mut open: Vec<&InputSlot> = self
                .inputs
                .iter()
                .filter(|slot| !slot.queue.is_exhausted())
                .collect();
            loop {
                if open.is_empty() {
                    return Gathered::Exhausted;
                }
                if !self.wait_for_resume(&mut paused).await {
                    return Gathered::Halted;
                }
                let pops = open.iter().copied().map(|slot| Box::pin(slot.queue.pop()));
                let (packet, index, _) = tokio::select! {
                    biased;
                    _ = halt.cancelled() => return Gathered::Halted,
                    _ = wait_until(&mut paused, |p| *p) => continue,
                    ready = select_all(pops) => ready,
                };
                match packet {
                    Some(packet) => {
                        execution_id = packet.execution_id.clone();
                        values.insert(open[index].port.clone(), packet.value);
                        break;
                    }
                    None => {
                        open.remove(index);
                    }
                }
            }
        }

        for slot in self.inputs.iter().filter(|slot| !slot.required) {
            if values.contains_key(&slot.port) {
                continue;
            }
            if let Some(packet) = slot.queue.try_pop() {
                values.insert(slot.port.clone(), packet.value);
            }
        }

        Gathered::Ready(values, execution_id)
    }

    fn may_retry(&self, attempt: u32) -> bool {
        self.settings.strategy == ErrorStrategy::Retry && attempt < self.settings.max_retries
    }

    /// Pops from `queue`, but never while the run is paused. `None` once the run is halted.
    async fn pop_while_running(&self, queue: &EdgeQueue) -> Option<Option<Packet>> {
        let mut paused = self.shared.paused.subscribe();
        loop {
            if !self.wait_for_resume(&mut paused).await {
                return None;
            }
            tokio::select! {
                biased;
                _ = self.shared.halt.cancelled() => return None,
                _ = wait_until(&mut paused, |p| *p) => continue,
                packet = queue.pop() => return Some(packet),
            }
        }
    }

    /// False once the run is halted.
    async fn wait_for_resume(&self, paused: &mut watch::Receiver<bool>) -> bool {
        tokio::select! {
            biased;
            _ = self.shared.halt.cancelled() => false,
            _ = wait_until(paused, |p| !*p) => !self.shared.halt.is_cancelled(),
        }
    }

    /// Blocks while the run is paused. Returns `None` once the run is halted.
    async fn enter_invocation(&self) -> Option<InFlight> {
        loop {
            if self.shared.halt.is_cancelled() {
                return None;
            }
            // Count first, then look at the flag; `pause` sets the flag first, then waits for
            // the count to reach zero, so no invocation slips past a completed pause.
            self.shared.in_flight.send_modify(|n| *n += 1);
            let guard = InFlight {
                shared: Arc::clone(&self.shared),
            };
            if !*self.shared.paused.borrow() {
                return Some(guard);
            }
            drop(guard);

            let mut paused = self.shared.paused.subscribe();
            tokio::select! {
                biased;
                _ = self.shared.halt.cancelled() => return None,
                _ = wait_until(&mut paused, |p| !*p) => {}
            }
        }
    }

    async fn execute(
        &mut self,
        inputs: HashMap<String, SharedValue>,
        execution_id: Option<Arc<str>>,
    ) -> Step {
        let mut inputs = Some(inputs);
        let mut attempt = 0u32;
        loop {
            let Some(guard) = self.enter_invocation().await else {
                return Step::Finish("halted");
            };
            if self.is_source && self.shared.sources_stop.is_cancelled() {
                return Step::Finish("source stopped");
            }

            self.emit(
                topics::NODE_START,
                json!({ "execution_id": execution_id.as_deref(), "attempt": attempt }),
            );
            // Keep a handle only while another attempt could need the same input set; otherwise
            // the node becomes the sole owner and `Arc::make_mut` edits in place.
            let attempt_inputs = if self.may_retry(attempt) {
                inputs.clone()
            } else {
                inputs.take()
            }
            .unwrap_or_default();
            let ctx = ExecutionContext::new(
                Arc::clone(&self.node_id),
                attempt_inputs,
                self.shared.globals.clone(),
                self.shared.events.clone(),
            )
            .with_execution_id(execution_id.clone())
            .with_attempt(attempt)
            .with_cancellation(self.shared.halt.clone());

            let started = Instant::now();
            let mut result = self.invoke(ctx).await;
            let elapsed = started.elapsed();
            drop(guard);

            // A result produced while the run was being torn down is neither a success nor a
            // failure.
            if self.shared.halt.is_cancelled() {
                return Step::Finish("halted");
            }
            if result.duration.is_none() {
                result.duration = Some(elapsed);
            }

            let failure = if result.success {
                self.check_outputs(&result).err()
            } else {
                Some(
                    result
                        .error
                        .clone()
                        .unwrap_or_else(|| "node reported failure without a reason".to_string()),
                )
            };

            let Some(reason) = failure else {
                self.stats.record_success(elapsed);
                self.emit(
                    topics::NODE_COMPLETE,
                    json!({
                        "execution_id": execution_id.as_deref(),
                        "attempt": attempt,
                        "duration_ms": elapsed.as_secs_f64() * 1000.0,
                    }),
                );
                return Step::Deliver(result);
            };

            self.stats.record_failure(elapsed);
            let strategy = self.settings.strategy;
            NodeInvocationFailed {
                node_id: &self.node_id,
                attempt,
                strategy: strategy.as_str(),
                error: &reason,
            }
            .log();
            self.emit(
                topics::NODE_ERROR,
                json!({
                    "execution_id": execution_id.as_deref(),
                    "attempt": attempt,
                    "error": reason,
                    "strategy": strategy.as_str(),
                }),
            );

            match strategy {
                ErrorStrategy::Skip => {
                    self.stats.record_skip();
                    return Step::Skipped;
                }
                ErrorStrategy::CircuitBreak => {
                    self.trip(reason);
                    return Step::Finish("circuit broken");
                }
                ErrorStrategy::Retry if attempt < self.settings.max_retries => {
                    attempt += 1;
                    let backoff = self.settings.retry_backoff * attempt;
                    self.stats.record_retry();
                    NodeRetryScheduled {
                        node_id: &self.node_id,
                        attempt,
                        max_retries: self.settings.max_retries,
                        backoff,
                    }
                    .log();
                    self.emit(
                        topics::NODE_RETRY,
                        json!({
                            "execution_id": execution_id.as_deref(),
                            "attempt": attempt,
                            "max_retries": self.settings.max_retries,
                            "backoff_ms": backoff.as_millis() as u64,
                        }),
                    );
                    tokio::select! {
                        biased;
                        _ = self.shared.halt.cancelled() => return Step::Finish("halted"),
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
                ErrorStrategy::Retry => {
                    if self.settings.escalate_on_exhausted_retries {
                        self.trip(format!(
                            "{} (gave up after {} retries)",
                            reason, self.settings.max_retries
                        ));
                        return Step::Finish("circuit broken");
                    }
                    self.stats.record_skip();
                    return Step::Skipped;
                }
            }
        }
    }

    /// Runs the node once, turning a panic or a timeout into a failed result.
    async fn invoke(&mut self, ctx: ExecutionContext) -> NodeResult {
        let call = AssertUnwindSafe(self.node.run(ctx)).catch_unwind();
        let outcome = match self.settings.node_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => return NodeResult::failure(format!("timed out after {:?}", limit)),
            },
            None => call.await,
        };
        outcome.unwrap_or_else(|panic| {
            NodeResult::failure(format!("node panicked: {}", panic_message(panic.as_ref())))
        })
    }

    /// A successful result must fill every required output with a compatible value and must
    /// not invent ports.
    fn check_outputs(&self, result: &NodeResult) -> Result<(), String> {
        let violation = self.find_output_violation(result);
        if let Some(reason) = &violation {
            OutputContractViolated {
                node_id: &self.node_id,
                reason,
            }
            .log();
        }
        violation.map_or(Ok(()), Err)
    }

    fn find_output_violation(&self, result: &NodeResult) -> Option<String> {
        for (port, value) in &result.outputs {
            let Some(slot) = self.outputs.iter().find(|o| o.spec.name == *port) else {
                return Some(format!("produced undeclared output '{}'", port));
            };
            if !value.data_type().flows_into(slot.spec.data_type) {
                return Some(format!(
                    "output '{}' declared {} but produced {}",
                    port,
                    slot.spec.data_type,
                    value.data_type()
                ));
            }
        }
        if result.end_of_stream && result.outputs.is_empty() {
            return None;
        }
        self.outputs
            .iter()
            .find(|o| o.spec.required && !result.outputs.contains_key(&o.spec.name))
            .map(|o| format!("missing required output '{}'", o.spec.name))
    }

    fn trip(&self, reason: String) {
        {
            let mut last = self
                .shared
                .last_error
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            if last.is_none() {
                *last = Some(crate::errors::ExecutionError::NodeFailed {
                    node_id: self.node_id.to_string(),
                    reason,
                });
            }
        }
        self.shared.sources_stop.cancel();
        self.shared.fatal.cancel();
    }

    /// Returns `false` if the run was halted while a push was blocked.
    async fn deliver(&mut self, mut result: NodeResult, execution_id: Option<Arc<str>>) -> bool {
        for slot_index in 0..self.outputs.len() {
            let port = self.outputs[slot_index].spec.name.clone();
            let Some(value) = result.outputs.remove(&port) else {
                continue;
            };
            let open: Vec<usize> = self.outputs[slot_index]
                .edges
                .iter()
                .enumerate()
                .filter(|(_, edge)| edge.open)
                .map(|(i, _)| i)
                .collect();

            let declared = self.outputs[slot_index].spec.data_type;
            let (handles, how) = self
                .shared
                .copy_manager
                .distribute(value, declared, open.len());
            if let Distribution::DeepCopied {
                consumers,
                copies,
                bytes,
            } = how
            {
                self.emit(
                    topics::BRANCH_COPY,
                    json!({
                        "port": port,
                        "consumers": consumers,
                        "copies": copies,
                        "bytes": bytes,
                    }),
                );
            }

            for (edge_index, handle) in open.into_iter().zip(handles) {
                let packet = Packet::new(handle, execution_id.clone());
                let outcome = self
                    .push(&self.outputs[slot_index].edges[edge_index], packet)
                    .await;
                match outcome {
                    PushOutcome::Delivered | PushOutcome::Dropped => {}
                    PushOutcome::Closed => self.outputs[slot_index].edges[edge_index].open = false,
                    PushOutcome::Halted => return false,
                }
            }
        }
        true
    }

    async fn push(&self, edge: &OutputEdge, packet: Packet) -> PushOutcome {
        match edge.policy {
            QueuePolicy::Block => {
                let mut packet = packet;
                let mut reported = false;
                loop {
                    match edge.queue.try_push(packet) {
                        Ok(()) => return PushOutcome::Delivered,
                        Err(PushError::Closed(_)) => return PushOutcome::Closed,
                        Err(PushError::Full(returned)) => {
                            packet = returned;
                            if !reported {
                                reported = true;
                                self.report_full(edge, false);
                            }
                            let waited = Instant::now();
                            tokio::select! {
                                biased;
                                _ = self.shared.halt.cancelled() => return PushOutcome::Halted,
                                ready = tokio::time::timeout(
                                    self.settings.stall_timeout,
                                    edge.queue.space_available(),
                                ) => {
                                    if ready.is_err() {
                                        self.report_stall(edge, waited.elapsed());
                                    }
                                }
                            }
                        }
                    }
                }
            }
            QueuePolicy::DropNewest => match edge.queue.try_push(packet) {
                Ok(()) => PushOutcome::Delivered,
                Err(PushError::Closed(_)) => PushOutcome::Closed,
                Err(PushError::Full(_)) => {
                    self.report_full(edge, true);
                    PushOutcome::Dropped
                }
            },
            QueuePolicy::DropOldest => match edge.queue.push_evicting(packet) {
                Ok(None) => PushOutcome::Delivered,
                Ok(Some(_)) => {
                    self.report_full(edge, true);
                    PushOutcome::Dropped
                }
                Err(_) => PushOutcome::Closed,
            },
        }
    }

    fn report_full(&self, edge: &OutputEdge, dropped: bool) {
        let policy = match edge.policy {
            QueuePolicy::Block => "block",
            QueuePolicy::DropOldest => "drop-oldest",
            QueuePolicy::DropNewest => "drop-newest",
        };
        self.shared.metrics.record_queue_full();
        if dropped {
            self.shared.metrics.record_dropped();
        }
        QueueFull {
            edge: &edge.label,
            capacity: edge.queue.capacity(),
            policy,
        }
        .log();
        self.emit(
            topics::QUEUE_FULL,
            json!({
                "edge": edge.label,
                "capacity": edge.queue.capacity(),
                "policy": policy,
                "dropped": dropped,
            }),
        );
    }

    fn report_stall(&self, edge: &OutputEdge, waited: std::time::Duration) {
        self.shared.metrics.record_stall();
        QueueStalled {
            edge: &edge.label,
            capacity: edge.queue.capacity(),
            waited,
        }
        .log();
        self.emit(
            topics::QUEUE_STALL,
            json!({
                "edge": edge.label,
                "capacity": edge.queue.capacity(),
                "waited_ms": waited.as_millis() as u64,
            }),
        );
    }

    fn any_consumer_open(&self) -> bool {
        self.outputs
            .iter()
            .flat_map(|o| o.edges.iter())
            .any(|edge| edge.open)
    }

    fn close_edges(&self) {
        for edge in self.outputs.iter().flat_map(|o| o.edges.iter()) {
            edge.queue.close_producer();
        }
        for slot in &self.inputs {
            slot.queue.close_consumer();
        }
    }

    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.shared.events.publish(topic, &self.node_id, payload);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
