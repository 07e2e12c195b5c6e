// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test doubles shared by the graph, engine and config tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::NodeConfig;
use crate::context::ExecutionContext;
use crate::errors::{NodeError, PortError};
use crate::traits::{Node, NodeMetadata, NodeResult};
use crate::types::{DataType, Image, PortSet, SharedValue, Value};

fn metadata(type_name: &'static str, cpu_bound: bool) -> NodeMetadata {
    NodeMetadata {
        type_name,
        name: type_name,
        version: "0.0.0",
        description: "test double",
        cpu_bound,
    }
}

/// A value of the given type, used by sources that need to emit something.
pub fn sample_value(data_type: DataType) -> Value {
    match data_type {
        DataType::Image | DataType::Any => Value::Image(Image::zeros(10, 10, 3)),
        DataType::Mask => Value::Mask(Image::zeros(10, 10, 1)),
        DataType::DetectionList => Value::DetectionList(Vec::new()),
        DataType::Number => Value::Number(0.0),
        DataType::Integer => Value::Integer(0),
        DataType::Boolean => Value::Boolean(false),
        DataType::Text => Value::Text(String::new()),
        DataType::Point => Value::Point(crate::types::Point { x: 0.0, y: 0.0 }),
        DataType::Region => Value::Region(crate::types::Region {
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }),
        DataType::Record => Value::Record(Default::default()),
    }
}

/// Shared, inspectable list of everything a sink received.
#[derive(Clone, Default)]
pub struct Recorded(Arc<Mutex<Vec<SharedValue>>>);

impl Recorded {
    pub fn push(&self, value: SharedValue) {
        self.0.lock().unwrap().push(value);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn values(&self) -> Vec<SharedValue> {
        self.0.lock().unwrap().clone()
    }

    pub fn integers(&self) -> Vec<i64> {
        self.values()
            .iter()
            .filter_map(|v| match v.as_ref() {
                Value::Integer(n) => Some(*n),
                _ => None,
            })
            .collect()
    }
}

/// Plain source (`out`) or transform (`in` -> `out`) of one type.
pub struct StubNode {
    data_type: DataType,
    has_input: bool,
    pub config_error: Option<String>,
}

impl StubNode {
    pub fn source(data_type: DataType) -> Self {
        Self {
            data_type,
            has_input: false,
            config_error: None,
        }
    }

    pub fn transform(data_type: DataType) -> Self {
        Self {
            data_type,
            has_input: true,
            config_error: None,
        }
    }
}

#[async_trait]
impl Node for StubNode {
    fn metadata(&self) -> NodeMetadata {
        metadata("stub", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        if self.has_input {
            ports.input("in", self.data_type)?;
        }
        ports.output("out", self.data_type)?;
        Ok(ports)
    }

    fn validate_config(&self) -> Result<(), String> {
        match &self.config_error {
            Some(reason) => Err(reason.clone()),
            None => Ok(()),
        }
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        let value = match ctx.take_input("in") {
            Some(value) => value,
            None => Arc::new(sample_value(self.data_type)),
        };
        NodeResult::success().with_shared_output("out", value)
    }
}

/// Sink on `in` that keeps every value it receives.
pub struct RecordingSink {
    data_type: DataType,
    recorded: Recorded,
}

impl RecordingSink {
    pub fn new(data_type: DataType) -> (Self, Recorded) {
        let recorded = Recorded::default();
        (
            Self {
                data_type,
                recorded: recorded.clone(),
            },
            recorded,
        )
    }
}

#[async_trait]
impl Node for RecordingSink {
    fn metadata(&self) -> NodeMetadata {
        metadata("recording_sink", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", self.data_type)?;
        Ok(ports)
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        if let Some(value) = ctx.take_input("in") {
            self.recorded.push(value);
        }
        NodeResult::success()
    }
}

/// Source on `out`: 10x10x3 black images, or consecutive integers starting at 0.
pub struct CountingSource {
    data_type: DataType,
    count: Arc<AtomicU64>,
    limit: Option<u64>,
    interval: Duration,
}

impl CountingSource {
    pub fn images(limit: Option<u64>) -> (Self, Arc<AtomicU64>) {
        Self::build(DataType::Image, limit)
    }

    pub fn integers(limit: Option<u64>) -> (Self, Arc<AtomicU64>) {
        Self::build(DataType::Integer, limit)
    }

    fn build(data_type: DataType, limit: Option<u64>) -> (Self, Arc<AtomicU64>) {
        let count = Arc::new(AtomicU64::new(0));
        (
            Self {
                data_type,
                count: Arc::clone(&count),
                limit,
                interval: Duration::ZERO,
            },
            count,
        )
    }

    /// Sleeps between frames.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl Node for CountingSource {
    fn metadata(&self) -> NodeMetadata {
        metadata("counting_source", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.output("out", self.data_type)?;
        Ok(ports)
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        let produced = self.count.load(Ordering::SeqCst);
        if self.limit.is_some_and(|limit| produced >= limit) {
            return NodeResult::end_of_stream();
        }
        if !self.interval.is_zero() {
            tokio::time::sleep(self.interval).await;
        }
        let value = match self.data_type {
            DataType::Integer => Value::Integer(produced as i64),
            other => sample_value(other),
        };
        let produced = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        let mut result = NodeResult::success().with_output("out", value);
        result.end_of_stream = self.limit == Some(produced);
        result
    }
}

/// `in` -> `out` that fails every invocation with "boom".
pub struct FailingNode {
    data_type: DataType,
    pub invocations: Arc<AtomicU64>,
}

impl FailingNode {
    pub fn new(data_type: DataType) -> Self {
        Self {
            data_type,
            invocations: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[async_trait]
impl Node for FailingNode {
    fn metadata(&self) -> NodeMetadata {
        metadata("failing", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", self.data_type)?;
        ports.output("out", self.data_type)?;
        Ok(ports)
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        NodeResult::failure("boom")
    }
}

/// `in` -> `out` (any) that fails the first `failures` attempts of every item.
pub struct FlakyNode {
    failures: u32,
}

impl FlakyNode {
    pub fn new(failures: u32) -> Self {
        Self { failures }
    }
}

#[async_trait]
impl Node for FlakyNode {
    fn metadata(&self) -> NodeMetadata {
        metadata("flaky", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        ports.output("out", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        if ctx.attempt() < self.failures {
            return NodeResult::failure(format!("flaky attempt {}", ctx.attempt()));
        }
        match ctx.take_input("in") {
            Some(value) => NodeResult::success().with_shared_output("out", value),
            None => NodeResult::failure("missing input"),
        }
    }
}

/// Image sink that whitens the received frame in place, then records it.
pub struct MutatingSink {
    recorded: Recorded,
}

impl MutatingSink {
    pub fn new() -> (Self, Recorded) {
        let recorded = Recorded::default();
        (
            Self {
                recorded: recorded.clone(),
            },
            recorded,
        )
    }
}

#[async_trait]
impl Node for MutatingSink {
    fn metadata(&self) -> NodeMetadata {
        metadata("mutating_sink", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Image)?;
        Ok(ports)
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        let Some(mut frame) = ctx.take_input("in") else {
            return NodeResult::failure("missing input");
        };
        if let Some(image) = Arc::make_mut(&mut frame).as_image_mut() {
            image.data.fill(255);
        }
        self.recorded.push(frame);
        NodeResult::success()
    }
}

/// Sink that records how many handles to its input exist while it runs.
pub struct RefCountSink {
    counts: Arc<Mutex<Vec<usize>>>,
}

impl RefCountSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<usize>>>) {
        let counts = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                counts: Arc::clone(&counts),
            },
            counts,
        )
    }
}

#[async_trait]
impl Node for RefCountSink {
    fn metadata(&self) -> NodeMetadata {
        metadata("ref_count_sink", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult {
        match ctx.input("in") {
            Some(value) => {
                self.counts.lock().unwrap().push(Arc::strong_count(value));
                NodeResult::success()
            }
            None => NodeResult::failure("missing input"),
        }
    }
}

/// Accepts one reconfiguration and refuses every later one. `bad: true` fails validation.
#[derive(Default)]
pub struct ReconfigureOnce {
    config: NodeConfig,
    reconfigured: bool,
}

#[async_trait]
impl Node for ReconfigureOnce {
    fn metadata(&self) -> NodeMetadata {
        metadata("reconfigure_once", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        Ok(PortSet::new())
    }

    fn config(&self) -> NodeConfig {
        self.config.clone()
    }

    fn validate_config(&self) -> Result<(), String> {
        match self.config.get_bool("bad") {
            Some(true) => Err("bad flag set".to_string()),
            _ => Ok(()),
        }
    }

    fn reconfigure(&mut self, config: NodeConfig) -> Result<(), NodeError> {
        if self.reconfigured {
            return Err(NodeError::Config("already reconfigured".to_string()));
        }
        self.reconfigured = true;
        self.config = config;
        Ok(())
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        NodeResult::success()
    }
}

/// Sink whose first invocation never returns until the run is cancelled.
pub struct StallingSink {
    pub invocations: Arc<AtomicU64>,
}

impl StallingSink {
    pub fn new() -> (Self, Arc<AtomicU64>) {
        let invocations = Arc::new(AtomicU64::new(0));
        (
            Self {
                invocations: Arc::clone(&invocations),
            },
            invocations,
        )
    }
}

#[async_trait]
impl Node for StallingSink {
    fn metadata(&self) -> NodeMetadata {
        metadata("stalling_sink", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, ctx: ExecutionContext) -> NodeResult {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        ctx.cancelled().await;
        NodeResult::failure("cancelled")
    }
}

/// Records `init:<name>` and `cleanup:<name>` into a shared log. Passes `in` to `out`.
///
/// `cleanup` only logs when something was acquired, so a second call releases nothing.
pub struct LifecycleProbe {
    name: &'static str,
    log: Arc<Mutex<Vec<String>>>,
    fail_init: bool,
    acquired: bool,
}

impl LifecycleProbe {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log,
            fail_init: false,
            acquired: false,
        }
    }

    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }
}

#[async_trait]
impl Node for LifecycleProbe {
    fn metadata(&self) -> NodeMetadata {
        metadata("lifecycle_probe", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        ports.optional_output("out", DataType::Any)?;
        Ok(ports)
    }

    async fn initialize(&mut self) -> Result<(), NodeError> {
        self.log.lock().unwrap().push(format!("init:{}", self.name));
        // A failed init may still hold part of what it opened.
        self.acquired = true;
        if self.fail_init {
            return Err(NodeError::Resource("camera busy".to_string()));
        }
        Ok(())
    }

    async fn run(&mut self, mut ctx: ExecutionContext) -> NodeResult {
        match ctx.take_input("in") {
            Some(value) => NodeResult::success().with_shared_output("out", value),
            None => NodeResult::success(),
        }
    }

    async fn cleanup(&mut self) -> Result<(), NodeError> {
        if std::mem::take(&mut self.acquired) {
            self.log.lock().unwrap().push(format!("cleanup:{}", self.name));
        }
        Ok(())
    }
}

/// CPU-bound sink that records the name of the thread each invocation ran on.
pub struct ThreadProbe {
    pub threads: Arc<Mutex<Vec<Option<String>>>>,
}

impl ThreadProbe {
    pub fn new() -> (Self, Arc<Mutex<Vec<Option<String>>>>) {
        let threads = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                threads: Arc::clone(&threads),
            },
            threads,
        )
    }
}

#[async_trait]
impl Node for ThreadProbe {
    fn metadata(&self) -> NodeMetadata {
        metadata("thread_probe", true)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        let name = std::thread::current().name().map(str::to_string);
        self.threads.lock().unwrap().push(name);
        NodeResult::success()
    }
}

/// CPU-bound sink that blocks its thread for `busy` on every invocation.
pub struct BlockingCpuNode {
    busy: Duration,
    pub invocations: Arc<AtomicU64>,
}

impl BlockingCpuNode {
    pub fn new(busy: Duration) -> (Self, Arc<AtomicU64>) {
        let invocations = Arc::new(AtomicU64::new(0));
        (
            Self {
                busy,
                invocations: Arc::clone(&invocations),
            },
            invocations,
        )
    }
}

#[async_trait]
impl Node for BlockingCpuNode {
    fn metadata(&self) -> NodeMetadata {
        metadata("blocking_cpu", true)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        std::thread::sleep(self.busy);
        self.invocations.fetch_add(1, Ordering::SeqCst);
        NodeResult::success()
    }
}

/// Sink that panics on every invocation.
pub struct PanickingNode;

#[async_trait]
impl Node for PanickingNode {
    fn metadata(&self) -> NodeMetadata {
        metadata("panicking", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        panic!("kaboom");
    }
}

/// Sink that sleeps for `delay` without watching for cancellation.
pub struct SlowNode {
    delay: Duration,
}

impl SlowNode {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Node for SlowNode {
    fn metadata(&self) -> NodeMetadata {
        metadata("slow", false)
    }

    fn ports(&self) -> Result<PortSet, PortError> {
        let mut ports = PortSet::new();
        ports.input("in", DataType::Any)?;
        Ok(ports)
    }

    async fn run(&mut self, _ctx: ExecutionContext) -> NodeResult {
        tokio::time::sleep(self.delay).await;
        NodeResult::success()
    }
}
