// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::GlobalContext;
use crate::events::EventBus;
use crate::types::SharedValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Everything a node sees for one invocation.
///
/// Input values are reference counted. A node that wants to edit an input in place takes it with
/// [`ExecutionContext::take_input`] and calls [`Arc::make_mut`]; the node must not keep inputs
/// beyond the call.
pub struct ExecutionContext {
    node_id: Arc<str>,
    inputs: HashMap<String, SharedValue>,
    globals: GlobalContext,
    events: EventBus,
    execution_id: Option<Arc<str>>,
    attempt: u32,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    pub fn new(
        node_id: impl Into<Arc<str>>,
        inputs: HashMap<String, SharedValue>,
        globals: GlobalContext,
        events: EventBus,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            inputs,
            globals,
            events,
            execution_id: None,
            attempt: 0,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_execution_id(mut self, execution_id: Option<Arc<str>>) -> Self {
        self.execution_id = execution_id;
        self
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn input(&self, port: &str) -> Option<&SharedValue> {
        self.inputs.get(port)
    }

    pub fn take_input(&mut self, port: &str) -> Option<SharedValue> {
        self.inputs.remove(port)
    }

    pub fn inputs(&self) -> &HashMap<String, SharedValue> {
        &self.inputs
    }

    pub fn globals(&self) -> &GlobalContext {
        &self.globals
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Correlates the invocations that belong to one logical frame.
    pub fn execution_id(&self) -> Option<&str> {
        self.execution_id.as_deref()
    }

    /// Zero for the first attempt, incremented on every retry.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the run is being torn down. Long running nodes should select on this.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancellation.cancelled()
    }

    /// Publishes a node-scoped event.
    pub fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.events.publish(topic, &self.node_id, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use serde_json::json;

    #[test]
    fn test_take_input_removes_value() {
        let mut inputs = HashMap::new();
        inputs.insert("value".to_string(), Arc::new(Value::Integer(4)));
        let mut ctx = ExecutionContext::new("sum", inputs, GlobalContext::new(), EventBus::new(4))
            .with_execution_id(Some(Arc::from("frame-7")));

        assert_eq!(ctx.execution_id(), Some("frame-7"));
        assert!(ctx.input("value").is_some());
        let value = ctx.take_input("value").unwrap();
        assert_eq!(*value, Value::Integer(4));
        assert!(ctx.input("value").is_none());
    }

    #[test]
    fn test_emit_uses_node_id_as_source() {
        let bus = EventBus::new(4);
        let mut sub = bus.subscribe("custom.*");
        let ctx = ExecutionContext::new("cam", HashMap::new(), GlobalContext::new(), bus);
        ctx.emit("custom.exposure", json!({ "ms": 4 }));
        assert_eq!(sub.try_recv().unwrap().source, "cam");
    }

    #[test]
    fn test_cancellation_is_visible() {
        let token = CancellationToken::new();
        let ctx = ExecutionContext::new("cam", HashMap::new(), GlobalContext::new(), EventBus::new(4))
            .with_cancellation(token.clone());
        assert!(!ctx.is_cancelled());
        token.cancel();
        assert!(ctx.is_cancelled());
    }
}
