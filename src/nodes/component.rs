//! The component contract and the kind -> implementation registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::AgentContext;
use crate::error::{FlowError, Result};
use crate::types::{ComponentInstance, Payload};

/// Output key carrying a component's error message.
pub const ERROR_KEY: &str = "_error";

/// A graph node. The scheduler calls [Component::process] once per activation.
///
/// Failures never escape `process`; they are reported through [ERROR_KEY] in the output
/// so one branch's fault cannot abort the whole run.
#[async_trait]
pub trait Component: Send + Sync {
  /// Kind name, matched against [ComponentInstance::name].
  fn kind(&self) -> &str;

  async fn process(&self, input: Payload, config: &ComponentInstance, agent: &AgentContext)
  -> Payload;

  /// Applied by the scheduler before the output leaves the component pipeline.
  fn post_process(&self, output: Payload) -> Payload {
    output
  }
}

/// Builds an output carrying only an error.
pub(crate) fn error_output(err: &FlowError) -> Payload {
  let mut out = Payload::new();
  out.insert(ERROR_KEY.to_string(), Value::String(err.to_string()));
  out
}

/// Reads an unsigned setting that may be given as a number or a numeric string.
pub(crate) fn data_u64(config: &ComponentInstance, key: &str) -> Option<u64> {
  match config.data.get(key)? {
    Value::Number(n) => n
      .as_u64()
      .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

pub(crate) fn data_str<'a>(config: &'a ComponentInstance, key: &str) -> Option<&'a str> {
  config.data.get(key).and_then(Value::as_str)
}

/// Implementations by kind name.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
  kinds: HashMap<String, Arc<dyn Component>>,
}

impl ComponentRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registry with the fork, join, loop and pass-through components.
  pub fn with_builtins() -> Self {
    let mut r = Self::new();
    r.register(Arc::new(super::AsyncNode::new()));
    r.register(Arc::new(super::AwaitNode::new()));
    r.register(Arc::new(super::ForEachNode::new()));
    r.register(Arc::new(super::IdentityNode::new()));
    r.register(Arc::new(super::SleepNode::new()));
    r
  }

  pub fn register(&mut self, component: Arc<dyn Component>) {
    self.kinds.insert(component.kind().to_string(), component);
  }

  pub fn get(&self, kind: &str) -> Result<Arc<dyn Component>> {
    self
      .kinds
      .get(kind)
      .cloned()
      .ok_or_else(|| FlowError::UnknownKind(kind.to_string()))
  }

  pub fn kinds(&self) -> impl Iterator<Item = &str> {
    self.kinds.keys().map(String::as_str)
  }
}
