//! Tests for `IdentityNode` and `SleepNode`.

use std::time::Duration;

use serde_json::{Value, json};

use super::{Component, ComponentRegistry, IdentityNode, SleepNode};
use crate::agent::AgentContext;
use crate::error::FlowError;
use crate::types::{AgentGraph, ComponentInstance, Payload};

fn agent() -> AgentContext {
  AgentContext::new("agent-1", AgentGraph::new("id", vec![], vec![]))
}

fn payload(v: Value) -> Payload {
  match v {
    Value::Object(map) => map,
    _ => panic!("expected object"),
  }
}

#[tokio::test]
async fn forwards_input_unchanged() {
  let config = ComponentInstance::new("id", "Identity");
  let out = IdentityNode::new()
    .process(payload(json!({"a": 1, "b": [2]})), &config, &agent())
    .await;
  assert_eq!(Value::Object(out), json!({"a": 1, "b": [2]}));
}

#[tokio::test]
async fn applies_renames() {
  let config =
    ComponentInstance::new("id", "Identity").with_data("rename", json!({"a": "Out", "zz": "y"}));
  let out = IdentityNode::new()
    .process(payload(json!({"a": 1, "b": 2})), &config, &agent())
    .await;
  assert_eq!(Value::Object(out), json!({"Out": 1, "b": 2}));
}

#[tokio::test(start_paused = true)]
async fn sleep_delays_then_forwards() {
  let config = ComponentInstance::new("s", "Sleep").with_data("delay_ms", json!(250));
  let started = tokio::time::Instant::now();
  let out = SleepNode::new()
    .process(payload(json!({"x": true})), &config, &agent())
    .await;
  assert!(started.elapsed() >= Duration::from_millis(250));
  assert_eq!(Value::Object(out), json!({"x": true}));
}

#[test]
fn builtins_are_registered_by_kind() {
  let registry = ComponentRegistry::with_builtins();
  let mut kinds: Vec<&str> = registry.kinds().collect();
  kinds.sort();
  assert_eq!(kinds, vec!["Async", "Await", "ForEach", "Identity", "Sleep"]);
  assert_eq!(registry.get("Await").unwrap().kind(), "Await");
  assert!(matches!(
    registry.get("Nope"),
    Err(FlowError::UnknownKind(k)) if k == "Nope"
  ));
}
