//! Runtime data: per-component scratch state surviving repeated scheduler invocations.

use dashmap::DashMap;
use serde_json::Value;

/// Persisted scratch state, keyed by a run scope and a component id.
///
/// The scope is the workflow request id, so concurrent top-level runs of the same agent
/// never share a component's state.
pub trait RuntimeDataStore: Send + Sync {
  fn get(&self, scope: &str, component_id: &str) -> Option<Value>;

  /// Shallow-merges `patch` into the stored object (replaces it if either is not an object).
  fn update(&self, scope: &str, component_id: &str, patch: Value);

  /// Drops all state of a scope.
  fn clear_scope(&self, scope: &str);
}

/// In-process [RuntimeDataStore].
#[derive(Default)]
pub struct InMemoryRuntimeData {
  entries: DashMap<(String, String), Value>,
}

impl InMemoryRuntimeData {
  pub fn new() -> Self {
    Self::default()
  }
}

impl RuntimeDataStore for InMemoryRuntimeData {
  fn get(&self, scope: &str, component_id: &str) -> Option<Value> {
    self
      .entries
      .get(&(scope.to_string(), component_id.to_string()))
      .map(|v| v.clone())
  }

  fn update(&self, scope: &str, component_id: &str, patch: Value) {
    let mut slot = self
      .entries
      .entry((scope.to_string(), component_id.to_string()))
      .or_insert(Value::Null);
    match (slot.value_mut(), patch) {
      (Value::Object(current), Value::Object(patch)) => {
        for (k, v) in patch {
          current.insert(k, v);
        }
      }
      (current, patch) => *current = patch,
    }
  }

  fn clear_scope(&self, scope: &str) {
    self.entries.retain(|(s, _), _| s != scope);
  }
}
