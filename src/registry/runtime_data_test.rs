//! Tests for `InMemoryRuntimeData`.

use serde_json::json;

use super::{InMemoryRuntimeData, RuntimeDataStore};

#[test]
fn update_merges_objects() {
  let s = InMemoryRuntimeData::new();
  s.update("req", "c1", json!({"a": 1, "b": 2}));
  s.update("req", "c1", json!({"b": 3, "c": 4}));
  assert_eq!(s.get("req", "c1"), Some(json!({"a": 1, "b": 3, "c": 4})));
}

#[test]
fn update_replaces_non_objects() {
  let s = InMemoryRuntimeData::new();
  s.update("req", "c1", json!(5));
  s.update("req", "c1", json!({"a": 1}));
  assert_eq!(s.get("req", "c1"), Some(json!({"a": 1})));
}

#[test]
fn scopes_are_isolated_and_clearable() {
  let s = InMemoryRuntimeData::new();
  s.update("req-1", "c1", json!({"a": 1}));
  s.update("req-2", "c1", json!({"a": 2}));
  assert_eq!(s.get("req-1", "c1"), Some(json!({"a": 1})));
  s.clear_scope("req-1");
  assert_eq!(s.get("req-1", "c1"), None);
  assert_eq!(s.get("req-2", "c1"), Some(json!({"a": 2})));
}
