//! Iteration cursor of a ForEach component, persisted between scheduler invocations.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;

/// Output keys starting with this prefix are internal bookkeeping, not user data.
pub(crate) const BOOKKEEPING_PREFIX: char = '_';

pub(crate) fn is_bookkeeping(key: &str) -> bool {
  key.starts_with(BOOKKEEPING_PREFIX)
}

/// Shape of the final `Result` of a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResultFormat {
  /// Array of per-item results, as accumulated.
  #[default]
  Full,
  /// Per-item results with bookkeeping fields removed.
  Minimal,
  /// All non-bookkeeping values of all items, flattened into one array.
  ResultsArray,
}

impl ResultFormat {
  pub fn parse(s: &str) -> Self {
    match s.trim().to_ascii_lowercase().as_str() {
      "minimal" => ResultFormat::Minimal,
      "results-array" => ResultFormat::ResultsArray,
      _ => ResultFormat::Full,
    }
  }
}

/// Loop cursor plus accumulated per-iteration results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopState {
  pub parent_id: String,
  /// Index of the next element to hand out. Never decreases.
  pub loop_index: usize,
  /// Fixed by the first call.
  pub loop_length: usize,
  pub results: Vec<Value>,
  pub in_progress: bool,
  /// Downstream result of the last iteration, folded in on the next advance.
  #[serde(default)]
  pub pending_result: Option<Value>,
}

impl LoopState {
  pub fn new(parent_id: impl Into<String>, loop_length: usize) -> Self {
    Self {
      parent_id: parent_id.into(),
      loop_index: 0,
      loop_length,
      results: Vec::new(),
      in_progress: true,
      pending_result: None,
    }
  }

  /// Folds the previous iteration's result, then hands out the element at the cursor and
  /// moves the cursor forward. `None` means the sequence is exhausted.
  #[instrument(level = "trace", skip(self, items), fields(loop_index = self.loop_index))]
  pub fn advance<'a>(&mut self, items: &'a [Value]) -> Option<&'a Value> {
    if self.loop_index > 0
      && self.results.len() < self.loop_index
      && self.results.len() < self.loop_length
    {
      let previous = self.pending_result.take().unwrap_or(Value::Null);
      self.results.push(previous);
    }
    let element = items.get(self.loop_index);
    self.loop_index += 1;
    self.in_progress = element.is_some();
    element
  }

  pub fn is_done(&self) -> bool {
    self.loop_index > self.loop_length
  }

  /// Final `Result` in the requested format.
  pub fn aggregate(&self, format: ResultFormat) -> Value {
    match format {
      ResultFormat::Full => Value::Array(self.results.clone()),
      ResultFormat::Minimal => Value::Array(self.results.iter().map(strip_bookkeeping).collect()),
      ResultFormat::ResultsArray => {
        let mut flat = Vec::new();
        for item in &self.results {
          match item {
            Value::Object(map) => {
              for (k, v) in map {
                if is_bookkeeping(k) {
                  continue;
                }
                push_flattened(&mut flat, v);
              }
            }
            Value::Null => {}
            other => push_flattened(&mut flat, other),
          }
        }
        Value::Array(flat)
      }
    }
  }
}

fn push_flattened(out: &mut Vec<Value>, v: &Value) {
  match v {
    Value::Array(items) => out.extend(items.iter().cloned()),
    other => out.push(other.clone()),
  }
}

fn strip_bookkeeping(item: &Value) -> Value {
  match item {
    Value::Object(map) => Value::Object(
      map
        .iter()
        .filter(|(k, _)| !is_bookkeeping(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect(),
    ),
    other => other.clone(),
  }
}
