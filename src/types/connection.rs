//! A directed edge between two component ports.

use serde::{Deserialize, Serialize};

/// A directed edge from one component's output port to another's input port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
  pub source_id: String,
  pub source_output: String,
  pub target_id: String,
  pub target_input: String,
}

impl Connection {
  pub fn new(
    source_id: impl Into<String>,
    source_output: impl Into<String>,
    target_id: impl Into<String>,
    target_input: impl Into<String>,
  ) -> Self {
    Self {
      source_id: source_id.into(),
      source_output: source_output.into(),
      target_id: target_id.into(),
      target_input: target_input.into(),
    }
  }
}
