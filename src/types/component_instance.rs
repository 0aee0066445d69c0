//! A component (node) in an agent graph.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Payload;

/// Key in [ComponentInstance::data] that marks re-entry inside a forked sub-execution.
pub const FORKED_KEY: &str = "forked";

/// Declared input or output port of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDef {
  pub name: String,
  /// Port may be left unconnected.
  #[serde(default)]
  pub optional: bool,
}

impl PortDef {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      optional: false,
    }
  }
}

/// A component instance: graph id, kind name, declared ports and settings.
///
/// `name` selects the implementation (e.g. `Async`, `Await`, `ForEach`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInstance {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub inputs: Vec<PortDef>,
  #[serde(default)]
  pub outputs: Vec<PortDef>,
  /// Validated settings of the component.
  #[serde(default)]
  pub data: Payload,
  /// Belongs to a background branch; only runs inside a forked sub-execution.
  #[serde(default, rename = "async")]
  pub async_branch: bool,
}

impl ComponentInstance {
  pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      id: id.into(),
      name: name.into(),
      inputs: vec![],
      outputs: vec![],
      data: Payload::new(),
      async_branch: false,
    }
  }

  pub fn with_inputs(mut self, names: &[&str]) -> Self {
    self.inputs = names.iter().map(|n| PortDef::new(*n)).collect();
    self
  }

  pub fn with_outputs(mut self, names: &[&str]) -> Self {
    self.outputs = names.iter().map(|n| PortDef::new(*n)).collect();
    self
  }

  pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
    self.data.insert(key.into(), value);
    self
  }

  pub fn async_branch(mut self) -> Self {
    self.async_branch = true;
    self
  }

  /// True when this instance is the re-entry copy of a fork inside its own sub-execution.
  pub fn is_forked(&self) -> bool {
    self
      .data
      .get(FORKED_KEY)
      .and_then(Value::as_bool)
      .unwrap_or(false)
  }

  pub fn mark_forked(&mut self) {
    self.data.insert(FORKED_KEY.to_string(), Value::Bool(true));
  }

  pub fn input_names(&self) -> impl Iterator<Item = &str> {
    self.inputs.iter().map(|p| p.name.as_str())
  }
}
