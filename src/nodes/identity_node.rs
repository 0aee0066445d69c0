//! Identity / pass-through component.
//! Forwards every input value to the output port of the same name, plus any configured
//! port renames.

use async_trait::async_trait;
use serde_json::Value;

use crate::agent::AgentContext;
use crate::nodes::component::Component;
use crate::types::{ComponentInstance, Payload};

/// Copies `input` to the output, then applies `data.rename` (`{"from": "to"}`) if present.
pub(crate) fn pass_through(input: Payload, config: &ComponentInstance) -> Payload {
  let mut out = input;
  if let Some(Value::Object(renames)) = config.data.get("rename") {
    for (from, to) in renames {
      if let (Some(v), Some(to)) = (out.remove(from), to.as_str()) {
        out.insert(to.to_string(), v);
      }
    }
  }
  out
}

/// Pass-through component forwarding its input unchanged.
/// Used for entry points, fan-out placeholders and exits.
pub struct IdentityNode;

impl Default for IdentityNode {
  fn default() -> Self {
    Self::new()
  }
}

impl IdentityNode {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl Component for IdentityNode {
  fn kind(&self) -> &str {
    "Identity"
  }

  async fn process(
    &self,
    input: Payload,
    config: &ComponentInstance,
    _agent: &AgentContext,
  ) -> Payload {
    tracing::trace!(component_id = %config.id, "IdentityNode executing");
    pass_through(input, config)
  }
}
