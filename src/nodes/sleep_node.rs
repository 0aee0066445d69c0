//! Delayed pass-through: waits `data.delay_ms`, then forwards its input.
//! Stands in for slow leaf work (an API call) in background branches.

use std::time::Duration;

use async_trait::async_trait;

use crate::agent::AgentContext;
use crate::nodes::component::{Component, data_u64};
use crate::nodes::identity_node::pass_through;
use crate::types::{ComponentInstance, Payload};

pub struct SleepNode;

impl Default for SleepNode {
  fn default() -> Self {
    Self::new()
  }
}

impl SleepNode {
  pub fn new() -> Self {
    Self
  }
}

#[async_trait]
impl Component for SleepNode {
  fn kind(&self) -> &str {
    "Sleep"
  }

  async fn process(
    &self,
    input: Payload,
    config: &ComponentInstance,
    _agent: &AgentContext,
  ) -> Payload {
    let delay = Duration::from_millis(data_u64(config, "delay_ms").unwrap_or(0));
    tracing::trace!(component_id = %config.id, delay_ms = delay.as_millis() as u64, "sleeping");
    tokio::time::sleep(delay).await;
    pass_through(input, config)
  }
}
