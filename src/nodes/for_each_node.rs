//! Loop controller: hands out one element per scheduler invocation and accumulates the
//! results of the loop body until the sequence is exhausted.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::agent::AgentContext;
use crate::error::{FlowError, Result};
use crate::nodes::component::{Component, ERROR_KEY, data_str};
use crate::types::{ComponentInstance, LoopState, Payload, ResultFormat};

pub const INPUT_PORT: &str = "Input";
/// Output carrying the current element; feeds the loop body.
pub const LOOP_PORT: &str = "Loop";
/// Output carrying the aggregated results once the loop completes.
pub const RESULT_PORT: &str = "Result";
pub const IN_PROGRESS_KEY: &str = "_in_progress";
/// Runtime data key holding the serialized [LoopState].
pub const LOOP_DATA_KEY: &str = "_LoopData";

/// Normalizes the loop input into an ordered sequence.
///
/// Arrays pass through; a string shaped like a JSON array is parsed; any other string is
/// split on commas; an object yields its values; anything else is a single element.
#[instrument(level = "trace")]
pub fn normalize_items(input: Option<&Value>) -> Result<Vec<Value>> {
  let Some(input) = input else {
    return Ok(vec![]);
  };
  match input {
    Value::Array(items) => Ok(items.clone()),
    Value::String(s) => {
      let trimmed = s.trim();
      if trimmed.starts_with('[') && trimmed.ends_with(']') {
        let parsed: Vec<Value> = serde_json::from_str(trimmed)
          .map_err(|e| FlowError::Loop(format!("input looks like a JSON array but is not: {e}")))?;
        return Ok(parsed);
      }
      Ok(
        s.split(',')
          .map(|part| Value::String(part.trim().to_string()))
          .collect(),
      )
    }
    Value::Object(map) => Ok(map.values().cloned().collect()),
    other => Ok(vec![other.clone()]),
  }
}

fn load_state(agent: &AgentContext, component_id: &str) -> Result<Option<LoopState>> {
  let Some(data) = agent.get_runtime_data(component_id) else {
    return Ok(None);
  };
  match data.get(LOOP_DATA_KEY) {
    None | Some(Value::Null) => Ok(None),
    Some(raw) => Ok(Some(serde_json::from_value(raw.clone())?)),
  }
}

fn save_state(agent: &AgentContext, component_id: &str, state: Option<&LoopState>) -> Result<()> {
  let raw = match state {
    Some(s) => serde_json::to_value(s)?,
    None => Value::Null,
  };
  let mut patch = serde_json::Map::new();
  patch.insert(LOOP_DATA_KEY.to_string(), raw);
  agent.update_runtime_data(component_id, Value::Object(patch));
  Ok(())
}

pub struct ForEachNode;

impl Default for ForEachNode {
  fn default() -> Self {
    Self::new()
  }
}

impl ForEachNode {
  pub fn new() -> Self {
    Self
  }

  /// Stores the downstream result of the iteration just run; it is folded into the
  /// accumulator on the next invocation. No-op when the loop has no state.
  pub fn record_iteration_result(
    agent: &AgentContext,
    component_id: &str,
    result: Value,
  ) -> Result<()> {
    let Some(mut state) = load_state(agent, component_id)? else {
      debug!(component_id = %component_id, "no loop state; iteration result dropped");
      return Ok(());
    };
    state.pending_result = Some(result);
    save_state(agent, component_id, Some(&state))
  }

  /// One scheduler invocation: advance the cursor, report the element, and on exhaustion
  /// build `Result` and reset the state so the component can loop again later.
  pub(crate) fn step(
    &self,
    input: &Payload,
    config: &ComponentInstance,
    agent: &AgentContext,
  ) -> Result<Payload> {
    let items = normalize_items(input.get(INPUT_PORT))?;
    let mut state =
      load_state(agent, &config.id)?.unwrap_or_else(|| LoopState::new(&config.id, items.len()));
    let element = state.advance(&items).cloned();
    debug!(
      component_id = %config.id,
      loop_index = state.loop_index,
      loop_length = state.loop_length,
      in_progress = state.in_progress,
      "loop advanced"
    );

    let mut out = Payload::new();
    out.insert(LOOP_PORT.to_string(), element.unwrap_or(Value::Null));
    out.insert(IN_PROGRESS_KEY.to_string(), Value::Bool(state.in_progress));
    if state.is_done() {
      let format = data_str(config, "format")
        .map(ResultFormat::parse)
        .unwrap_or_default();
      out.insert(RESULT_PORT.to_string(), state.aggregate(format));
      save_state(agent, &config.id, None)?;
    } else {
      save_state(agent, &config.id, Some(&state))?;
    }
    Ok(out)
  }
}

#[async_trait]
impl Component for ForEachNode {
  fn kind(&self) -> &str {
    "ForEach"
  }

  async fn process(
    &self,
    input: Payload,
    config: &ComponentInstance,
    agent: &AgentContext,
  ) -> Payload {
    match self.step(&input, config, agent) {
      Ok(out) => out,
      Err(e) => {
        warn!(component_id = %config.id, error = %e, "loop step failed");
        let in_progress = load_state(agent, &config.id)
          .ok()
          .flatten()
          .is_some_and(|s| s.in_progress);
        let mut out = Payload::new();
        out.insert(LOOP_PORT.to_string(), Value::Null);
        out.insert(IN_PROGRESS_KEY.to_string(), Value::Bool(in_progress));
        out.insert(ERROR_KEY.to_string(), Value::String(e.to_string()));
        out
      }
    }
  }

  /// Strips the bookkeeping that only the scheduler needs.
  fn post_process(&self, mut output: Payload) -> Payload {
    output.remove(LOOP_PORT);
    output.remove(IN_PROGRESS_KEY);
    output.remove(LOOP_DATA_KEY);
    output
  }
}
