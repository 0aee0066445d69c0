//! Reference scheduler: runs an agent graph in dependency order, routing outputs along
//! connections, driving loop bodies and executing forked sub-executions.
//!
//! - [GraphRunner::run]: primary run seeded at the graph entry. Async components are
//!   skipped; they belong to background branches.
//! - [ForkedExecution::run_forked]: runs a forked copy seeded at its root, async
//!   components included.
//!
//! The result of a run is the merged output of its sinks (components that ran and have no
//! connection to another component of the region).

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::agent::{AgentContext, ForkedExecution};
use crate::error::{FlowError, Result};
use crate::graph_io;
use crate::nodes::{ComponentRegistry, ERROR_KEY, ForEachNode, IN_PROGRESS_KEY, LOOP_PORT};
use crate::types::{AgentGraph, Payload};

/// Outputs of one region run, keyed by component id, plus the order components ran in.
#[derive(Debug, Default)]
struct RegionRun {
  outputs: HashMap<String, Payload>,
  order: Vec<String>,
}

/// Kahn order of `region`, ties broken by id so runs are reproducible.
pub(crate) fn topo_order(graph: &AgentGraph, region: &HashSet<String>) -> Result<Vec<String>> {
  let mut indegree: HashMap<&str, usize> = region.iter().map(|id| (id.as_str(), 0)).collect();
  for c in &graph.connections {
    if !region.contains(&c.source_id) {
      continue;
    }
    if let Some(d) = indegree.get_mut(c.target_id.as_str()) {
      *d += 1;
    }
  }
  let mut ready: BTreeSet<&str> = indegree
    .iter()
    .filter(|(_, d)| **d == 0)
    .map(|(id, _)| *id)
    .collect();
  let mut order = Vec::with_capacity(region.len());
  while let Some(id) = ready.pop_first() {
    order.push(id.to_string());
    for c in graph.outgoing(id) {
      if let Some(d) = indegree.get_mut(c.target_id.as_str()) {
        *d -= 1;
        if *d == 0 {
          ready.insert(c.target_id.as_str());
        }
      }
    }
  }
  if order.len() < region.len() {
    let mut stuck: Vec<String> = indegree
      .into_iter()
      .filter(|(_, d)| *d > 0)
      .map(|(id, _)| id.to_string())
      .collect();
    stuck.sort();
    return Err(FlowError::Cycle(stuck));
  }
  Ok(order)
}

/// Values waiting on each input port, per component.
type Inbox = HashMap<String, HashMap<String, Vec<Value>>>;

fn seeded(id: &str, input: Payload) -> Inbox {
  let ports = input.into_iter().map(|(k, v)| (k, vec![v])).collect();
  HashMap::from([(id.to_string(), ports)])
}

fn deliver(inbox: &mut Inbox, target: &str, port: &str, value: Value) {
  inbox
    .entry(target.to_string())
    .or_default()
    .entry(port.to_string())
    .or_default()
    .push(value);
}

/// A port fed once gets the value; a port fed by several connections gets an array of
/// the values in arrival order.
pub(crate) fn collect_inputs(ports: HashMap<String, Vec<Value>>) -> Payload {
  ports
    .into_iter()
    .map(|(port, mut values)| {
      let v = if values.len() == 1 {
        values.swap_remove(0)
      } else {
        Value::Array(values)
      };
      (port, v)
    })
    .collect()
}

/// Merged outputs of the components of `region` that ran and feed nothing else in it.
fn sink_output(graph: &AgentGraph, region: &HashSet<String>, run: &RegionRun) -> Payload {
  let mut merged = Payload::new();
  for id in &run.order {
    let feeds_region = graph
      .outgoing(id)
      .iter()
      .any(|c| region.contains(&c.target_id));
    if feeds_region {
      continue;
    }
    if let Some(out) = run.outputs.get(id) {
      merged.extend(out.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
  }
  merged
}

/// Runs agent graphs with a [ComponentRegistry].
pub struct GraphRunner {
  registry: ComponentRegistry,
}

impl GraphRunner {
  pub fn new(registry: ComponentRegistry) -> Arc<Self> {
    Arc::new(Self { registry })
  }

  /// Runner over the built-in components.
  pub fn with_builtins() -> Arc<Self> {
    Self::new(ComponentRegistry::with_builtins())
  }

  /// Context for `graph` whose forks are executed by this runner.
  pub fn context(self: &Arc<Self>, agent_id: impl Into<String>, graph: AgentGraph) -> AgentContext {
    AgentContext::new(agent_id, graph).with_executor(self.clone())
  }

  /// Primary run: seeds the entry with `input` and returns the merged sink outputs.
  /// The run's runtime data is dropped afterwards, whether it succeeded or not, so loop
  /// cursors never leak into the next run on the same context.
  #[instrument(level = "debug", skip_all, fields(agent_id = %agent.id, request_id = %agent.workflow_request_id))]
  pub async fn run(&self, agent: &AgentContext, input: Payload) -> Result<Payload> {
    let graph = agent.graph();
    graph_io::validate(graph)?;
    let region: HashSet<String> = graph
      .components
      .values()
      .filter(|c| agent.is_forked() || !c.async_branch)
      .map(|c| c.id.clone())
      .collect();
    let run = self
      .run_region(agent, &region, seeded(&graph.entry, input))
      .await;
    agent.clear_runtime_data();
    let run = run?;
    let output = sink_output(graph, &region, &run);
    info!(components = run.order.len(), "run finished");
    Ok(output)
  }

  /// Runs the components of `region` that receive input, in dependency order.
  fn run_region<'a>(
    &'a self,
    agent: &'a AgentContext,
    region: &'a HashSet<String>,
    seeds: Inbox,
  ) -> BoxFuture<'a, Result<RegionRun>> {
    Box::pin(async move {
      let graph = agent.graph();
      let order = topo_order(graph, region)?;
      let mut pending = seeds;
      let mut loop_bodies: HashSet<String> = HashSet::new();
      let mut run = RegionRun::default();

      for id in order {
        if loop_bodies.contains(&id) {
          continue;
        }
        let Some(ports) = pending.remove(&id) else {
          continue;
        };
        let input = collect_inputs(ports);
        let config = graph
          .component(&id)
          .ok_or_else(|| FlowError::ComponentNotFound(id.clone()))?;
        let component = self.registry.get(&config.name)?;
        debug!(component_id = %id, kind = %config.name, "executing component");

        let mut output = component.process(input.clone(), config, agent).await;
        if output.contains_key(IN_PROGRESS_KEY) {
          let body = self.loop_body(graph, region, &id);
          output = self.drive_loop(agent, &id, &body, &input, output).await?;
          loop_bodies.extend(body);
        }
        let output = component.post_process(output);
        if let Some(err) = output.get(ERROR_KEY) {
          debug!(component_id = %id, error = %err, "component reported an error");
        }

        for c in graph.outgoing(&id) {
          if !region.contains(&c.target_id) || loop_bodies.contains(&c.target_id) {
            continue;
          }
          if let Some(v) = output.get(&c.source_output) {
            deliver(&mut pending, &c.target_id, &c.target_input, v.clone());
          }
        }
        run.outputs.insert(id.clone(), output);
        run.order.push(id);
      }
      Ok(run)
    })
  }

  /// Components reached through the loop port of `loop_id`, limited to `region`.
  fn loop_body(&self, graph: &AgentGraph, region: &HashSet<String>, loop_id: &str) -> HashSet<String> {
    let starts: Vec<&str> = graph
      .outgoing_from_port(loop_id, LOOP_PORT)
      .into_iter()
      .map(|c| c.target_id.as_str())
      .collect();
    graph
      .reachable_from(starts)
      .into_iter()
      .filter(|id| id != loop_id && region.contains(id))
      .collect()
  }

  /// Re-invokes the loop component until it reports completion, running `body` for
  /// every element it hands out and recording the body's sink output as that
  /// iteration's result.
  async fn drive_loop(
    &self,
    agent: &AgentContext,
    loop_id: &str,
    body: &HashSet<String>,
    input: &Payload,
    first: Payload,
  ) -> Result<Payload> {
    let graph = agent.graph();
    let config = graph
      .component(loop_id)
      .ok_or_else(|| FlowError::ComponentNotFound(loop_id.to_string()))?;
    let component = self.registry.get(&config.name)?;
    let limit = agent.config().max_loop_iterations;

    let mut output = first;
    let mut iterations = 0usize;
    while output.get(IN_PROGRESS_KEY) == Some(&Value::Bool(true)) && !output.contains_key(ERROR_KEY)
    {
      iterations += 1;
      if iterations > limit {
        return Err(FlowError::IterationLimit {
          component_id: loop_id.to_string(),
          limit,
        });
      }
      let element = output.get(LOOP_PORT).cloned().unwrap_or(Value::Null);
      let mut seeds = Inbox::new();
      for c in graph.outgoing_from_port(loop_id, LOOP_PORT) {
        if body.contains(&c.target_id) {
          deliver(&mut seeds, &c.target_id, &c.target_input, element.clone());
        }
      }
      let body_run = self.run_region(agent, body, seeds).await?;
      let result = sink_output(graph, body, &body_run);
      ForEachNode::record_iteration_result(agent, loop_id, Value::Object(result))?;
      output = component.process(input.clone(), config, agent).await;
    }
    debug!(component_id = %loop_id, iterations, "loop finished");
    Ok(output)
  }
}

#[async_trait]
impl ForkedExecution for GraphRunner {
  #[instrument(level = "debug", skip_all, fields(agent_id = %agent.id, job_id = ?agent.job_id(), root_id = %root_id))]
  async fn run_forked(
    &self,
    agent: Arc<AgentContext>,
    root_id: &str,
    input: Payload,
  ) -> Result<Payload> {
    let graph = agent.graph();
    if !graph.contains(root_id) {
      return Err(FlowError::ComponentNotFound(root_id.to_string()));
    }
    let region: HashSet<String> = graph.components.keys().cloned().collect();
    let run = self
      .run_region(&agent, &region, seeded(root_id, input))
      .await;
    agent.clear_runtime_data();
    let output = sink_output(graph, &region, &run?);
    info!("background run finished");
    Ok(output)
  }
}
