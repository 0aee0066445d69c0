//! Component/connection maps of one agent.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::{ComponentInstance, Connection};

/// On-disk form: components as a list, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphFile {
  entry: String,
  #[serde(default)]
  components: Vec<ComponentInstance>,
  #[serde(default)]
  connections: Vec<Connection>,
}

/// The agent's component graph. `entry` is the designated entry component and is never pruned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphFile", into = "GraphFile")]
pub struct AgentGraph {
  pub entry: String,
  pub components: HashMap<String, ComponentInstance>,
  pub connections: Vec<Connection>,
}

impl From<GraphFile> for AgentGraph {
  fn from(file: GraphFile) -> Self {
    AgentGraph::new(file.entry, file.components, file.connections)
  }
}

impl From<AgentGraph> for GraphFile {
  fn from(graph: AgentGraph) -> Self {
    let mut components: Vec<ComponentInstance> = graph.components.into_values().collect();
    components.sort_by(|a, b| a.id.cmp(&b.id));
    GraphFile {
      entry: graph.entry,
      components,
      connections: graph.connections,
    }
  }
}

impl AgentGraph {
  pub fn new(
    entry: impl Into<String>,
    components: Vec<ComponentInstance>,
    connections: Vec<Connection>,
  ) -> Self {
    Self {
      entry: entry.into(),
      components: components.into_iter().map(|c| (c.id.clone(), c)).collect(),
      connections,
    }
  }

  pub fn component(&self, id: &str) -> Option<&ComponentInstance> {
    self.components.get(id)
  }

  pub fn component_mut(&mut self, id: &str) -> Option<&mut ComponentInstance> {
    self.components.get_mut(id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.components.contains_key(id)
  }

  pub fn outgoing(&self, id: &str) -> Vec<&Connection> {
    self
      .connections
      .iter()
      .filter(|c| c.source_id == id)
      .collect()
  }

  pub fn outgoing_from_port(&self, id: &str, port: &str) -> Vec<&Connection> {
    self
      .connections
      .iter()
      .filter(|c| c.source_id == id && c.source_output == port)
      .collect()
  }

  pub fn inbound_count(&self, id: &str) -> usize {
    self.connections.iter().filter(|c| c.target_id == id).count()
  }

  /// Component ids reachable by following connections from `starts` (starts included).
  pub fn reachable_from<'a>(&self, starts: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = starts.into_iter().map(String::from).collect();
    while let Some(id) = queue.pop_front() {
      if !seen.insert(id.clone()) {
        continue;
      }
      for c in self.outgoing(&id) {
        if !seen.contains(&c.target_id) {
          queue.push_back(c.target_id.clone());
        }
      }
    }
    seen
  }
}
