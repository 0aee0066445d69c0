//! Wait set: job ids being awaited per (agent, component, workflow request).

use dashmap::DashMap;

/// Key of one wait set entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WaitKey {
  pub agent_id: String,
  pub component_id: String,
  pub request_id: String,
}

impl WaitKey {
  pub fn new(
    agent_id: impl Into<String>,
    component_id: impl Into<String>,
    request_id: impl Into<String>,
  ) -> Self {
    Self {
      agent_id: agent_id.into(),
      component_id: component_id.into(),
      request_id: request_id.into(),
    }
  }
}

#[derive(Default)]
pub struct WaitSet {
  entries: DashMap<WaitKey, Vec<String>>,
}

impl WaitSet {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends job ids to the entry, creating it if needed.
  pub fn append<I, S>(&self, key: &WaitKey, job_ids: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self
      .entries
      .entry(key.clone())
      .or_default()
      .extend(job_ids.into_iter().map(Into::into));
  }

  pub fn get(&self, key: &WaitKey) -> Option<Vec<String>> {
    self.entries.get(key).map(|e| e.clone())
  }

  /// Removes the entry. Returns the ids it held.
  pub fn clear(&self, key: &WaitKey) -> Option<Vec<String>> {
    self.entries.remove(key).map(|(_, ids)| ids)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
