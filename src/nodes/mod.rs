//! Components implementing fork/join and iteration control, plus pass-through leaves.

mod async_node;
#[cfg(test)]
mod async_node_test;
mod await_node;
mod component;
mod for_each_node;
mod identity_node;
#[cfg(test)]
mod identity_node_test;
mod sleep_node;

pub use async_node::{AsyncNode, JOB_ID_PORT};
pub use await_node::{AwaitNode, JOBS_INPUT, JoinSettings, RESULTS_OUTPUT, UNKNOWN_JOB};
pub use component::{Component, ComponentRegistry, ERROR_KEY};
pub use for_each_node::{
  ForEachNode, IN_PROGRESS_KEY, INPUT_PORT, LOOP_DATA_KEY, LOOP_PORT, RESULT_PORT, normalize_items,
};
pub use identity_node::IdentityNode;
pub use sleep_node::SleepNode;
