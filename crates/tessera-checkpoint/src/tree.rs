//! In-memory execution tree.
//!
//! [`CheckpointRecorder`] turns the flat event sequence into a tree of
//! [`ExecutionNode`]s mirroring how components nested at runtime. Secrets
//! registered on a node are masked in that node and all of its descendants
//! when a snapshot is taken.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::events::{ExecutionEvent, ExecutionRecorder};
use crate::secrets::{collect_secrets, ordered, scrub, value_at_path};

/// Output recorded for a component whose live stream was passed through.
pub const STREAMING_PLACEHOLDER: &str = "[streaming]";

const DEFAULT_MIN_SECRET_LENGTH: usize = 8;

/// A node in the execution tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionNode {
  pub id: String,
  pub component_name: String,
  pub parent_id: Option<String>,
  pub start_time: DateTime<Utc>,
  pub end_time: Option<DateTime<Utc>>,
  pub props: Value,
  pub output: Option<Value>,
  pub error: Option<String>,
  pub metadata: serde_json::Map<String, Value>,
  pub children: Vec<ExecutionNode>,
}

impl ExecutionNode {
  /// Number of nodes in this subtree, including this one.
  pub fn count(&self) -> usize {
    1 + self.children.iter().map(ExecutionNode::count).sum::<usize>()
  }

  /// Depth-first search for the first node with the given component name.
  pub fn find(&self, component_name: &str) -> Option<&ExecutionNode> {
    if self.component_name == component_name {
      return Some(self);
    }
    self.children.iter().find_map(|c| c.find(component_name))
  }
}

struct NodeRecord {
  node: ExecutionNode,
  children: Vec<String>,
  secret_outputs: bool,
  secrets: BTreeSet<String>,
}

#[derive(Default)]
struct TreeState {
  nodes: HashMap<String, NodeRecord>,
  roots: Vec<String>,
  /// Children whose parent has not been seen yet, keyed by parent id.
  orphans: HashMap<String, Vec<String>>,
}

/// Records execution events into a masked execution tree.
pub struct CheckpointRecorder {
  min_secret_length: usize,
  state: Mutex<TreeState>,
}

impl CheckpointRecorder {
  /// Create a recorder that treats strings of at least `min_secret_length`
  /// bytes as maskable secrets.
  pub fn new(min_secret_length: usize) -> Self {
    Self {
      min_secret_length,
      state: Mutex::new(TreeState::default()),
    }
  }

  /// Snapshot of the first root node, with secrets masked.
  pub fn snapshot(&self) -> Option<ExecutionNode> {
    self.roots().into_iter().next()
  }

  /// Snapshots of every root node, in the order they started.
  pub fn roots(&self) -> Vec<ExecutionNode> {
    let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

    let orphaned: usize = state.orphans.values().map(Vec::len).sum();
    if orphaned > 0 {
      warn!(orphaned, "checkpoint tree has nodes with unknown parents");
    }

    state
      .roots
      .iter()
      .filter_map(|id| build(&state, id, &BTreeSet::new()))
      .collect()
  }

  /// Total number of recorded nodes, attached or not.
  pub fn len(&self) -> usize {
    self
      .state
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .nodes
      .len()
  }

  /// Whether no events have been recorded.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  fn start(&self, state: &mut TreeState, event: ExecutionEvent) {
    let ExecutionEvent::ComponentStarted {
      node_id,
      parent_id,
      component,
      props,
      secret_props,
      secret_outputs,
      metadata,
    } = event
    else {
      return;
    };

    let mut secrets = BTreeSet::new();
    for path in &secret_props {
      if let Some(value) = value_at_path(&props, path) {
        collect_secrets(value, self.min_secret_length, &mut secrets);
      }
    }

    let record = NodeRecord {
      node: ExecutionNode {
        id: node_id.clone(),
        component_name: component,
        parent_id: parent_id.clone(),
        start_time: Utc::now(),
        end_time: None,
        props,
        output: None,
        error: None,
        metadata,
        children: Vec::new(),
      },
      children: Vec::new(),
      secret_outputs,
      secrets,
    };
    state.nodes.insert(node_id.clone(), record);

    match parent_id {
      Some(parent_id) => match state.nodes.get_mut(&parent_id) {
        Some(parent) => parent.children.push(node_id.clone()),
        None => state.orphans.entry(parent_id).or_default().push(node_id.clone()),
      },
      None => state.roots.push(node_id.clone()),
    }

    if let Some(waiting) = state.orphans.remove(&node_id) {
      if let Some(record) = state.nodes.get_mut(&node_id) {
        record.children.extend(waiting);
      }
    }
  }

  fn finish(&self, state: &mut TreeState, node_id: &str, output: Option<Value>, error: Option<String>) {
    let Some(record) = state.nodes.get_mut(node_id) else {
      warn!(node_id = %node_id, "attempted to complete unknown checkpoint node");
      return;
    };

    if let Some(output) = &output {
      let is_placeholder = output.as_str() == Some(STREAMING_PLACEHOLDER);
      if record.secret_outputs && !is_placeholder {
        collect_secrets(output, self.min_secret_length, &mut record.secrets);
      }
    }

    record.node.end_time = Some(Utc::now());
    record.node.output = output;
    record.node.error = error;
  }
}

impl Default for CheckpointRecorder {
  fn default() -> Self {
    Self::new(DEFAULT_MIN_SECRET_LENGTH)
  }
}

impl ExecutionRecorder for CheckpointRecorder {
  fn record(&self, event: ExecutionEvent) {
    let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
    match event {
      ExecutionEvent::ComponentStarted { .. } => self.start(&mut state, event),
      ExecutionEvent::ComponentCompleted { node_id, output } => {
        self.finish(&mut state, &node_id, Some(output), None)
      }
      ExecutionEvent::StreamPassedThrough { node_id } => self.finish(
        &mut state,
        &node_id,
        Some(Value::String(STREAMING_PLACEHOLDER.to_string())),
        None,
      ),
      ExecutionEvent::ComponentFailed { node_id, error } => {
        self.finish(&mut state, &node_id, None, Some(error))
      }
    }
  }
}

/// Build a masked snapshot of `id` and its subtree.
fn build(state: &TreeState, id: &str, inherited: &BTreeSet<String>) -> Option<ExecutionNode> {
  let record = state.nodes.get(id)?;

  let effective: BTreeSet<String> = inherited.union(&record.secrets).cloned().collect();
  let secrets = ordered(&effective);

  let mut node = record.node.clone();
  node.props = scrub(&node.props, &secrets);
  node.output = node.output.as_ref().map(|o| scrub(o, &secrets));
  node.metadata = match scrub(&Value::Object(node.metadata), &secrets) {
    Value::Object(map) => map,
    _ => serde_json::Map::new(),
  };
  node.error = node
    .error
    .as_ref()
    .map(|e| match scrub(&Value::String(e.clone()), &secrets) {
      Value::String(s) => s,
      other => other.to_string(),
    });
  node.children = record
    .children
    .iter()
    .filter_map(|child| build(state, child, &effective))
    .collect();

  Some(node)
}
