//! Execution events and recorders for observability.
//!
//! Events are emitted during element execution to allow consumers to observe
//! progress, build checkpoint trees, stream to UIs, etc.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during element execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// A component invocation has started.
  ComponentStarted {
    node_id: String,
    /// Node of the enclosing invocation, if any.
    parent_id: Option<String>,
    component: String,
    props: serde_json::Value,
    /// Dot-separated paths into `props` whose values are secret.
    secret_props: Vec<String>,
    /// Whether the component's output is secret.
    secret_outputs: bool,
    metadata: serde_json::Map<String, serde_json::Value>,
  },

  /// A component invocation has completed successfully.
  ComponentCompleted {
    node_id: String,
    output: serde_json::Value,
  },

  /// A component returned a live stream that was handed on unresolved.
  StreamPassedThrough { node_id: String },

  /// A component invocation has failed.
  ComponentFailed { node_id: String, error: String },
}

impl ExecutionEvent {
  /// The node this event refers to.
  pub fn node_id(&self) -> &str {
    match self {
      ExecutionEvent::ComponentStarted { node_id, .. }
      | ExecutionEvent::ComponentCompleted { node_id, .. }
      | ExecutionEvent::StreamPassedThrough { node_id }
      | ExecutionEvent::ComponentFailed { node_id, .. } => node_id,
    }
  }
}

/// Trait for receiving execution events.
///
/// The engine calls `record` for each event - implementations decide
/// what to do with them (build a tree, broadcast, log, ignore, etc.).
pub trait ExecutionRecorder: Send + Sync {
  /// Called when an execution event occurs.
  fn record(&self, event: ExecutionEvent);
}

/// A no-op recorder that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopRecorder;

impl ExecutionRecorder for NoopRecorder {
  fn record(&self, _event: ExecutionEvent) {}
}

/// A recorder that sends events to an unbounded channel.
///
/// Use this when events are consumed asynchronously (persisted, streamed to a
/// UI, etc.).
#[derive(Debug, Clone)]
pub struct ChannelRecorder {
  // Unbounded so a slow consumer never stalls execution. Volume is two
  // events per invocation.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelRecorder {
  /// Create a new channel recorder.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionRecorder for ChannelRecorder {
  fn record(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn channel_recorder_forwards_events() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let recorder = ChannelRecorder::new(tx);

    recorder.record(ExecutionEvent::ComponentFailed {
      node_id: "n1".to_string(),
      error: "boom".to_string(),
    });

    let event = rx.recv().await.unwrap();
    assert_eq!(event.node_id(), "n1");
  }

  #[test]
  fn channel_recorder_ignores_dropped_receiver() {
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    ChannelRecorder::new(tx).record(ExecutionEvent::StreamPassedThrough {
      node_id: "n1".to_string(),
    });
  }
}
