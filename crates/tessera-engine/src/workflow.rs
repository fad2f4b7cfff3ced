//! Named top-level runs.

use std::sync::Arc;

use serde_json::Value;
use tessera_checkpoint::{CheckpointRecorder, ExecutionEvent, ExecutionNode, ExecutionRecorder, NoopRecorder};
use tessera_config::EngineConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

use crate::context::ExecutionContext;
use crate::element::Element;
use crate::error::WorkflowError;
use crate::executor::execute_in;
use crate::value::Output;

/// Result of a successful workflow run.
#[derive(Debug)]
pub struct WorkflowRun {
  pub execution_id: String,
  pub output: Output,
  /// Masked execution tree, when checkpoints are enabled.
  pub checkpoint: Option<ExecutionNode>,
}

/// A named entry point that runs an element tree in a fresh root context.
#[derive(Debug, Clone)]
pub struct Workflow {
  name: String,
  config: EngineConfig,
  metadata: serde_json::Map<String, Value>,
}

impl Workflow {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      config: EngineConfig::default(),
      metadata: serde_json::Map::new(),
    }
  }

  pub fn with_config(mut self, config: EngineConfig) -> Self {
    self.config = config;
    self
  }

  /// Metadata recorded on the root node of the execution tree.
  pub fn with_metadata(mut self, metadata: serde_json::Map<String, Value>) -> Self {
    self.metadata = metadata;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Run `element` to completion.
  pub async fn run(&self, element: Element) -> Result<WorkflowRun, WorkflowError> {
    self.run_with_cancel(element, CancellationToken::new()).await
  }

  /// Run `element`, stopping early with [`crate::EngineError::Cancelled`]
  /// once `cancel` fires.
  #[instrument(name = "workflow_run", skip(self, element, cancel), fields(workflow = %self.name))]
  pub async fn run_with_cancel(&self, element: Element, cancel: CancellationToken) -> Result<WorkflowRun, WorkflowError> {
    let execution_id = uuid::Uuid::new_v4().to_string();

    let checkpoint = self
      .config
      .checkpoint
      .enabled
      .then(|| Arc::new(CheckpointRecorder::new(self.config.checkpoint.min_secret_length)));
    let recorder: Arc<dyn ExecutionRecorder> = match &checkpoint {
      Some(checkpoint) => checkpoint.clone(),
      None => Arc::new(NoopRecorder),
    };

    // The workflow itself is the root node; every top-level invocation
    // hangs off it.
    recorder.record(ExecutionEvent::ComponentStarted {
      node_id: execution_id.clone(),
      parent_id: None,
      component: self.name.clone(),
      props: Value::Object(serde_json::Map::new()),
      secret_props: Vec::new(),
      secret_outputs: false,
      metadata: self.metadata.clone(),
    });

    let ctx = ExecutionContext::from_config(&self.config)
      .with_cancel(cancel)
      .with_recorder(recorder.clone())
      .with_node(execution_id.clone());

    info!(execution_id = %execution_id, root = %element.label(), "workflow_started");

    match execute_in(element, &ctx).await {
      Ok(output) => {
        recorder.record(match &output {
          Output::Stream(_) => ExecutionEvent::StreamPassedThrough {
            node_id: execution_id.clone(),
          },
          output => ExecutionEvent::ComponentCompleted {
            node_id: execution_id.clone(),
            output: output.snapshot(),
          },
        });
        info!(execution_id = %execution_id, "workflow_completed");

        Ok(WorkflowRun {
          execution_id,
          output,
          checkpoint: checkpoint.and_then(|c| c.snapshot()),
        })
      }
      Err(source) => {
        recorder.record(ExecutionEvent::ComponentFailed {
          node_id: execution_id.clone(),
          error: source.to_string(),
        });
        error!(execution_id = %execution_id, error = %source, "workflow_failed");

        Err(WorkflowError {
          workflow: self.name.clone(),
          execution_id,
          source,
        })
      }
    }
  }
}
