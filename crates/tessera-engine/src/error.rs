//! Error types for element execution.

use thiserror::Error;

/// Error type returned by collaborator code (component bodies,
/// continuations, pending values, stream sources).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while executing or resolving a tree.
#[derive(Debug, Error)]
pub enum EngineError {
  /// The value handed to `execute` cannot be executed (e.g. `null`).
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  /// A component body failed. The original error is kept as the source.
  #[error("component '{component}' failed: {source}")]
  Component {
    component: String,
    #[source]
    source: BoxError,
  },

  /// A continuation attached to an element failed.
  #[error("continuation of '{component}' failed: {source}")]
  Continuation {
    component: String,
    #[source]
    source: BoxError,
  },

  /// A pending value resolved to an error.
  #[error("pending value rejected: {source}")]
  Rejected {
    #[source]
    source: BoxError,
  },

  /// The terminal value of a stream failed.
  #[error("stream failed: {source}")]
  Stream {
    #[source]
    source: BoxError,
  },

  /// The first failing branch of a `collect` join.
  #[error("collect branch '{branch}' failed: {source}")]
  Join {
    branch: String,
    #[source]
    source: Box<EngineError>,
  },

  /// A `collect` branch task panicked.
  #[error("collect branch '{branch}' panicked: {message}")]
  BranchPanicked { branch: String, message: String },

  /// Execution was cancelled through the context's token.
  #[error("execution cancelled")]
  Cancelled,

  /// Resolution nested deeper than the configured limit.
  #[error("maximum resolution depth of {limit} exceeded")]
  DepthExceeded { limit: usize },

  /// A plain value was requested from an output that still holds a live stream.
  #[error("output contains an unresolved stream")]
  StreamNotResolved,
}

impl EngineError {
  /// Whether this error, or the branch error it wraps, is a cancellation.
  pub fn is_cancelled(&self) -> bool {
    match self {
      EngineError::Cancelled => true,
      EngineError::Join { source, .. } => source.is_cancelled(),
      _ => false,
    }
  }

  /// Innermost error in the source chain.
  pub fn root_cause(&self) -> &(dyn std::error::Error + 'static) {
    let mut current: &(dyn std::error::Error + 'static) = self;
    while let Some(next) = current.source() {
      current = next;
    }
    current
  }
}

/// A top-level workflow run failed.
#[derive(Debug, Error)]
#[error("workflow '{workflow}' failed: {source}")]
pub struct WorkflowError {
  pub workflow: String,
  pub execution_id: String,
  #[source]
  pub source: EngineError,
}
