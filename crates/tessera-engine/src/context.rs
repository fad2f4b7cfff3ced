//! Execution context.
//!
//! An [`ExecutionContext`] is never mutated. Entering a scope (streaming,
//! a provided value, a nested invocation) produces a new value that is
//! passed down explicitly, so concurrent branches each carry their own view.
//! While a component body is being polled, its context is also visible
//! through a task-local so user code can read it with
//! [`ExecutionContext::current`] or [`use_context`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tessera_checkpoint::{ExecutionRecorder, NoopRecorder};
use tessera_config::EngineConfig;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

tokio::task_local! {
  static CURRENT: ExecutionContext;
}

type Values = HashMap<u64, Arc<dyn Any + Send + Sync>>;

/// Per-scope execution state.
#[derive(Clone)]
pub struct ExecutionContext {
  streaming: bool,
  streamed_in_chain: bool,
  depth: usize,
  max_depth: usize,
  cancel: CancellationToken,
  recorder: Arc<dyn ExecutionRecorder>,
  node_id: Option<String>,
  values: Arc<Values>,
}

impl ExecutionContext {
  /// Root context: non-streaming, fresh token, no-op recorder.
  pub fn new() -> Self {
    Self::from_config(&EngineConfig::default())
  }

  /// Root context using the configured depth limit.
  pub fn from_config(config: &EngineConfig) -> Self {
    Self {
      streaming: false,
      streamed_in_chain: false,
      depth: 0,
      max_depth: config.max_depth,
      cancel: CancellationToken::new(),
      recorder: Arc::new(NoopRecorder),
      node_id: None,
      values: Arc::new(HashMap::new()),
    }
  }

  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  pub fn with_recorder(mut self, recorder: Arc<dyn ExecutionRecorder>) -> Self {
    self.recorder = recorder;
    self
  }

  pub fn with_max_depth(mut self, max_depth: usize) -> Self {
    self.max_depth = max_depth;
    self
  }

  /// Whether streamable values pass through live in this scope.
  pub fn streaming(&self) -> bool {
    self.streaming
  }

  /// Whether this scope or any ancestor enabled streaming.
  pub fn has_streaming_in_chain(&self) -> bool {
    self.streamed_in_chain
  }

  /// Child scope with the streaming flag set or cleared.
  ///
  /// Clearing it keeps the ancestry record.
  pub fn with_streaming(&self, streaming: bool) -> Self {
    let mut child = self.clone();
    child.streaming = streaming;
    child.streamed_in_chain |= streaming;
    child
  }

  pub fn cancel_token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Current resolution depth.
  pub fn depth(&self) -> usize {
    self.depth
  }

  /// The context of the component body being polled, or a fresh root
  /// context outside of any execution.
  pub fn current() -> Self {
    CURRENT.try_with(Clone::clone).unwrap_or_default()
  }

  pub(crate) fn descend(&self) -> Result<Self, EngineError> {
    if self.depth >= self.max_depth {
      return Err(EngineError::DepthExceeded {
        limit: self.max_depth,
      });
    }
    let mut child = self.clone();
    child.depth += 1;
    Ok(child)
  }

  pub(crate) fn with_node(&self, node_id: String) -> Self {
    let mut child = self.clone();
    child.node_id = Some(node_id);
    child
  }

  pub(crate) fn node_id(&self) -> Option<&str> {
    self.node_id.as_deref()
  }

  pub(crate) fn recorder(&self) -> &dyn ExecutionRecorder {
    self.recorder.as_ref()
  }

  pub(crate) fn with_entry(&self, entry: ContextEntry) -> Self {
    let mut values = (*self.values).clone();
    values.insert(entry.id, entry.value);
    let mut child = self.clone();
    child.values = Arc::new(values);
    child
  }

  /// Poll `fut` with this context installed as the task-local.
  pub(crate) async fn scope<F: Future>(&self, fut: F) -> F::Output {
    CURRENT.scope(self.clone(), fut).await
  }

  /// Run `f` with this context installed as the task-local.
  pub(crate) fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(self.clone(), f)
  }

  fn lookup<T: Clone + 'static>(&self, id: u64) -> Option<T> {
    self.values.get(&id)?.downcast_ref::<T>().cloned()
  }
}

impl Default for ExecutionContext {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for ExecutionContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ExecutionContext")
      .field("streaming", &self.streaming)
      .field("streamed_in_chain", &self.streamed_in_chain)
      .field("depth", &self.depth)
      .field("max_depth", &self.max_depth)
      .field("cancelled", &self.cancel.is_cancelled())
      .field("node_id", &self.node_id)
      .field("values", &self.values.len())
      .finish()
  }
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(0);

/// A typed slot for values provided to a sub-tree.
pub struct ContextKey<T> {
  id: u64,
  name: String,
  default: T,
  _marker: PhantomData<fn() -> T>,
}

impl<T: Clone + Send + Sync + 'static> ContextKey<T> {
  /// Create a key. Each call yields a distinct slot, even for equal names.
  pub fn new(name: impl Into<String>, default: T) -> Self {
    Self {
      id: NEXT_KEY.fetch_add(1, Ordering::Relaxed),
      name: name.into(),
      default,
      _marker: PhantomData,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Value provided by the nearest enclosing provider in `ctx`, or the default.
  pub fn get(&self, ctx: &ExecutionContext) -> T {
    ctx.lookup(self.id).unwrap_or_else(|| self.default.clone())
  }

  pub(crate) fn entry(&self, value: T) -> ContextEntry {
    ContextEntry {
      id: self.id,
      name: self.name.clone(),
      value: Arc::new(value),
    }
  }
}

impl<T: fmt::Debug> fmt::Debug for ContextKey<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ContextKey")
      .field("name", &self.name)
      .field("default", &self.default)
      .finish()
  }
}

/// A provided value waiting to be installed into a context.
pub(crate) struct ContextEntry {
  id: u64,
  name: String,
  value: Arc<dyn Any + Send + Sync>,
}

impl ContextEntry {
  pub(crate) fn name(&self) -> &str {
    &self.name
  }
}

/// Create a context key with a default value.
pub fn create_context<T: Clone + Send + Sync + 'static>(name: impl Into<String>, default: T) -> ContextKey<T> {
  ContextKey::new(name, default)
}

/// Read a provided value from inside a component body.
pub fn use_context<T: Clone + Send + Sync + 'static>(key: &ContextKey<T>) -> T {
  key.get(&ExecutionContext::current())
}
