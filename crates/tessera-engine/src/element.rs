//! Inert descriptions of work.
//!
//! Building an [`Element`] runs nothing. Elements are consumed exactly once,
//! by the executor.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::component::{Component, ComponentFactory};
use crate::context::{ContextEntry, ContextKey};
use crate::error::BoxError;
use crate::value::{Output, Resolvable};

/// Receives a resolved output and returns the next stage of the tree.
pub type Continuation = Box<dyn FnOnce(Output) -> Result<Resolvable, BoxError> + Send>;

pub(crate) enum ElementKind {
  /// Run a component body with an input record.
  Invoke {
    component: Arc<dyn Component>,
    input: Value,
  },
  /// Run the child in a streaming scope.
  Stream(Box<Element>),
  /// Run all children concurrently and join their named outputs.
  Collect(Vec<Element>),
  /// Run the child with a context value provided.
  Provide {
    entry: ContextEntry,
    child: Box<Element>,
  },
  /// Run the child (and its own continuation) before this element's
  /// continuation. Produced by chaining `then` calls.
  Chain(Box<Element>),
}

/// A deferred computation: what to run, plus what to do with its output.
pub struct Element {
  pub(crate) kind: ElementKind,
  pub(crate) continuation: Option<Continuation>,
  pub(crate) output_key: Option<String>,
}

impl Element {
  /// Invoke `component` with `input`.
  pub fn new(component: &ComponentFactory, input: Value) -> Self {
    Self::from_kind(ElementKind::Invoke {
      component: component.inner(),
      input,
    })
  }

  /// Builder form: component, input, and an optional continuation.
  pub fn build(component: &ComponentFactory, input: Value, continuation: Option<Continuation>) -> Self {
    let mut element = Self::new(component, input);
    element.continuation = continuation;
    element
  }

  /// Run `child` inside a streaming scope.
  ///
  /// The child's output key moves to the wrapper so it still names its
  /// branch inside a `collect`.
  pub fn stream(mut child: Element) -> Self {
    let key = child.output_key.take();
    let mut element = Self::from_kind(ElementKind::Stream(Box::new(child)));
    element.output_key = key;
    element
  }

  /// Run every child concurrently and assemble a record from the named ones.
  pub fn collect(children: impl IntoIterator<Item = Element>) -> Self {
    Self::from_kind(ElementKind::Collect(children.into_iter().collect()))
  }

  /// Run `child` with `value` visible through [`crate::use_context`].
  pub fn provide<T>(key: &ContextKey<T>, value: T, mut child: Element) -> Self
  where
    T: Clone + Send + Sync + 'static,
  {
    let output_key = child.output_key.take();
    let mut element = Self::from_kind(ElementKind::Provide {
      entry: key.entry(value),
      child: Box::new(child),
    });
    element.output_key = output_key;
    element
  }

  /// Attach an infallible continuation.
  pub fn then<F, R>(self, f: F) -> Self
  where
    F: FnOnce(Output) -> R + Send + 'static,
    R: Into<Resolvable>,
  {
    self.chain(Box::new(move |output: Output| Ok::<Resolvable, BoxError>(f(output).into())))
  }

  /// Attach a continuation that may fail.
  pub fn try_then<F, R>(self, f: F) -> Self
  where
    F: FnOnce(Output) -> Result<R, BoxError> + Send + 'static,
    R: Into<Resolvable>,
  {
    self.chain(Box::new(move |output: Output| f(output).map(Into::<Resolvable>::into)))
  }

  /// Name this element's branch within a `collect`.
  pub fn output(mut self, key: impl Into<String>) -> Self {
    self.output_key = Some(key.into());
    self
  }

  /// The branch name set with [`Element::output`].
  pub fn output_key(&self) -> Option<&str> {
    self.output_key.as_deref()
  }

  /// Short description for logs and error messages.
  pub fn label(&self) -> String {
    match &self.kind {
      ElementKind::Invoke { component, .. } => crate::component::display_name(component.as_ref()),
      ElementKind::Stream(child) => format!("Stream({})", child.label()),
      ElementKind::Collect(children) => format!("Collect[{}]", children.len()),
      ElementKind::Provide { entry, child } => format!("Provide<{}>({})", entry.name(), child.label()),
      ElementKind::Chain(child) => child.label(),
    }
  }

  fn from_kind(kind: ElementKind) -> Self {
    Self {
      kind,
      continuation: None,
      output_key: None,
    }
  }

  fn chain(mut self, continuation: Continuation) -> Self {
    if self.continuation.is_none() {
      self.continuation = Some(continuation);
      return self;
    }

    let output_key = self.output_key.take();
    Self {
      kind: ElementKind::Chain(Box::new(self)),
      continuation: Some(continuation),
      output_key,
    }
  }
}

impl fmt::Debug for Element {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut s = f.debug_struct("Element");
    s.field("label", &self.label());
    if let ElementKind::Invoke { input, .. } = &self.kind {
      s.field("input", input);
    }
    s.field("continuation", &self.continuation.is_some())
      .field("output_key", &self.output_key)
      .finish()
  }
}

/// Free-function form of [`Element::build`].
pub fn build(component: &ComponentFactory, input: Value, continuation: Option<Continuation>) -> Element {
  Element::build(component, input, continuation)
}
