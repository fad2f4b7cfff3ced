//! Components: named async functions that can be placed into elements.

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::element::Element;
use crate::error::{BoxError, EngineError};
use crate::executor::execute;
use crate::value::{Output, Resolvable};

/// Options that shape how a component's invocations are recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentOpts {
  /// Display name overriding [`Component::name`].
  pub name: Option<String>,
  /// Dot-separated paths into the input whose values are masked.
  pub secret_props: Vec<String>,
  /// Mask the component's output.
  pub secret_outputs: bool,
  /// Extra data attached to the recorded node.
  pub metadata: serde_json::Map<String, Value>,
}

/// A resolver function: maps an input record to a resolvable value.
///
/// The returned value may itself contain elements, pending values, or
/// streams; the engine keeps resolving until only plain data (or live
/// streams, inside a streaming scope) remain.
#[async_trait]
pub trait Component: Send + Sync {
  /// Name used in logs, errors, and the execution tree.
  fn name(&self) -> &str;

  /// Recording options.
  fn opts(&self) -> ComponentOpts {
    ComponentOpts::default()
  }

  /// Run the component body.
  async fn resolve(&self, input: Value) -> Result<Resolvable, BoxError>;
}

/// Name shown for a component: the option override, or its own name.
pub(crate) fn display_name(component: &dyn Component) -> String {
  component
    .opts()
    .name
    .unwrap_or_else(|| component.name().to_string())
}

type ResolveFn = dyn Fn(Value) -> BoxFuture<'static, Result<Resolvable, BoxError>> + Send + Sync;

/// A component backed by an async closure.
pub struct FnComponent {
  name: String,
  f: Box<ResolveFn>,
}

#[async_trait]
impl Component for FnComponent {
  fn name(&self) -> &str {
    &self.name
  }

  async fn resolve(&self, input: Value) -> Result<Resolvable, BoxError> {
    (self.f)(input).await
  }
}

/// Attaches options to another component.
struct WithOpts {
  inner: Arc<dyn Component>,
  opts: ComponentOpts,
}

#[async_trait]
impl Component for WithOpts {
  fn name(&self) -> &str {
    self.inner.name()
  }

  fn opts(&self) -> ComponentOpts {
    self.opts.clone()
  }

  async fn resolve(&self, input: Value) -> Result<Resolvable, BoxError> {
    self.inner.resolve(input).await
  }
}

/// A shareable handle to a component that builds elements for it.
#[derive(Clone)]
pub struct ComponentFactory {
  inner: Arc<dyn Component>,
}

impl ComponentFactory {
  /// Wrap a component implementation.
  pub fn new<C: Component + 'static>(component: C) -> Self {
    Self {
      inner: Arc::new(component),
    }
  }

  /// The component's own name.
  pub fn name(&self) -> &str {
    self.inner.name()
  }

  /// Replace the component's recording options.
  pub fn with_opts(self, opts: ComponentOpts) -> Self {
    Self::new(WithOpts {
      inner: self.inner,
      opts,
    })
  }

  /// Build an inert element invoking this component with `input`.
  pub fn element(&self, input: Value) -> Element {
    Element::new(self, input)
  }

  /// Execute this component with `input` in the ambient context.
  pub async fn call(&self, input: Value) -> Result<Output, EngineError> {
    execute(self.element(input)).await
  }

  pub(crate) fn inner(&self) -> Arc<dyn Component> {
    self.inner.clone()
  }
}

impl std::fmt::Debug for ComponentFactory {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("ComponentFactory")
      .field("name", &self.inner.name())
      .finish()
  }
}

/// Turn an async function into a component.
///
/// ```ignore
/// let greet = component("Greet", |input| async move {
///   Ok(format!("Hello {}", input["name"].as_str().unwrap_or("world")))
/// });
/// let output = execute(greet.element(json!({ "name": "Ada" }))).await?;
/// ```
pub fn component<F, Fut, T>(name: impl Into<String>, f: F) -> ComponentFactory
where
  F: Fn(Value) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
  T: Into<Resolvable>,
{
  let f = move |input: Value| {
    let fut = f(input);
    async move { fut.await.map(Into::<Resolvable>::into) }.boxed()
  };

  ComponentFactory::new(FnComponent {
    name: name.into(),
    f: Box::new(f),
  })
}
