//! Element execution.
//!
//! Contexts are immutable values, so a scope entered while running one
//! element can never leak into a sibling: the caller's context is the same
//! value after the call as before, whether the call succeeded or failed.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tessera_checkpoint::ExecutionEvent;
use tracing::{Instrument, debug, debug_span, error};
use uuid::Uuid;

use crate::component::{Component, display_name};
use crate::context::ExecutionContext;
use crate::element::{Continuation, Element, ElementKind};
use crate::error::EngineError;
use crate::resolver::{cancellable, resolve_deep};
use crate::scope::{collect_in, stream_in};
use crate::value::{Output, Resolvable};

/// Run an element (or any resolvable value) in the ambient context.
///
/// Inside a component body the ambient context is that component's; outside
/// any execution it is a fresh root context.
pub async fn execute(value: impl Into<Resolvable>) -> Result<Output, EngineError> {
  execute_in(value, &ExecutionContext::current()).await
}

/// Run an element (or any resolvable value) in `ctx`.
///
/// Elements are invoked and their continuation chains followed to the end;
/// anything else goes straight to [`resolve_deep`].
pub async fn execute_in(value: impl Into<Resolvable>, ctx: &ExecutionContext) -> Result<Output, EngineError> {
  let value = value.into();
  if matches!(value, Resolvable::Value(Value::Null)) {
    return Err(EngineError::InvalidInput {
      message: "cannot execute a null element".to_string(),
    });
  }
  if ctx.is_cancelled() {
    return Err(EngineError::Cancelled);
  }

  match value {
    Resolvable::Element(element) => execute_element(element, ctx).await,
    other => resolve_deep(other, ctx).await,
  }
}

/// Every element, including one started from inside a component body,
/// counts one step against the context's depth limit.
pub(crate) fn execute_element(element: Element, ctx: &ExecutionContext) -> BoxFuture<'static, Result<Output, EngineError>> {
  let parent = ctx.clone();
  async move {
    let ctx = parent.descend()?;
    let label = element.label();
    let Element {
      kind, continuation, ..
    } = element;

    let output = match kind {
      ElementKind::Invoke { component, input } => invoke(component, input, &ctx).await?,
      ElementKind::Stream(child) => stream_in(*child, &ctx).await?,
      ElementKind::Collect(children) => collect_in(children, &ctx).await?,
      ElementKind::Provide { entry, child } => execute_element(*child, &ctx.with_entry(entry)).await?,
      ElementKind::Chain(inner) => execute_element(*inner, &ctx).await?,
    };

    continue_with(continuation, output, &label, &ctx).await
  }
  .boxed()
}

/// Run one component invocation, recording it as a node under the
/// context's current node.
async fn invoke(component: Arc<dyn Component>, input: Value, ctx: &ExecutionContext) -> Result<Output, EngineError> {
  let name = display_name(component.as_ref());
  let opts = component.opts();
  let node_id = Uuid::new_v4().to_string();
  let span = debug_span!("invoke", component = %name, node_id = %node_id, streaming = ctx.streaming());

  async move {
    ctx.recorder().record(ExecutionEvent::ComponentStarted {
      node_id: node_id.clone(),
      parent_id: ctx.node_id().map(str::to_string),
      component: name.clone(),
      props: input.clone(),
      secret_props: opts.secret_props,
      secret_outputs: opts.secret_outputs,
      metadata: opts.metadata,
    });
    debug!("component_started");

    let node_ctx = ctx.with_node(node_id.clone());
    let result = node_ctx
      .scope(run_body(component.as_ref(), input, &name, &node_ctx))
      .await;

    match &result {
      Ok(Output::Stream(_)) => {
        ctx
          .recorder()
          .record(ExecutionEvent::StreamPassedThrough { node_id });
        debug!("component_streaming");
      }
      Ok(output) => {
        ctx.recorder().record(ExecutionEvent::ComponentCompleted {
          node_id,
          output: output.snapshot(),
        });
        debug!("component_completed");
      }
      Err(e) => {
        ctx.recorder().record(ExecutionEvent::ComponentFailed {
          node_id,
          error: e.to_string(),
        });
        if matches!(e, EngineError::Component { component, .. } if *component == name) {
          error!(error = %e, "component_failed");
        } else {
          debug!(error = %e, "component_failed");
        }
      }
    }

    result
  }
  .instrument(span)
  .await
}

async fn run_body(
  component: &dyn Component,
  input: Value,
  name: &str,
  ctx: &ExecutionContext,
) -> Result<Output, EngineError> {
  let raw = cancellable(ctx, component.resolve(input))
    .await?
    .map_err(|source| EngineError::Component {
      component: name.to_string(),
      source,
    })?;

  match raw {
    // Streaming scope: hand the live object on untouched.
    Resolvable::Streamable(stream) if ctx.streaming() => Ok(Output::Stream(stream)),
    raw => resolve_deep(raw, ctx).await,
  }
}

/// Hand `output` to the continuation, if any, and execute what it returns.
async fn continue_with(
  continuation: Option<Continuation>,
  output: Output,
  label: &str,
  ctx: &ExecutionContext,
) -> Result<Output, EngineError> {
  let Some(continuation) = continuation else {
    return Ok(output);
  };

  let next = ctx
    .enter(|| continuation(output))
    .map_err(|source| EngineError::Continuation {
      component: label.to_string(),
      source,
    })?;

  execute_in(next, ctx).await
}
