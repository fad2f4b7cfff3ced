//! Deep resolution of nested values.

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use serde_json::Value;
use tracing::trace;

use crate::context::ExecutionContext;
use crate::error::EngineError;
use crate::executor::execute_element;
use crate::value::{Output, Resolvable};

/// Recursively force every pending value, element, and (outside a streaming
/// scope) stream inside `value`.
///
/// Arrays and records are resolved concurrently and keep their shape. The
/// first failure anywhere rejects the whole call and partial results are
/// dropped.
pub fn resolve_deep(value: Resolvable, ctx: &ExecutionContext) -> BoxFuture<'static, Result<Output, EngineError>> {
  let parent = ctx.clone();
  async move {
    if let Resolvable::Value(v) = value {
      return Ok(Output::Value(v));
    }

    let ctx = parent.descend()?;
    trace!(kind = value.kind(), depth = ctx.depth(), "resolve");

    match value {
      Resolvable::Value(v) => Ok(Output::Value(v)),

      Resolvable::Pending(fut) => {
        let next = cancellable(&ctx, fut)
          .await?
          .map_err(|source| EngineError::Rejected { source })?;
        resolve_deep(next, &ctx).await
      }

      Resolvable::Streamable(stream) if ctx.streaming() => Ok(Output::Stream(stream)),

      Resolvable::Streamable(stream) => {
        let terminal = cancellable(&ctx, stream.into_final())
          .await?
          .map_err(|source| EngineError::Stream { source })?;
        resolve_deep(terminal, &ctx).await
      }

      Resolvable::Array(items) => {
        let outputs = try_join_all(items.into_iter().map(|item| resolve_deep(item, &ctx))).await?;
        Ok(Output::array(outputs))
      }

      Resolvable::Record(map) => {
        let (keys, values): (Vec<String>, Vec<Resolvable>) = map.into_iter().unzip();
        let outputs = try_join_all(values.into_iter().map(|v| resolve_deep(v, &ctx))).await?;
        Ok(Output::record(keys.into_iter().zip(outputs).collect()))
      }

      // Elements take their own depth step.
      Resolvable::Element(element) => execute_element(element, &parent).await,
    }
  }
  .boxed()
}

/// Await the terminal value of every stream left in `output`.
pub async fn settle(output: Output) -> Result<Value, EngineError> {
  settle_in(output, &ExecutionContext::current()).await
}

/// [`settle`] with an explicit context.
pub async fn settle_in(output: Output, ctx: &ExecutionContext) -> Result<Value, EngineError> {
  if let Output::Value(v) = output {
    return Ok(v);
  }
  resolve_deep(output.into(), &ctx.with_streaming(false))
    .await?
    .into_value()
}

/// Race `fut` against the context's cancellation token.
pub(crate) async fn cancellable<F: Future>(ctx: &ExecutionContext, fut: F) -> Result<F::Output, EngineError> {
  tokio::select! {
    biased;
    _ = ctx.cancel_token().cancelled() => Err(EngineError::Cancelled),
    out = fut => Ok(out),
  }
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use serde_json::json;

  use super::*;
  use crate::error::BoxError;
  use crate::stream::{StreamableValue, concat_strings};

  fn ready(v: Value) -> Resolvable {
    Resolvable::pending(async move { Ok(v) })
  }

  #[tokio::test]
  async fn resolved_values_are_unchanged() {
    let ctx = ExecutionContext::new();
    let value = json!({ "a": [1, 2, { "b": null }], "c": "d" });
    let out = resolve_deep(value.clone().into(), &ctx).await.unwrap();
    assert_eq!(out.into_value().unwrap(), value);
  }

  #[tokio::test]
  async fn pending_values_resolve_in_place() {
    let ctx = ExecutionContext::new();
    let mut record = BTreeMap::new();
    record.insert("x".to_string(), ready(json!(1)));
    record.insert(
      "y".to_string(),
      Resolvable::Array(vec![ready(json!("a")), Resolvable::pending(async { Ok(ready(json!("b"))) })]),
    );

    let out = resolve_deep(Resolvable::Record(record), &ctx).await.unwrap();
    assert_eq!(out.into_value().unwrap(), json!({ "x": 1, "y": ["a", "b"] }));
  }

  #[tokio::test]
  async fn first_rejection_fails_the_whole_tree() {
    let ctx = ExecutionContext::new();
    let value = Resolvable::Array(vec![
      ready(json!(1)),
      Resolvable::pending(async { Err::<Value, _>("nope".into()) }),
    ]);

    let err = resolve_deep(value, &ctx).await.unwrap_err();
    assert!(matches!(err, EngineError::Rejected { .. }));
    assert_eq!(err.root_cause().to_string(), "nope");
  }

  #[tokio::test]
  async fn streams_follow_the_streaming_flag() {
    let ctx = ExecutionContext::new();
    let plain = StreamableValue::from_chunks(vec![json!("a"), json!("b")], concat_strings);
    let out = resolve_deep(plain.into(), &ctx).await.unwrap();
    assert_eq!(out.as_value(), Some(&json!("ab")));

    let live = StreamableValue::from_chunks(vec![json!("a")], concat_strings);
    let out = resolve_deep(live.into(), &ctx.with_streaming(true)).await.unwrap();
    assert!(matches!(out, Output::Stream(_)));
    assert_eq!(settle_in(out, &ctx).await.unwrap(), json!("a"));
  }

  #[tokio::test]
  async fn cancelled_token_stops_pending_work() {
    let ctx = ExecutionContext::new();
    ctx.cancel_token().cancel();
    let err = resolve_deep(Resolvable::pending(futures::future::pending::<Result<Value, BoxError>>()), &ctx)
      .await
      .unwrap_err();
    assert!(err.is_cancelled());
  }

  #[tokio::test]
  async fn runaway_nesting_hits_the_depth_limit() {
    fn nest(n: usize) -> Resolvable {
      if n == 0 {
        return json!("bottom").into();
      }
      Resolvable::pending(async move { Ok(nest(n - 1)) })
    }

    let ctx = ExecutionContext::new().with_max_depth(8);
    assert!(resolve_deep(nest(4), &ctx).await.is_ok());
    let err = resolve_deep(nest(20), &ctx).await.unwrap_err();
    assert!(matches!(err, EngineError::DepthExceeded { limit: 8 }));
  }
}
