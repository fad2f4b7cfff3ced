//! Streaming scopes and fan-out joins.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use tokio::task::JoinError;
use tracing::{debug, instrument, warn};

use crate::context::ExecutionContext;
use crate::element::Element;
use crate::error::EngineError;
use crate::executor::execute_element;
use crate::resolver::cancellable;
use crate::value::Output;

/// Run `child` in a streaming scope of the ambient context.
pub async fn stream(child: Element) -> Result<Output, EngineError> {
  stream_in(child, &ExecutionContext::current()).await
}

/// Run `child` in a streaming scope derived from `ctx`.
///
/// Live streams produced inside come back as [`Output::Stream`]; the caller
/// decides whether to read them or await their terminal value. `ctx` itself
/// is left as it was.
pub async fn stream_in(child: Element, ctx: &ExecutionContext) -> Result<Output, EngineError> {
  execute_element(child, &ctx.with_streaming(true)).await
}

/// Run `children` concurrently in the ambient context and join them.
pub async fn collect(children: impl IntoIterator<Item = Element>) -> Result<Output, EngineError> {
  collect_in(children.into_iter().collect(), &ExecutionContext::current()).await
}

/// Run `children` concurrently and assemble the named outputs into a record.
///
/// Every branch is spawned up front. The first failure fails the join; the
/// other branches are not stopped, their results are dropped. Unnamed
/// branches run for their effects only. If two branches share a name the
/// later one wins.
#[instrument(name = "collect", skip_all, fields(branches = children.len()))]
pub async fn collect_in(children: Vec<Element>, ctx: &ExecutionContext) -> Result<Output, EngineError> {
  if ctx.is_cancelled() {
    return Err(EngineError::Cancelled);
  }

  let branches = children.into_iter().enumerate().map(|(index, child)| {
    let key = child.output_key().map(str::to_string);
    let branch = key.clone().unwrap_or_else(|| format!("#{index}"));
    let handle = tokio::spawn(execute_element(child, ctx));

    async move {
      match handle.await {
        Ok(Ok(output)) => Ok((key, output)),
        Ok(Err(e)) => Err(EngineError::Join {
          branch,
          source: Box::new(e),
        }),
        Err(e) => Err(join_failure(branch, e)),
      }
    }
  });

  let results = match cancellable(ctx, try_join_all(branches)).await? {
    Ok(results) => results,
    Err(e) => {
      warn!(error = %e, "collect_failed");
      return Err(e);
    }
  };

  let mut record = BTreeMap::new();
  for (key, output) in results {
    if let Some(key) = key {
      record.insert(key, output);
    }
  }
  debug!(named = record.len(), "collect_completed");

  Ok(Output::record(record))
}

fn join_failure(branch: String, e: JoinError) -> EngineError {
  if !e.is_panic() {
    return EngineError::Join {
      branch,
      source: Box::new(EngineError::Cancelled),
    };
  }

  let payload = e.into_panic();
  let message = payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "unknown panic".to_string());

  EngineError::BranchPanicked { branch, message }
}
