use std::time::Duration;

use futures::StreamExt;
use serde_json::{Value, json};
use tessera_engine::{
  BoxError, ComponentFactory, EngineError, Element, ExecutionContext, Output, StreamableValue, collect, component,
  concat_strings, execute, settle, stream,
};

/// Emits the words of `input.text` one at a time.
fn words() -> ComponentFactory {
  component("Words", |input: Value| async move {
    let text = input["text"].as_str().unwrap_or_default().to_string();
    let chunks = text.split(' ').map(|w| json!(format!("{w} "))).collect();
    Ok(StreamableValue::from_chunks(chunks, concat_strings))
  })
}

/// Reports the streaming flags seen by its body.
fn flags() -> ComponentFactory {
  component("Flags", |_| async {
    let ctx = ExecutionContext::current();
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(json!({ "streaming": ctx.streaming(), "chain": ctx.has_streaming_in_chain() }))
  })
}

#[tokio::test]
async fn outside_a_stream_scope_the_final_value_is_returned() {
  let out = execute(words().element(json!({ "text": "a b c" }))).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!("a b c "));
}

#[tokio::test]
async fn inside_a_stream_scope_the_live_object_is_returned() {
  let out = stream(words().element(json!({ "text": "a b c" }))).await.unwrap();
  let live = out.into_stream().expect("expected a live stream");

  let chunks: Vec<Value> = live.into_chunks().map(|c| c.unwrap()).collect().await;
  assert_eq!(chunks, vec![json!("a "), json!("b "), json!("c ")]);
}

#[tokio::test]
async fn both_paths_converge_on_the_same_value() {
  let plain = execute(words().element(json!({ "text": "x y" }))).await.unwrap();
  let live = execute(Element::stream(words().element(json!({ "text": "x y" }))))
    .await
    .unwrap();

  assert!(live.has_stream());
  assert_eq!(plain.into_value().unwrap(), settle(live).await.unwrap());
}

#[tokio::test]
async fn streaming_continuation_sees_the_unresolved_stream() {
  let element = Element::stream(words().element(json!({ "text": "hi" })).then(|out: Output| {
    assert!(matches!(out, Output::Stream(_)));
    out
  }));

  let out = execute(element).await.unwrap();
  assert!(matches!(out, Output::Stream(_)));
}

#[tokio::test]
async fn plain_continuation_sees_the_final_value() {
  let element = words()
    .element(json!({ "text": "hi there" }))
    .then(|out: Output| out.as_value().and_then(Value::as_str).map(str::trim).unwrap_or_default().to_string());

  assert_eq!(execute(element).await.unwrap().into_value().unwrap(), json!("hi there"));
}

#[tokio::test]
async fn concurrent_branches_keep_their_own_flag() {
  let out = collect([
    Element::stream(flags().element(json!({}))).output("live"),
    flags().element(json!({})).output("plain"),
  ])
  .await
  .unwrap();

  assert_eq!(
    out.into_value().unwrap(),
    json!({
      "live": { "streaming": true, "chain": true },
      "plain": { "streaming": false, "chain": false },
    })
  );
}

#[tokio::test]
async fn opting_out_keeps_the_ancestry() {
  let inner = flags();
  let opt_out = component("OptOut", move |_| {
    let inner = inner.clone();
    async move {
      let ctx = ExecutionContext::current().with_streaming(false);
      Ok(tessera_engine::execute_in(inner.element(json!({})), &ctx).await?)
    }
  });

  let out = stream(opt_out.element(json!({}))).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!({ "streaming": false, "chain": true }));
}

#[tokio::test]
async fn leaving_a_stream_scope_restores_the_caller() {
  let scoped = flags();
  let outer = component("Outer", move |_| {
    let scoped = scoped.clone();
    async move {
      let inside = stream(scoped.element(json!({}))).await?.into_value()?;
      let after = ExecutionContext::current();
      Ok(json!({ "inside": inside["streaming"], "after": after.streaming() }))
    }
  });

  let out = execute(outer.element(json!({}))).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!({ "inside": true, "after": false }));
}

#[tokio::test]
async fn failed_stream_scope_leaves_the_caller_untouched() {
  let fail = component("Fail", |_| async { Err::<Value, _>("stream broke".into()) });
  let outer = component("Outer", move |_| {
    let fail = fail.clone();
    async move {
      let failed = stream(fail.element(json!({}))).await.is_err();
      Ok(json!({ "failed": failed, "streaming": ExecutionContext::current().streaming() }))
    }
  });

  let out = execute(outer.element(json!({}))).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!({ "failed": true, "streaming": false }));
}

#[tokio::test]
async fn source_errors_surface_as_stream_failures() {
  let broken = component("Broken", |_| async {
    let source = futures::stream::iter(vec![Ok(json!("a")), Err::<Value, BoxError>("connection reset".into())]);
    Ok(StreamableValue::aggregate(source, concat_strings))
  });

  let err = execute(broken.element(json!({}))).await.unwrap_err();
  assert!(matches!(err, EngineError::Stream { .. }));
  assert_eq!(err.root_cause().to_string(), "connection reset");
}

#[tokio::test]
async fn terminal_values_are_resolved_further() {
  let nested = component("Nested", |_| async {
    let inner = words().element(json!({ "text": "deep" }));
    Ok(StreamableValue::new(futures::stream::empty(), async move { Ok(inner.into()) }))
  });

  let out = execute(nested.element(json!({}))).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!("deep "));
}
