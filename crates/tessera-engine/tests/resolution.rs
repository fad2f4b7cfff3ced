use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{Value, json};
use tessera_engine::{
  BoxError, ComponentFactory, EngineError, Element, ExecutionContext, Output, Resolvable, collect, component, execute,
  execute_in, resolve_deep,
};
use tokio_util::sync::CancellationToken;

fn constant(name: &str, value: Value) -> ComponentFactory {
  component(name, move |_| {
    let value = value.clone();
    async move { Ok(value) }
  })
}

fn delayed(ms: u64, value: Value) -> Resolvable {
  Resolvable::pending(async move {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Ok(value)
  })
}

#[tokio::test]
async fn resolving_plain_data_is_idempotent() {
  let ctx = ExecutionContext::new();
  for value in [json!(3), json!("s"), json!(null), json!([1, [2, 3]]), json!({ "a": { "b": [true] } })] {
    let once = resolve_deep(value.clone().into(), &ctx).await.unwrap().into_value().unwrap();
    let twice = resolve_deep(once.clone().into(), &ctx).await.unwrap().into_value().unwrap();
    assert_eq!(once, value);
    assert_eq!(twice, value);
  }
}

#[tokio::test]
async fn shape_is_preserved_regardless_of_completion_order() {
  let ctx = ExecutionContext::new();
  let mut inner = BTreeMap::new();
  inner.insert("slow".to_string(), delayed(30, json!("s")));
  inner.insert("fast".to_string(), delayed(1, json!("f")));

  let tree = Resolvable::Array(vec![
    delayed(20, json!(0)),
    delayed(5, json!(1)),
    Resolvable::Record(inner),
    json!("plain").into(),
  ]);

  let out = resolve_deep(tree, &ctx).await.unwrap();
  assert_eq!(
    out.into_value().unwrap(),
    json!([0, 1, { "fast": "f", "slow": "s" }, "plain"])
  );
}

#[tokio::test]
async fn pipeline_appends_in_continuation() {
  let first = constant("First", json!("x"));
  let element = first.element(json!({})).then(|out: Output| {
    let prefix = out.as_value().and_then(Value::as_str).unwrap_or_default().to_string();
    prefix + "y"
  });

  let out = execute(element).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!("xy"));
}

#[tokio::test]
async fn continuation_equals_running_it_on_the_resolved_output() {
  let double = |out: Output| {
    let n = out.as_value().and_then(Value::as_i64).unwrap_or_default();
    json!(n * 2)
  };

  let chained = execute(constant("Seven", json!(7)).element(json!({})).then(double))
    .await
    .unwrap();

  let resolved = execute(constant("Seven", json!(7)).element(json!({}))).await.unwrap();
  let direct = execute(double(resolved)).await.unwrap();

  assert_eq!(chained.into_value().unwrap(), direct.into_value().unwrap());
}

#[tokio::test]
async fn continuations_chain_in_order() {
  let element = constant("Start", json!("a"))
    .element(json!({}))
    .then(|out: Output| format!("{}b", out.as_value().and_then(Value::as_str).unwrap_or_default()))
    .then(|out: Output| format!("{}c", out.as_value().and_then(Value::as_str).unwrap_or_default()));

  assert_eq!(execute(element).await.unwrap().into_value().unwrap(), json!("abc"));
}

#[tokio::test]
async fn continuation_may_return_another_element() {
  let upper = component("Upper", |input: Value| async move {
    Ok(input["text"].as_str().unwrap_or_default().to_uppercase())
  });

  let element = constant("Greeting", json!("hello"))
    .element(json!({}))
    .then(move |out: Output| upper.element(json!({ "text": out.as_value().cloned() })));

  assert_eq!(execute(element).await.unwrap().into_value().unwrap(), json!("HELLO"));
}

#[tokio::test]
async fn components_may_return_nested_elements() {
  let leaf = constant("Leaf", json!(42));
  let wrapper = component("Wrapper", move |_| {
    let leaf = leaf.clone();
    async move {
      Ok(Resolvable::record([
        ("answer", Resolvable::from(leaf.element(json!({})))),
        ("later", delayed(1, json!([1, 2]))),
      ]))
    }
  });

  let out = execute(wrapper.element(json!({}))).await.unwrap();
  assert_eq!(out.into_value().unwrap(), json!({ "answer": 42, "later": [1, 2] }));
}

#[tokio::test]
async fn component_errors_reach_the_caller() {
  let fail = component("Fail", |_| async { Err::<Value, _>("boom".into()) });
  let outer = component("Outer", move |_| {
    let fail = fail.clone();
    async move { Ok(fail.element(json!({}))) }
  });

  let err = execute(outer.element(json!({}))).await.unwrap_err();
  assert!(matches!(&err, EngineError::Component { component, .. } if component == "Fail"));
  assert_eq!(err.root_cause().to_string(), "boom");
}

#[tokio::test]
async fn null_is_not_executable() {
  let err = execute(Value::Null).await.unwrap_err();
  assert_eq!(err.to_string(), "invalid input: cannot execute a null element");
}

#[tokio::test]
async fn non_elements_are_resolved_directly() {
  let out = execute(Resolvable::Array(vec![delayed(1, json!("a")), json!("b").into()]))
    .await
    .unwrap();
  assert_eq!(out.into_value().unwrap(), json!(["a", "b"]));
}

#[tokio::test]
async fn cancelled_before_start() {
  let token = CancellationToken::new();
  token.cancel();
  let ctx = ExecutionContext::new().with_cancel(token);

  let err = execute_in(constant("Never", json!(1)).element(json!({})), &ctx)
    .await
    .unwrap_err();
  assert!(matches!(err, EngineError::Cancelled));
}

#[tokio::test]
async fn cancelled_while_running() {
  let slow = component("Slow", |_| async {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(json!("late"))
  });

  let token = CancellationToken::new();
  let ctx = ExecutionContext::new().with_cancel(token.clone());
  tokio::spawn(async move {
    tokio::time::sleep(Duration::from_millis(10)).await;
    token.cancel();
  });

  let err = execute_in(slow.element(json!({})), &ctx).await.unwrap_err();
  assert!(err.is_cancelled());
}

fn forever() -> ComponentFactory {
  component("Forever", |_| async { Ok(forever().element(json!({}))) })
}

#[tokio::test]
async fn self_recursion_hits_the_depth_guard() {
  let ctx = ExecutionContext::new().with_max_depth(16);
  let err = execute_in(forever().element(json!({})), &ctx).await.unwrap_err();
  assert!(matches!(err, EngineError::DepthExceeded { limit: 16 }));
}

fn reentrant() -> ComponentFactory {
  component("Reentrant", |_| async {
    let out = reentrant().call(json!({})).await?;
    Ok::<Output, BoxError>(out)
  })
}

#[tokio::test]
async fn calling_itself_from_the_body_hits_the_depth_guard() {
  let ctx = ExecutionContext::new().with_max_depth(16);
  let err = execute_in(reentrant().element(json!({})), &ctx).await.unwrap_err();

  assert!(matches!(&err, EngineError::Component { component, .. } if component == "Reentrant"));
  assert_eq!(err.root_cause().to_string(), "maximum resolution depth of 16 exceeded");
}

fn fan_out_forever() -> ComponentFactory {
  component("FanOutForever", |_| async {
    let out = collect([fan_out_forever().element(json!({})).output("again")]).await?;
    Ok::<Output, BoxError>(out)
  })
}

#[tokio::test]
async fn recursive_fan_out_hits_the_depth_guard() {
  let ctx = ExecutionContext::new().with_max_depth(16);
  let err = execute_in(fan_out_forever().element(json!({})), &ctx).await.unwrap_err();
  assert_eq!(err.root_cause().to_string(), "maximum resolution depth of 16 exceeded");
}

#[tokio::test]
async fn builder_accepts_a_continuation() {
  let element = Element::build(
    &constant("One", json!(1)),
    json!({}),
    Some(Box::new(|out: Output| Ok(Resolvable::from(out)))),
  );
  assert_eq!(execute(element).await.unwrap().into_value().unwrap(), json!(1));
}
