//! Bundled demo workflows.

use std::time::Duration;

use clap::ValueEnum;
use futures::stream;
use serde_json::{Value, json};
use tessera_engine::{BoxError, ComponentFactory, Element, Output, StreamableValue, component, concat_strings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Demo {
  /// Draft some notes, then edit them
  Pipeline,
  /// Plan queries, search them concurrently, summarize the results
  Fanout,
  /// Narrate a sentence word by word
  Stream,
}

impl Demo {
  pub fn name(self) -> &'static str {
    match self {
      Demo::Pipeline => "pipeline",
      Demo::Fanout => "fanout",
      Demo::Stream => "stream",
    }
  }

  pub fn default_input(self) -> Value {
    match self {
      Demo::Pipeline | Demo::Fanout => json!({ "topic": "rust" }),
      Demo::Stream => json!({ "text": "the quick brown fox jumps over the lazy dog" }),
    }
  }

  pub fn element(self, input: Value) -> Element {
    match self {
      Demo::Pipeline => pipeline(input),
      Demo::Fanout => fanout(input),
      Demo::Stream => narrate().element(input),
    }
  }
}

fn text_of(output: &Output) -> String {
  match output.as_value() {
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
    None => String::new(),
  }
}

fn pipeline(input: Value) -> Element {
  let draft = component("Draft", |input: Value| async move {
    let topic = input["topic"].as_str().unwrap_or("nothing").to_string();
    Ok(format!("some notes on {topic}"))
  });

  let edit = component("Edit", |input: Value| async move {
    let text = input["text"].as_str().unwrap_or_default();
    let mut chars = text.chars();
    let edited = match chars.next() {
      Some(first) => first.to_uppercase().chain(chars).collect::<String>() + ".",
      None => String::new(),
    };
    Ok(edited)
  });

  draft
    .element(input)
    .then(move |out: Output| edit.element(json!({ "text": text_of(&out) })))
}

fn fanout(input: Value) -> Element {
  let plan = component("Plan", |input: Value| async move {
    let topic = input["topic"].as_str().unwrap_or("nothing").to_string();
    Ok(json!([
      format!("{topic} history"),
      format!("{topic} today"),
      format!("{topic} roadmap")
    ]))
  });

  let search = component("Search", |input: Value| async move {
    let query = input["query"].as_str().unwrap_or_default().to_string();
    // Simulated latency, longer queries take longer.
    tokio::time::sleep(Duration::from_millis(10 * query.len() as u64)).await;
    Ok(json!({ "query": query, "hits": query.len() * 7 }))
  });

  let summarize = component("Summarize", |input: Value| async move {
    let results = input.as_object().cloned().unwrap_or_default();
    let hits: u64 = results.values().filter_map(|r| r["hits"].as_u64()).sum();
    Ok(format!("{} queries, {hits} hits", results.len()))
  });

  plan.element(input).then(move |queries: Output| {
    let queries = queries
      .as_value()
      .and_then(Value::as_array)
      .cloned()
      .unwrap_or_default();

    let branches = queries
      .into_iter()
      .enumerate()
      .map(|(i, query)| search.element(json!({ "query": query })).output(format!("q{i}")));

    Element::collect(branches.collect::<Vec<_>>()).try_then(move |results: Output| {
      Ok::<_, BoxError>(summarize.element(results.into_value()?))
    })
  })
}

fn narrate() -> ComponentFactory {
  component("Narrate", |input: Value| async move {
    let words: Vec<String> = input["text"]
      .as_str()
      .unwrap_or_default()
      .split_whitespace()
      .map(|w| format!("{w} "))
      .collect();

    let source = stream::unfold(words.into_iter(), |mut words| async move {
      let word = words.next()?;
      tokio::time::sleep(Duration::from_millis(40)).await;
      Some((Ok::<_, BoxError>(Value::String(word)), words))
    });

    Ok(StreamableValue::aggregate(source, concat_strings))
  })
}

#[cfg(test)]
mod tests {
  use tessera_engine::execute;

  use super::*;

  #[tokio::test]
  async fn pipeline_edits_the_draft() {
    let out = execute(Demo::Pipeline.element(Demo::Pipeline.default_input()))
      .await
      .unwrap();
    assert_eq!(out.into_value().unwrap(), json!("Some notes on rust."));
  }

  #[tokio::test]
  async fn fanout_summarizes_every_query() {
    let out = execute(Demo::Fanout.element(json!({ "topic": "go" })))
      .await
      .unwrap();
    // "go history" (10), "go today" (8), "go roadmap" (10) at 7 hits per char
    assert_eq!(out.into_value().unwrap(), json!("3 queries, 196 hits"));
  }

  #[tokio::test]
  async fn narration_aggregates_words() {
    let out = execute(Demo::Stream.element(json!({ "text": "a b" })))
      .await
      .unwrap();
    assert_eq!(out.into_value().unwrap(), json!("a b "));
  }
}
