//! Resolvable trees and their resolved outputs.

use std::collections::BTreeMap;
use std::fmt;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tessera_checkpoint::STREAMING_PLACEHOLDER;

use crate::element::Element;
use crate::error::{BoxError, EngineError};
use crate::stream::StreamableValue;

/// A value the engine can resolve.
///
/// Resolution is assumed to terminate: trees must be finite. Runaway
/// recursion is cut off by the context's depth limit.
pub enum Resolvable {
  /// Primitives and already-resolved JSON. Returned as-is.
  Value(Value),
  /// Resolved element-wise, concurrently, preserving order.
  Array(Vec<Resolvable>),
  /// Resolved value-wise, concurrently, preserving keys.
  Record(BTreeMap<String, Resolvable>),
  /// Awaited, then resolved again.
  Pending(BoxFuture<'static, Result<Resolvable, BoxError>>),
  /// Executed, then its result resolved.
  Element(Element),
  /// Passed through in a streaming scope, otherwise replaced by its
  /// terminal value.
  Streamable(StreamableValue),
}

impl Resolvable {
  /// Wrap a future whose result is resolved in turn.
  pub fn pending<F, T>(fut: F) -> Self
  where
    F: Future<Output = Result<T, BoxError>> + Send + 'static,
    T: Into<Resolvable>,
  {
    Resolvable::Pending(async move { fut.await.map(Into::<Resolvable>::into) }.boxed())
  }

  /// Build a record from key/value pairs.
  pub fn record<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
  where
    K: Into<String>,
    V: Into<Resolvable>,
  {
    Resolvable::Record(
      entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect(),
    )
  }

  /// Short name of the variant, for logs.
  pub fn kind(&self) -> &'static str {
    match self {
      Resolvable::Value(_) => "value",
      Resolvable::Array(_) => "array",
      Resolvable::Record(_) => "record",
      Resolvable::Pending(_) => "pending",
      Resolvable::Element(_) => "element",
      Resolvable::Streamable(_) => "streamable",
    }
  }
}

impl fmt::Debug for Resolvable {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Resolvable::Value(v) => f.debug_tuple("Value").field(v).finish(),
      Resolvable::Array(items) => f.debug_tuple("Array").field(items).finish(),
      Resolvable::Record(map) => f.debug_tuple("Record").field(map).finish(),
      Resolvable::Pending(_) => f.write_str("Pending(..)"),
      Resolvable::Element(e) => f.debug_tuple("Element").field(e).finish(),
      Resolvable::Streamable(s) => f.debug_tuple("Streamable").field(s).finish(),
    }
  }
}

impl From<Value> for Resolvable {
  fn from(value: Value) -> Self {
    Resolvable::Value(value)
  }
}

impl From<&str> for Resolvable {
  fn from(value: &str) -> Self {
    Resolvable::Value(Value::String(value.to_string()))
  }
}

impl From<String> for Resolvable {
  fn from(value: String) -> Self {
    Resolvable::Value(Value::String(value))
  }
}

impl From<bool> for Resolvable {
  fn from(value: bool) -> Self {
    Resolvable::Value(Value::Bool(value))
  }
}

impl From<i64> for Resolvable {
  fn from(value: i64) -> Self {
    Resolvable::Value(Value::from(value))
  }
}

impl From<i32> for Resolvable {
  fn from(value: i32) -> Self {
    Resolvable::Value(Value::from(value))
  }
}

impl From<f64> for Resolvable {
  fn from(value: f64) -> Self {
    Resolvable::Value(Value::from(value))
  }
}

impl From<Element> for Resolvable {
  fn from(value: Element) -> Self {
    Resolvable::Element(value)
  }
}

impl From<StreamableValue> for Resolvable {
  fn from(value: StreamableValue) -> Self {
    Resolvable::Streamable(value)
  }
}

impl<T: Into<Resolvable>> From<Vec<T>> for Resolvable {
  fn from(value: Vec<T>) -> Self {
    Resolvable::Array(value.into_iter().map(Into::into).collect())
  }
}

impl<T: Into<Resolvable>> From<BTreeMap<String, T>> for Resolvable {
  fn from(value: BTreeMap<String, T>) -> Self {
    Resolvable::Record(value.into_iter().map(|(k, v)| (k, v.into())).collect())
  }
}

impl From<Output> for Resolvable {
  fn from(value: Output) -> Self {
    match value {
      Output::Value(v) => Resolvable::Value(v),
      Output::Stream(s) => Resolvable::Streamable(s),
      Output::Array(items) => Resolvable::Array(items.into_iter().map(Into::into).collect()),
      Output::Record(map) => Resolvable::Record(map.into_iter().map(|(k, v)| (k, v.into())).collect()),
    }
  }
}

/// A resolved value.
///
/// Arrays and records only appear as `Output::Array` / `Output::Record` when
/// they hold a live stream somewhere inside; otherwise they collapse into
/// plain JSON under `Output::Value`.
#[derive(Debug)]
pub enum Output {
  Value(Value),
  Stream(StreamableValue),
  Array(Vec<Output>),
  Record(BTreeMap<String, Output>),
}

impl Output {
  /// Build an array output, collapsing to JSON when no stream is present.
  pub fn array(items: Vec<Output>) -> Self {
    if items.iter().any(Output::has_stream) {
      Output::Array(items)
    } else {
      Output::Value(Value::Array(items.into_iter().filter_map(Output::into_plain).collect()))
    }
  }

  /// Build a record output, collapsing to JSON when no stream is present.
  pub fn record(entries: BTreeMap<String, Output>) -> Self {
    if entries.values().any(Output::has_stream) {
      Output::Record(entries)
    } else {
      Output::Value(Value::Object(
        entries
          .into_iter()
          .filter_map(|(k, v)| v.into_plain().map(|v| (k, v)))
          .collect(),
      ))
    }
  }

  /// Whether a live stream appears anywhere in this output.
  pub fn has_stream(&self) -> bool {
    match self {
      Output::Value(_) => false,
      Output::Stream(_) => true,
      Output::Array(items) => items.iter().any(Output::has_stream),
      Output::Record(map) => map.values().any(Output::has_stream),
    }
  }

  /// Borrow the plain JSON value, if this output is one.
  pub fn as_value(&self) -> Option<&Value> {
    match self {
      Output::Value(v) => Some(v),
      _ => None,
    }
  }

  /// Take the plain JSON value.
  ///
  /// Fails with [`EngineError::StreamNotResolved`] if a live stream is still
  /// present; use [`crate::settle`] to await terminal values first.
  pub fn into_value(self) -> Result<Value, EngineError> {
    if self.has_stream() {
      return Err(EngineError::StreamNotResolved);
    }
    Ok(self.into_plain().unwrap_or(Value::Null))
  }

  /// Take the live stream, if this output is one.
  pub fn into_stream(self) -> Option<StreamableValue> {
    match self {
      Output::Stream(s) => Some(s),
      _ => None,
    }
  }

  /// JSON view for recording, with streams replaced by a placeholder.
  pub fn snapshot(&self) -> Value {
    match self {
      Output::Value(v) => v.clone(),
      Output::Stream(_) => Value::String(STREAMING_PLACEHOLDER.to_string()),
      Output::Array(items) => Value::Array(items.iter().map(Output::snapshot).collect()),
      Output::Record(map) => Value::Object(
        map
          .iter()
          .map(|(k, v)| (k.clone(), v.snapshot()))
          .collect(),
      ),
    }
  }

  fn into_plain(self) -> Option<Value> {
    match self {
      Output::Value(v) => Some(v),
      Output::Stream(_) => None,
      Output::Array(items) => items
        .into_iter()
        .map(Output::into_plain)
        .collect::<Option<Vec<_>>>()
        .map(Value::Array),
      Output::Record(map) => map
        .into_iter()
        .map(|(k, v)| v.into_plain().map(|v| (k, v)))
        .collect::<Option<serde_json::Map<_, _>>>()
        .map(Value::Object),
    }
  }
}

impl From<Value> for Output {
  fn from(value: Value) -> Self {
    Output::Value(value)
  }
}
