//! Dual-mode streaming values.
//!
//! A [`StreamableValue`] carries a live chunk sequence and a terminal value.
//! Inside a streaming scope the engine hands the object through untouched;
//! everywhere else it awaits the terminal value instead. Either half may be
//! consumed, but the value as a whole is consumed once.

use std::fmt;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, Stream, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::error::BoxError;
use crate::value::Resolvable;

/// Live sequence of chunks.
pub type ChunkStream = BoxStream<'static, Result<Value, BoxError>>;

/// Terminal value of a stream.
pub type FinalValue = BoxFuture<'static, Result<Resolvable, BoxError>>;

/// Failure of an aggregated stream's terminal value.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct StreamError {
  pub message: String,
}

/// A value exposing both live chunks and an eventual terminal value.
pub struct StreamableValue {
  chunks: ChunkStream,
  final_value: FinalValue,
}

impl StreamableValue {
  /// Build from an explicit chunk sequence and terminal value.
  ///
  /// The caller is responsible for keeping the two consistent.
  pub fn new<S, F>(chunks: S, final_value: F) -> Self
  where
    S: Stream<Item = Result<Value, BoxError>> + Send + 'static,
    F: Future<Output = Result<Resolvable, BoxError>> + Send + 'static,
  {
    Self {
      chunks: chunks.boxed(),
      final_value: final_value.boxed(),
    }
  }

  /// Tee a chunk source into a live sequence and an aggregated terminal
  /// value.
  ///
  /// A driver task is spawned on the current tokio runtime; it pulls the
  /// source to completion whether or not anyone reads the live sequence.
  /// The first source error ends both halves.
  pub fn aggregate<S, E, A>(source: S, aggregator: A) -> Self
  where
    S: Stream<Item = Result<Value, E>> + Send + 'static,
    E: Into<BoxError>,
    A: FnOnce(Vec<Value>) -> Value + Send + 'static,
  {
    let (chunk_tx, chunk_rx) = mpsc::unbounded_channel::<Result<Value, BoxError>>();
    let (final_tx, final_rx) = oneshot::channel::<Result<Value, StreamError>>();

    tokio::spawn(async move {
      let mut source = Box::pin(source);
      let mut collected = Vec::new();

      while let Some(item) = source.next().await {
        match item {
          Ok(chunk) => {
            // Live receiver may have been dropped
            let _ = chunk_tx.send(Ok(chunk.clone()));
            collected.push(chunk);
          }
          Err(e) => {
            let e: BoxError = e.into();
            let failure = StreamError {
              message: e.to_string(),
            };
            let _ = chunk_tx.send(Err(e));
            let _ = final_tx.send(Err(failure));
            return;
          }
        }
      }

      let _ = final_tx.send(Ok(aggregator(collected)));
    });

    let chunks = stream::unfold(chunk_rx, |mut rx| async move {
      rx.recv().await.map(|item| (item, rx))
    });

    let final_value = async move {
      match final_rx.await {
        Ok(Ok(value)) => Ok(Resolvable::Value(value)),
        Ok(Err(e)) => Err(Box::new(e) as BoxError),
        Err(_) => Err(Box::new(StreamError {
          message: "stream source ended without a terminal value".to_string(),
        }) as BoxError),
      }
    };

    Self::new(chunks, final_value)
  }

  /// Aggregate a fixed list of chunks. Mostly useful for tests and demos.
  pub fn from_chunks<A>(chunks: Vec<Value>, aggregator: A) -> Self
  where
    A: FnOnce(Vec<Value>) -> Value + Send + 'static,
  {
    Self::aggregate(stream::iter(chunks.into_iter().map(Ok::<_, BoxError>)), aggregator)
  }

  /// Split into the live sequence and the terminal value.
  pub fn into_parts(self) -> (ChunkStream, FinalValue) {
    (self.chunks, self.final_value)
  }

  /// Take the live sequence, discarding the terminal value.
  pub fn into_chunks(self) -> ChunkStream {
    self.chunks
  }

  /// Take the terminal value, discarding the live sequence.
  pub fn into_final(self) -> FinalValue {
    self.final_value
  }
}

impl fmt::Debug for StreamableValue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StreamableValue").finish_non_exhaustive()
  }
}

/// Concatenate string chunks. Non-string chunks use their JSON form.
pub fn concat_strings(chunks: Vec<Value>) -> Value {
  let text: String = chunks
    .into_iter()
    .map(|chunk| match chunk {
      Value::String(s) => s,
      other => other.to_string(),
    })
    .collect();
  Value::String(text)
}

/// Collect chunks into a JSON array.
pub fn collect_array(chunks: Vec<Value>) -> Value {
  Value::Array(chunks)
}
