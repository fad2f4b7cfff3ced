//! Tessera Checkpoint
//!
//! Execution tracking for the Tessera engine. The engine emits an
//! [`ExecutionEvent`] for every component invocation; an
//! [`ExecutionRecorder`] decides what to do with them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tessera-engine                         │
//! │  - emits ComponentStarted / Completed / Failed              │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ExecutionRecorder                       │
//! │  NoopRecorder       - discards events                       │
//! │  ChannelRecorder    - forwards to an mpsc channel           │
//! │  CheckpointRecorder - builds a masked execution tree        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod events;
mod secrets;
mod tree;

pub use events::{ChannelRecorder, ExecutionEvent, ExecutionRecorder, NoopRecorder};
pub use secrets::SECRET_MASK;
pub use tree::{CheckpointRecorder, ExecutionNode, STREAMING_PLACEHOLDER};
