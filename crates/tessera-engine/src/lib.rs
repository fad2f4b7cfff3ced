//! Tessera Engine
//!
//! Resolves trees of asynchronous components into plain values.
//!
//! A tree is built from inert [`Element`]s. Running one invokes its
//! component, deep-resolves whatever the component returned (pending values,
//! arrays, records, further elements), then hands the result to the
//! element's continuation, whose return value is the next stage.
//!
//! ```text
//!   execute ──► invoke component ──► resolve_deep ──► continuation ─┐
//!                      ▲                   │                        │
//!                      └──── nested elements ◄──────────────────────┘
//! ```
//!
//! Two combinators shape execution:
//! - [`stream`] runs a sub-tree in a streaming scope, where
//!   [`StreamableValue`]s pass through live instead of being awaited.
//! - [`collect`] runs independent sub-trees concurrently and joins their
//!   named outputs into a record. The first failure fails the join.
//!
//! Scope state lives in an immutable [`ExecutionContext`] carried through
//! every call, so concurrent branches never see each other's scopes.

mod component;
mod context;
mod element;
mod error;
mod executor;
mod resolver;
mod scope;
mod stream;
mod value;
mod workflow;

pub use component::{Component, ComponentFactory, ComponentOpts, FnComponent, component};
pub use context::{ContextKey, ExecutionContext, create_context, use_context};
pub use element::{Continuation, Element, build};
pub use error::{BoxError, EngineError, WorkflowError};
pub use executor::{execute, execute_in};
pub use resolver::{resolve_deep, settle, settle_in};
pub use scope::{collect, collect_in, stream, stream_in};
pub use stream::{ChunkStream, FinalValue, StreamError, StreamableValue, collect_array, concat_strings};
pub use value::{Output, Resolvable};
pub use workflow::{Workflow, WorkflowRun};
