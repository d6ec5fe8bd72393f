//! Bidirectional mapping between plain data trees and reactive view
//! models.
//!
//! [`materialize`] turns nested objects, arrays and scalars into a graph
//! of reactive containers from `remodel-reactive`; [`dematerialize`] turns
//! such a graph back into a fresh plain tree. Mapping a source onto an
//! existing graph with [`materialize_into`] updates it in place: reactive
//! slots are written through, sequences are reconciled rather than
//! replaced, and nothing the source does not name is touched.
//!
//! # Architecture
//!
//! - [`node`] is the dynamic [`Node`] model shared by both sides: plain
//!   values with `Rc`-shared containers, plus the reactive containers.
//! - [`options`] resolves per-call configuration: path lists, factory
//!   hooks, process-wide defaults, and merging across repeated calls.
//! - [`engine`] walks sources against targets, keeping a call-scoped
//!   identity map so shared references and cycles come out shared, and a
//!   defer scope so computed views built by factories evaluate once the
//!   graph is complete.
//! - Sequences with a key function additionally support the `mapped_*`
//!   operations (lookup, create, remove, destroy) on [`SeqRef`].
//! - [`wire`] and [`visit`] wrap the core with JSON text entry points and
//!   a depth-first tree walker.
//!
//! # Invariants
//!
//! 1. A mapped sequence instance is never replaced by a later call onto
//!    the same target; its contents are reconciled with at most one
//!    mutation notification per call.
//! 2. Shared references and cycles in one source map to shared nodes.
//! 3. `create` factories run only where no mapped counterpart exists;
//!    `update` factories run on every pass.
//! 4. Dematerializing never mutates the mapped graph.
//! 5. All state is single-threaded; defaults and scheduling are
//!    thread-local.

#![forbid(unsafe_code)]

pub mod engine;
mod error;
mod identity;
pub mod node;
pub mod options;
pub mod paths;
mod reconcile;
mod sequence;
pub mod visit;
pub mod wire;

pub use engine::{dematerialize, materialize, materialize_into};
pub use error::MapError;
pub use node::{ArrayRef, Node, ObjectRef, RootMeta, SeqMeta, SeqRef};
pub use options::{
    ArrayChangedFn, ArrayEvent, Created, CreateFn, FactoryInput, Hooks, KeyFn, Mapping, UpdateFn,
    default_options, reset_default_options, set_default_options,
};
pub use visit::visit_tree;
pub use wire::{
    dematerialize_json, dematerialize_json_pretty, materialize_json, materialize_json_into,
};

pub use remodel_reactive as reactive;
