#![forbid(unsafe_code)]

//! Single-threaded reactive primitives for remodel.
//!
//! This crate provides the change-tracking containers the mapping core
//! builds its view-model graphs out of:
//!
//! - [`Observable`]: a shared, version-tracked value wrapper with change
//!   notification via subscriber callbacks.
//! - [`ObservableVec`]: a shared ordered sequence with atomic replacement,
//!   element-level mutation, and batched change notification.
//! - [`Computed`]: a lazily-evaluated, memoized value derived from a read
//!   closure, optionally writable and optionally deferred.
//! - [`Subscription`]: RAII guard that automatically unsubscribes on drop.
//! - [`DeferScope`]: RAII guard that defers automatic evaluation of any
//!   [`Computed`] constructed inside it until the outermost scope exits.
//!
//! # Architecture
//!
//! All containers use `Rc<RefCell<..>>` for single-threaded shared
//! ownership; clones of a container are handles to the same cell. Borrows
//! are never held across subscriber callbacks, so callbacks may freely read
//! or mutate the container they were notified about.
//!
//! `DeferScope` uses a thread-local context with a nesting counter and a
//! FIFO queue. Nested scopes are supported; only the outermost scope
//! triggers the flush.
//!
//! # Invariants
//!
//! 1. Version increments exactly once per mutation that changes the value.
//! 2. Subscribers are notified in registration order.
//! 3. Setting a value equal to the current value is a no-op (no version
//!    bump, no notifications).
//! 4. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 5. A batched [`ObservableVec`] mutation notifies at most once, after the
//!    whole batch has been applied.
//! 6. A non-deferred [`Computed`] constructed inside a [`DeferScope`] is
//!    evaluated exactly once when the outermost scope exits, unless it was
//!    already read before the flush. A deferred one is never auto-evaluated.

pub mod computed;
pub mod defer;
pub mod observable;
pub mod vec;

pub use computed::Computed;
pub use defer::DeferScope;
pub use observable::{Observable, Subscription};
pub use vec::ObservableVec;
