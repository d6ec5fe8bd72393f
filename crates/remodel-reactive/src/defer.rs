//! Deferred evaluation of computed views across nested traversals.
//!
//! A graph-construction pass (remodel's materialize) may create computed
//! views whose read closures reach across the graph being built, at a sibling
//! or parent that does not exist yet. Evaluating such a view at construction
//! time would observe a half-built graph, so construction inside a
//! [`DeferScope`] queues the evaluation instead. When the *outermost* scope
//! exits, the queue is flushed once, in FIFO order.
//!
//! # Invariants
//!
//! 1. The nesting counter is restored on every exit path (`Drop`), so a
//!    panicking traversal does not leave later calls permanently nested.
//! 2. A flush happens only on a normal exit of the outermost scope; during
//!    panic unwinding the queue is discarded unflushed.
//! 3. Each queued evaluation runs at most once.
//! 4. Work scheduled during a flush (by evaluations that construct further
//!    views) runs in the same flush, after the already-queued work.

use std::cell::RefCell;

thread_local! {
    static CTX: RefCell<DeferCtx> = RefCell::new(DeferCtx {
        depth: 0,
        queue: Vec::new(),
    });
}

struct DeferCtx {
    depth: usize,
    queue: Vec<Box<dyn FnOnce()>>,
}

/// Whether a `DeferScope` is currently active on this thread.
#[must_use]
pub fn is_active() -> bool {
    CTX.with(|ctx| ctx.borrow().depth > 0)
}

/// Current nesting depth (0 when no scope is active).
#[must_use]
pub fn depth() -> usize {
    CTX.with(|ctx| ctx.borrow().depth)
}

/// Queue `work` for the outermost scope's flush.
///
/// With no active scope the work runs immediately.
pub fn schedule(work: impl FnOnce() + 'static) {
    let mut pending = Some(Box::new(work) as Box<dyn FnOnce()>);
    CTX.with(|ctx| {
        let mut ctx = ctx.borrow_mut();
        if ctx.depth > 0
            && let Some(work) = pending.take()
        {
            ctx.queue.push(work);
        }
    });
    if let Some(work) = pending {
        work();
    }
}

/// RAII guard marking one level of graph construction.
///
/// Construction of non-deferred [`Computed`](crate::Computed) views inside
/// the guard queues their first evaluation; dropping the outermost guard
/// flushes the queue (unless unwinding from a panic).
pub struct DeferScope {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl DeferScope {
    /// Enter a (possibly nested) defer scope.
    #[must_use]
    pub fn enter() -> Self {
        CTX.with(|ctx| ctx.borrow_mut().depth += 1);
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Drop for DeferScope {
    fn drop(&mut self) {
        let at_root = CTX.with(|ctx| {
            let mut ctx = ctx.borrow_mut();
            ctx.depth -= 1;
            ctx.depth == 0
        });
        if !at_root {
            return;
        }
        if std::thread::panicking() {
            CTX.with(|ctx| ctx.borrow_mut().queue.clear());
            return;
        }
        // Drain in waves: a flushed evaluation may re-enter a scope of its
        // own and queue more work for this flush.
        loop {
            let wave: Vec<Box<dyn FnOnce()>> =
                CTX.with(|ctx| std::mem::take(&mut ctx.borrow_mut().queue));
            if wave.is_empty() {
                break;
            }
            tracing::trace!(pending = wave.len(), "flushing deferred evaluations");
            for work in wave {
                work();
            }
        }
    }
}

impl std::fmt::Debug for DeferScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferScope").field("depth", &depth()).finish()
    }
}
