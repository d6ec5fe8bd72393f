//! Lazily-evaluated, memoized derived values.
//!
//! A `Computed<T>` wraps a read closure and caches its result. Dependencies
//! are wired explicitly with [`watch`](Computed::watch): when a watched
//! [`Observable`] changes, an already-evaluated computed re-runs its read
//! closure and notifies its own subscribers if the result changed.
//!
//! Construction interacts with [`defer`](crate::defer): a non-deferred
//! computed built outside any [`DeferScope`](crate::DeferScope) evaluates
//! eagerly; built inside one, its first evaluation is queued for the
//! outermost scope's flush. A computed constructed as *deferred* is never
//! evaluated automatically; the first [`get`](Computed::get) evaluates it.
//!
//! # Failure Modes
//!
//! - Read closure panic: propagates to whoever triggered the evaluation.
//! - [`set`](Computed::set) without a write closure: panics (programming
//!   error, same class as an out-of-bounds index).

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::defer;
use crate::observable::{Observable, Subscription};

struct Subscriber<T> {
    id: u64,
    callback: Rc<dyn Fn(&T)>,
}

struct ComputedInner<T> {
    read: Rc<dyn Fn() -> T>,
    write: Option<Rc<dyn Fn(T)>>,
    value: Option<T>,
    deferred: bool,
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
    watches: Vec<Subscription>,
}

/// A memoized value derived from a read closure.
pub struct Computed<T> {
    inner: Rc<RefCell<ComputedInner<T>>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    /// Create a computed that evaluates automatically: eagerly when no
    /// defer scope is active, otherwise once at the outermost flush.
    #[must_use]
    pub fn new(read: impl Fn() -> T + 'static) -> Self {
        let this = Self::raw(read, false);
        let handle = this.clone();
        defer::schedule(move || handle.evaluate());
        this
    }

    /// Create a deferred computed: never auto-evaluated, first read wins.
    #[must_use]
    pub fn deferred(read: impl Fn() -> T + 'static) -> Self {
        Self::raw(read, true)
    }

    fn raw(read: impl Fn() -> T + 'static, deferred: bool) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ComputedInner {
                read: Rc::new(read),
                write: None,
                value: None,
                deferred,
                next_id: 0,
                subscribers: Vec::new(),
                watches: Vec::new(),
            })),
        }
    }

    /// Attach a write closure, making [`set`](Computed::set) usable.
    #[must_use]
    pub fn with_write(self, write: impl Fn(T) + 'static) -> Self {
        self.inner.borrow_mut().write = Some(Rc::new(write));
        self
    }

    /// Current value, evaluating the read closure if needed.
    #[must_use]
    pub fn get(&self) -> T {
        if self.inner.borrow().value.is_none() {
            self.recompute();
        }
        self.inner
            .borrow()
            .value
            .clone()
            .expect("recompute stores a value")
    }

    /// Evaluate now unless a value is already cached. Used by the defer
    /// flush; a computed read before the flush is not re-evaluated.
    pub fn evaluate(&self) {
        if self.inner.borrow().value.is_none() {
            self.recompute();
        }
    }

    /// Whether the read closure has run at least once.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// Whether this computed was constructed as deferred.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.inner.borrow().deferred
    }

    /// Whether a write closure is attached.
    #[must_use]
    pub fn is_writable(&self) -> bool {
        self.inner.borrow().write.is_some()
    }

    /// Invoke the write closure with `value`.
    ///
    /// # Panics
    ///
    /// Panics when the computed has no write closure.
    pub fn set(&self, value: T) {
        let write = self
            .inner
            .borrow()
            .write
            .as_ref()
            .map(Rc::clone)
            .expect("computed is not writable");
        write(value);
    }

    /// Re-evaluate whenever `source` changes, notifying subscribers if the
    /// result changed. Before the first evaluation, changes are absorbed
    /// silently (the eventual first read sees current state anyway).
    pub fn watch<S: Clone + PartialEq + 'static>(&self, source: &Observable<S>) {
        let weak: Weak<RefCell<ComputedInner<T>>> = Rc::downgrade(&self.inner);
        let sub = source.subscribe(move |_| {
            if let Some(inner) = weak.upgrade() {
                let handle = Computed { inner };
                if handle.is_evaluated() {
                    handle.recompute();
                }
            }
        });
        self.inner.borrow_mut().watches.push(sub);
    }

    /// Subscribe to value changes (fires after a recompute that changed
    /// the cached value).
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(Subscriber {
                id,
                callback: Rc::new(callback),
            });
            id
        };
        let weak: Weak<RefCell<ComputedInner<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().subscribers.retain(|s| s.id != id);
            }
        })
    }

    /// Pointer identity of the underlying cell.
    #[must_use]
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Whether two handles share the same underlying cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn recompute(&self) {
        // The read closure runs without any live borrow: it may get() other
        // reactives, or construct further computeds.
        let read = Rc::clone(&self.inner.borrow().read);
        let value = read();
        let (changed, callbacks): (bool, Vec<Rc<dyn Fn(&T)>>) = {
            let mut inner = self.inner.borrow_mut();
            let changed = inner.value.as_ref() != Some(&value);
            inner.value = Some(value.clone());
            (
                changed,
                inner.subscribers.iter().map(|s| Rc::clone(&s.callback)).collect(),
            )
        };
        if changed {
            for cb in callbacks {
                cb(&value);
            }
        }
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> std::fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("value", &self.inner.borrow().value)
            .field("deferred", &self.inner.borrow().deferred)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DeferScope;
    use std::cell::Cell;

    #[test]
    fn eager_outside_scope() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let computed = Computed::new(move || {
            c.set(c.get() + 1);
            "v"
        });
        assert_eq!(count.get(), 1, "evaluated at construction");
        assert_eq!(computed.get(), "v");
        assert_eq!(count.get(), 1, "get() served from cache");
    }

    #[test]
    fn queued_inside_scope_evaluates_once_at_flush() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let computed;
        {
            let _scope = DeferScope::enter();
            computed = Computed::new(move || {
                c.set(c.get() + 1);
                42
            });
            assert_eq!(count.get(), 0, "not evaluated during construction");
        }
        assert_eq!(count.get(), 1);
        assert_eq!(computed.get(), 42);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn read_before_flush_is_not_reevaluated() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        {
            let _scope = DeferScope::enter();
            let computed = Computed::new(move || {
                c.set(c.get() + 1);
                1
            });
            assert_eq!(computed.get(), 1);
            assert_eq!(count.get(), 1);
        }
        assert_eq!(count.get(), 1, "flush must not re-evaluate");
    }

    #[test]
    fn deferred_never_auto_evaluates() {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        let computed;
        {
            let _scope = DeferScope::enter();
            computed = Computed::deferred(move || {
                c.set(c.get() + 1);
                7
            });
        }
        assert_eq!(count.get(), 0);
        assert_eq!(computed.get(), 7);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn watch_reevaluates_and_notifies() {
        let dep = Observable::new(1);
        let d = dep.clone();
        let computed = Computed::new(move || d.get() * 10);
        computed.watch(&dep);

        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = computed.subscribe(move |v| s.set(*v));

        dep.set(2);
        assert_eq!(computed.get(), 20);
        assert_eq!(seen.get(), 20);
    }

    #[test]
    fn writable_computed_routes_through_write() {
        let backing = Observable::new(String::new());
        let b = backing.clone();
        let b2 = backing.clone();
        let computed = Computed::new(move || b.get()).with_write(move |v| b2.set(v));
        computed.watch(&backing);

        computed.set("hello".to_string());
        assert_eq!(computed.get(), "hello");
        assert!(computed.is_writable());
    }

    #[test]
    #[should_panic(expected = "not writable")]
    fn set_without_write_panics() {
        let computed = Computed::new(|| 1);
        computed.set(2);
    }
}
