//! Shared, version-tracked value cell with change notification.
//!
//! `Observable<T>` is the scalar reactive container: `get()` clones the
//! current value, `set()` replaces it and notifies subscribers unless the
//! new value compares equal to the old one. Clones of an `Observable` are
//! handles to the same underlying cell.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// RAII guard for a reactive subscription.
///
/// Dropping the guard removes the callback from its source. The guard is
/// source-agnostic: [`Observable`], [`ObservableVec`](crate::ObservableVec)
/// and [`Computed`](crate::Computed) all hand out the same type.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Keep the subscription alive for the lifetime of the source instead
    /// of the lifetime of the guard.
    pub fn forever(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct Subscriber<T> {
    id: u64,
    callback: Rc<dyn Fn(&T)>,
}

struct ObsInner<T> {
    value: T,
    version: u64,
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
}

/// A shared, observable value cell.
pub struct Observable<T> {
    inner: Rc<RefCell<ObsInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Observable<T> {
    /// Create a new observable holding `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObsInner {
                value,
                version: 0,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone out the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Read the current value by reference.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value, notifying subscribers if it changed.
    ///
    /// Setting a value equal to the current one is a no-op: no version
    /// bump, no notifications.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value;
            inner.version += 1;
        }
        self.notify();
    }

    /// Monotonic change counter; bumps once per effective `set`.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Subscribe to value changes. The callback receives the new value.
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
        let weak: Weak<RefCell<ObsInner<T>>> = Rc::downgrade(&self.inner);
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

    fn notify(&self) {
        // Snapshot callbacks so the borrow is released before user code
        // runs; a callback may set() this same observable re-entrantly.
        let (value, callbacks): (T, Vec<Rc<dyn Fn(&T)>>) = {
            let inner = self.inner.borrow();
            (
                inner.value.clone(),
                inner.subscribers.iter().map(|s| Rc::clone(&s.callback)).collect(),
            )
        };
        for cb in callbacks {
            cb(&value);
        }
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("value", &self.inner.borrow().value)
            .field("version", &self.inner.borrow().version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn get_set_round_trip() {
        let obs = Observable::new(1);
        assert_eq!(obs.get(), 1);
        obs.set(2);
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn clone_shares_cell() {
        let a = Observable::new(0);
        let b = a.clone();
        b.set(9);
        assert_eq!(a.get(), 9);
        assert!(a.ptr_eq(&b));
    }

    #[test]
    fn equal_set_is_noop() {
        let obs = Observable::new(5);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let _sub = obs.subscribe(move |_| f.set(f.get() + 1));

        obs.set(5);
        assert_eq!(obs.version(), 0);
        assert_eq!(fired.get(), 0);

        obs.set(6);
        assert_eq!(obs.version(), 1);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn subscribers_notified_in_order() {
        let obs = Observable::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        let _s1 = obs.subscribe(move |_| l1.borrow_mut().push("first"));
        let _s2 = obs.subscribe(move |_| l2.borrow_mut().push("second"));

        obs.set(1);
        assert_eq!(*log.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn dropped_subscription_stops_firing() {
        let obs = Observable::new(0);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        let sub = obs.subscribe(move |_| f.set(f.get() + 1));

        obs.set(1);
        assert_eq!(fired.get(), 1);

        drop(sub);
        obs.set(2);
        assert_eq!(fired.get(), 1);
    }

    #[test]
    fn reentrant_set_inside_callback() {
        let obs = Observable::new(0);
        let other = obs.clone();
        let _sub = obs.subscribe(move |v| {
            if *v == 1 {
                other.set(2);
            }
        });
        obs.set(1);
        assert_eq!(obs.get(), 2);
    }

    #[test]
    fn forever_keeps_subscription_alive() {
        let obs = Observable::new(0);
        let fired = Rc::new(Cell::new(0));
        let f = Rc::clone(&fired);
        obs.subscribe(move |_| f.set(f.get() + 1)).forever();

        obs.set(1);
        assert_eq!(fired.get(), 1);
    }
}
