//! Shared, observable ordered sequence.
//!
//! `ObservableVec<T>` is the sequence counterpart of
//! [`Observable`](crate::Observable): subscribers see the whole sequence
//! after each mutation, and [`batch`](ObservableVec::batch) folds any number
//! of element-level edits into a single aggregate notification. Reconciling
//! a sequence against new source data is therefore one notification, never
//! one per element.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::observable::Subscription;

struct Subscriber<T> {
    id: u64,
    callback: Rc<dyn Fn(&[T])>,
}

struct VecInner<T> {
    items: Vec<T>,
    version: u64,
    next_id: u64,
    subscribers: Vec<Subscriber<T>>,
}

/// A shared, observable ordered sequence.
pub struct ObservableVec<T> {
    inner: Rc<RefCell<VecInner<T>>>,
}

impl<T> Clone for ObservableVec<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ObservableVec<T> {
    /// Create a new sequence holding `items`.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(VecInner {
                items,
                version: 0,
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Clone out the current contents.
    #[must_use]
    pub fn get(&self) -> Vec<T> {
        self.inner.borrow().items.clone()
    }

    /// Read the current contents by reference.
    pub fn with<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.inner.borrow().items)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    /// Replace the whole sequence atomically. One notification, and none at
    /// all if the new contents compare equal to the old.
    pub fn set(&self, items: Vec<T>) {
        self.batch(|current| *current = items);
    }

    /// Append one element.
    pub fn push(&self, item: T) {
        self.batch(|items| items.push(item));
    }

    /// Insert at `index`, shifting later elements.
    pub fn insert(&self, index: usize, item: T) {
        self.batch(|items| items.insert(index, item));
    }

    /// Remove and return the element at `index`.
    pub fn remove(&self, index: usize) -> T {
        self.batch(|items| items.remove(index))
    }

    /// Apply any number of edits with a single aggregate notification.
    ///
    /// The notification is suppressed entirely when the batch leaves the
    /// sequence deep-equal to what it was.
    pub fn batch<R>(&self, f: impl FnOnce(&mut Vec<T>) -> R) -> R {
        let (result, changed) = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.items.clone();
            let result = f(&mut inner.items);
            let changed = inner.items != before;
            if changed {
                inner.version += 1;
            }
            (result, changed)
        };
        if changed {
            self.notify();
        }
        result
    }

    /// Force a notification with the current contents.
    ///
    /// For elements with interior mutability, an in-place edit leaves the
    /// sequence deep-equal to itself and [`batch`](ObservableVec::batch)
    /// stays silent; callers that mutated elements directly use this to
    /// surface the change.
    pub fn touch(&self) {
        self.inner.borrow_mut().version += 1;
        self.notify();
    }

    /// Monotonic change counter; bumps once per effective mutation batch.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Subscribe to sequence changes. The callback receives the new
    /// contents after each effective mutation batch.
    pub fn subscribe(&self, callback: impl Fn(&[T]) + 'static) -> Subscription {
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
        let weak: Weak<RefCell<VecInner<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().subscribers.retain(|s| s.id != id);
            }
        })
    }

    /// Pointer identity of the underlying sequence.
    #[must_use]
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    /// Whether two handles share the same underlying sequence.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let (items, callbacks): (Vec<T>, Vec<Rc<dyn Fn(&[T])>>) = {
            let inner = self.inner.borrow();
            (
                inner.items.clone(),
                inner.subscribers.iter().map(|s| Rc::clone(&s.callback)).collect(),
            )
        };
        for cb in callbacks {
            cb(&items);
        }
    }
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> std::fmt::Debug for ObservableVec<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableVec")
            .field("items", &self.inner.borrow().items)
            .finish()
    }
}
