//! Keyed operations on mapped sequences.
//!
//! Every sequence the engine produces carries the hooks that were resolved
//! for its position. When those include a key function, elements can be
//! addressed by key: looked up, created (with duplicate detection), removed
//! or marked destroyed. Predicate variants receive the derived key, not the
//! element.

use crate::engine;
use crate::error::MapError;
use crate::node::{Node, SeqRef};
use crate::options::{ArrayEvent, KeyFn};
use crate::reconcile::key_display;

impl SeqRef {
    fn key_fn(&self) -> Result<KeyFn, MapError> {
        self.meta()
            .hooks
            .key
            .ok_or_else(|| MapError::InvalidOptions("sequence has no key function".into()))
    }

    /// Index of the element whose key matches `data`'s key.
    pub fn mapped_index_of(&self, data: &Node) -> Result<Option<usize>, MapError> {
        let key = self.key_fn()?;
        let wanted = key(data)?;
        let items = self.get();
        for (index, item) in items.iter().enumerate() {
            if key(item)? == wanted {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Materialize `data` through the stored hooks and append it. An
    /// element with the same key already present is an error and leaves
    /// the sequence unchanged.
    pub fn mapped_create(&self, data: &Node) -> Result<Node, MapError> {
        let key = self.key_fn()?;
        let wanted = key(data)?;
        if self.mapped_index_of(data)?.is_some() {
            return Err(MapError::DuplicateKey(key_display(&wanted)));
        }
        let hooks = self.meta().hooks;
        let index = self.len();
        let mapped = engine::map_element(data, &hooks, &Node::Seq(self.clone()), index)?
            .ok_or_else(|| {
                MapError::InvalidOptions("create factory skipped the element".into())
            })?;
        self.items().push(mapped.clone());
        if let Some(callback) = &hooks.array_changed {
            callback(ArrayEvent::Added, &mapped);
        }
        Ok(mapped)
    }

    /// Remove the element matching `data`'s key, returning it.
    pub fn mapped_remove(&self, data: &Node) -> Result<Vec<Node>, MapError> {
        let key = self.key_fn()?;
        let wanted = key(data)?;
        self.mapped_remove_where(move |k| *k == wanted)
    }

    /// Remove every element whose derived key satisfies `pred`, with one
    /// aggregate notification. Returns the removed elements in order.
    pub fn mapped_remove_where(
        &self,
        pred: impl Fn(&Node) -> bool,
    ) -> Result<Vec<Node>, MapError> {
        let key = self.key_fn()?;
        let items = self.get();
        let mut doomed = Vec::new();
        for (index, item) in items.iter().enumerate() {
            if pred(&key(item)?) {
                doomed.push(index);
            }
        }
        if doomed.is_empty() {
            return Ok(Vec::new());
        }
        let mut removed: Vec<Node> = self.items().batch(|v| {
            doomed.iter().rev().map(|&index| v.remove(index)).collect()
        });
        removed.reverse();
        Ok(removed)
    }

    /// Remove every element whose key matches the key of some item in
    /// `data`.
    pub fn mapped_remove_all(&self, data: &[Node]) -> Result<Vec<Node>, MapError> {
        let key = self.key_fn()?;
        let mut wanted = Vec::with_capacity(data.len());
        for item in data {
            wanted.push(key(item)?);
        }
        self.mapped_remove_where(move |k| wanted.contains(k))
    }

    /// Mark the element matching `data`'s key destroyed instead of
    /// removing it.
    pub fn mapped_destroy(&self, data: &Node) -> Result<Vec<Node>, MapError> {
        let key = self.key_fn()?;
        let wanted = key(data)?;
        self.mapped_destroy_where(move |k| *k == wanted)
    }

    /// Set `_destroy: true` on every object element whose derived key
    /// satisfies `pred`. Returns the marked elements.
    pub fn mapped_destroy_where(
        &self,
        pred: impl Fn(&Node) -> bool,
    ) -> Result<Vec<Node>, MapError> {
        let key = self.key_fn()?;
        let items = self.get();
        let mut marked = Vec::new();
        for item in &items {
            if pred(&key(item)?)
                && let Node::Object(object) = item
            {
                object.set("_destroy", Node::Bool(true));
                marked.push(item.clone());
            }
        }
        if !marked.is_empty() {
            // In-place element edits are invisible to the sequence's own
            // deep comparison.
            self.items().touch();
        }
        Ok(marked)
    }

    pub fn mapped_destroy_all(&self, data: &[Node]) -> Result<Vec<Node>, MapError> {
        let key = self.key_fn()?;
        let mut wanted = Vec::with_capacity(data.len());
        for item in data {
            wanted.push(key(item)?);
        }
        self.mapped_destroy_where(move |k| wanted.contains(k))
    }
}
