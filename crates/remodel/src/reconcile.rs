//! Array reconciliation.
//!
//! With a key function, elements are matched by derived key: retained
//! elements keep their mapped instance (refreshed in place), added and
//! deleted elements are reported once each, and the result follows new
//! source order. Without a key function, contents are rebuilt positionally
//! and events are derived from a multiset value-diff of the old and new
//! element values, so `[1, 2] -> [1]` reports exactly one deletion.
//!
//! The caller applies `out.items` as one atomic sequence replacement and
//! fires the events afterwards.

use tracing::trace;

use crate::error::MapError;
use crate::node::Node;
use crate::options::KeyFn;

/// Engine callbacks driving per-element mapping during reconciliation.
pub(crate) trait ElementMapper {
    /// Materialize the new source element at `index`. `None` means the
    /// element was skipped and produces no entry.
    fn map_new(&mut self, index: usize, data: &Node) -> Result<Option<Node>, MapError>;

    /// Refresh a retained mapped element from its new source value,
    /// returning the (same) mapped instance.
    fn update_retained(&mut self, index: usize, old: &Node, data: &Node)
    -> Result<Node, MapError>;

    /// Plain form of a previously mapped element, for value diffing.
    fn plain_of(&mut self, mapped: &Node) -> Node;
}

#[derive(Debug)]
pub(crate) struct Reconciled {
    /// Final contents, in new source order.
    pub items: Vec<Node>,
    /// Mapped elements that joined the sequence.
    pub added: Vec<Node>,
    /// Mapped elements that left the sequence.
    pub deleted: Vec<Node>,
}

pub(crate) fn key_display(key: &Node) -> String {
    match key {
        Node::Str(s) => s.clone(),
        other => other.to_value().to_string(),
    }
}

/// Keyed reconciliation. Duplicate keys on either side are an error; the
/// sequence is left untouched in that case because the caller has not yet
/// applied `items`.
pub(crate) fn keyed(
    old: &[Node],
    new: &[Node],
    key: &KeyFn,
    mapper: &mut dyn ElementMapper,
) -> Result<Reconciled, MapError> {
    let mut new_keys = Vec::with_capacity(new.len());
    for data in new {
        let k = key(data)?;
        if new_keys.contains(&k) {
            return Err(MapError::DuplicateKey(key_display(&k)));
        }
        new_keys.push(k);
    }
    let mut old_keys = Vec::with_capacity(old.len());
    for mapped in old {
        let k = key(mapped)?;
        if old_keys.contains(&k) {
            return Err(MapError::DuplicateKey(key_display(&k)));
        }
        old_keys.push(k);
    }

    let mut items = Vec::with_capacity(new.len());
    let mut added = Vec::new();
    for (index, (data, k)) in new.iter().zip(&new_keys).enumerate() {
        match old_keys.iter().position(|ok| ok == k) {
            Some(pos) => {
                let updated = mapper.update_retained(index, &old[pos], data)?;
                items.push(updated);
            }
            None => {
                if let Some(mapped) = mapper.map_new(index, data)? {
                    added.push(mapped.clone());
                    items.push(mapped);
                }
            }
        }
    }

    let deleted: Vec<Node> = old
        .iter()
        .zip(&old_keys)
        .filter(|(_, ok)| !new_keys.contains(ok))
        .map(|(mapped, _)| mapped.clone())
        .collect();

    trace!(
        retained = items.len() - added.len(),
        added = added.len(),
        deleted = deleted.len(),
        "keyed reconcile"
    );
    Ok(Reconciled {
        items,
        added,
        deleted,
    })
}

/// Positional reconciliation: contents are rebuilt wholesale from the new
/// source, events come from a multiset value-diff.
pub(crate) fn positional(
    old: &[Node],
    new: &[Node],
    mapper: &mut dyn ElementMapper,
) -> Result<Reconciled, MapError> {
    let old_plain: Vec<Node> = old.iter().map(|m| mapper.plain_of(m)).collect();

    let mut items = Vec::with_capacity(new.len());
    let mut added = Vec::new();
    // Old values not yet matched by an equal new value; leftovers are the
    // deletions.
    let mut unmatched: Vec<(usize, &Node)> = old_plain.iter().enumerate().collect();

    for (index, data) in new.iter().enumerate() {
        let plain = data.get();
        match unmatched.iter().position(|(_, value)| **value == plain) {
            Some(pos) => {
                unmatched.remove(pos);
                if let Some(mapped) = mapper.map_new(index, data)? {
                    items.push(mapped);
                }
            }
            None => {
                if let Some(mapped) = mapper.map_new(index, data)? {
                    added.push(mapped.clone());
                    items.push(mapped);
                }
            }
        }
    }

    let deleted: Vec<Node> = unmatched
        .into_iter()
        .map(|(index, _)| old[index].clone())
        .collect();

    trace!(
        total = items.len(),
        added = added.len(),
        deleted = deleted.len(),
        "positional reconcile"
    );
    Ok(Reconciled {
        items,
        added,
        deleted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    struct PassThrough;

    impl ElementMapper for PassThrough {
        fn map_new(&mut self, _index: usize, data: &Node) -> Result<Option<Node>, MapError> {
            Ok(Some(data.clone()))
        }

        fn update_retained(
            &mut self,
            _index: usize,
            old: &Node,
            _data: &Node,
        ) -> Result<Node, MapError> {
            Ok(old.clone())
        }

        fn plain_of(&mut self, mapped: &Node) -> Node {
            mapped.clone()
        }
    }

    fn ints(values: &[i64]) -> Vec<Node> {
        values.iter().map(|v| Node::Int(*v)).collect()
    }

    #[test]
    fn positional_shrink_reports_one_deletion() {
        let out = positional(&ints(&[1, 2]), &ints(&[1]), &mut PassThrough).unwrap();
        assert_eq!(out.items, ints(&[1]));
        assert!(out.added.is_empty());
        assert_eq!(out.deleted, ints(&[2]));
    }

    #[test]
    fn positional_from_empty_reports_each_addition() {
        let out = positional(&[], &ints(&[1, 2]), &mut PassThrough).unwrap();
        assert_eq!(out.added, ints(&[1, 2]));
        assert!(out.deleted.is_empty());
    }

    #[test]
    fn positional_allows_duplicate_values() {
        let out = positional(&ints(&[1]), &ints(&[1, 1]), &mut PassThrough).unwrap();
        assert_eq!(out.items, ints(&[1, 1]));
        assert_eq!(out.added, ints(&[1]));
    }

    fn id_key() -> KeyFn {
        Rc::new(|node: &Node| {
            node.path("id")
                .map(|k| k.get())
                .ok_or_else(|| MapError::msg("element has no id"))
        })
    }

    fn item(id: i64, label: &str) -> Node {
        Node::object([("id", Node::Int(id)), ("label", Node::str(label))])
    }

    #[test]
    fn keyed_retains_matches_and_orders_by_new_source() {
        let a = item(1, "a");
        let b = item(2, "b");
        let out = keyed(
            &[a.clone(), b.clone()],
            &[item(2, "b2"), item(3, "c")],
            &id_key(),
            &mut PassThrough,
        )
        .unwrap();
        // Retained element keeps its mapped instance, in new order.
        assert!(
            out.items[0]
                .as_object()
                .unwrap()
                .ptr_eq(b.as_object().unwrap())
        );
        assert_eq!(out.added.len(), 1);
        assert_eq!(out.deleted.len(), 1);
        assert!(
            out.deleted[0]
                .as_object()
                .unwrap()
                .ptr_eq(a.as_object().unwrap())
        );
    }

    #[test]
    fn keyed_zero_is_a_valid_key() {
        let zero = item(0, "zero");
        let out = keyed(
            &[zero.clone()],
            &[item(0, "still zero")],
            &id_key(),
            &mut PassThrough,
        )
        .unwrap();
        assert_eq!(out.items.len(), 1);
        assert!(out.added.is_empty() && out.deleted.is_empty());
    }

    #[test]
    fn keyed_duplicate_new_keys_raise() {
        let err = keyed(&[], &[item(1, "a"), item(1, "b")], &id_key(), &mut PassThrough)
            .unwrap_err();
        assert!(matches!(err, MapError::DuplicateKey(k) if k == "1"));
    }
}
