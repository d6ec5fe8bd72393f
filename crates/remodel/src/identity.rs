//! Call-scoped identity tracking.
//!
//! Maps source container identity (pointer) to its produced mapped node.
//! Entries are registered *before* recursing into children, so shared
//! references and cycles in the source resolve to the same mapped node
//! instead of diverging or recursing forever. Registered sources are kept
//! alive for the duration of the call so pointer values stay unambiguous.

use ahash::AHashMap;

use crate::node::Node;

#[derive(Default)]
pub(crate) struct IdentityMap {
    entries: AHashMap<usize, Node>,
    anchors: Vec<Node>,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `mapped` as the translation of `source`. Atomic sources have
    /// no identity and are not tracked.
    pub fn register(&mut self, source: &Node, mapped: &Node) {
        if let Some(id) = source.ptr_id() {
            self.entries.insert(id, mapped.clone());
            self.anchors.push(source.clone());
        }
    }

    /// The node previously produced for `source`, if any.
    pub fn lookup(&self, source: &Node) -> Option<Node> {
        source.ptr_id().and_then(|id| self.entries.get(&id).cloned())
    }
}
