//! Depth-first traversal of node trees, plain or mapped.

use ahash::AHashSet;

use crate::node::Node;

/// Walk `node` depth-first, invoking `f` with each node and its full
/// dotted/indexed path. The root call receives `None`. Reactive containers
/// are visited once as themselves; their contents are then descended into
/// under the same path. Shared nodes and cycles are visited once.
pub fn visit_tree(node: &Node, f: &mut impl FnMut(&Node, Option<&str>)) {
    let mut seen = AHashSet::new();
    visit(node, None, &mut seen, f);
}

fn visit(
    node: &Node,
    path: Option<&str>,
    seen: &mut AHashSet<usize>,
    f: &mut impl FnMut(&Node, Option<&str>),
) {
    if let Some(id) = node.ptr_id()
        && !seen.insert(id)
    {
        return;
    }
    f(node, path);
    match node {
        Node::Obs(obs) => descend(&obs.get(), path, seen, f),
        Node::Computed(computed) => descend(&computed.get(), path, seen, f),
        _ => descend(node, path, seen, f),
    }
}

/// Visit the children of a container under `base`, without re-visiting the
/// container itself.
fn descend(
    node: &Node,
    base: Option<&str>,
    seen: &mut AHashSet<usize>,
    f: &mut impl FnMut(&Node, Option<&str>),
) {
    match node {
        Node::Object(object) => {
            for key in object.keys() {
                let child = object.get(&key).unwrap_or(Node::Null);
                let child_path = match base {
                    Some(base) => format!("{base}.{key}"),
                    None => key,
                };
                visit(&child, Some(&child_path), seen, f);
            }
        }
        Node::Array(array) => {
            for (index, child) in array.get().iter().enumerate() {
                let child_path = format!("{}[{index}]", base.unwrap_or(""));
                visit(child, Some(&child_path), seen, f);
            }
        }
        Node::Seq(seq) => {
            for (index, child) in seq.get().iter().enumerate() {
                let child_path = format!("{}[{index}]", base.unwrap_or(""));
                visit(child, Some(&child_path), seen, f);
            }
        }
        _ => {}
    }
}
