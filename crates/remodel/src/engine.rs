//! The mapping engine: materialize plain trees into reactive graphs and
//! dematerialize them back.
//!
//! One materialize call resolves its options once (defaults, options stored
//! on the target from earlier calls, literal-key shadowing against the call
//! root), opens a defer scope so computed views built by factories evaluate
//! after the graph is complete, and walks the source with a call-scoped
//! identity map so shared references and cycles come out shared.
//!
//! Invariants upheld here:
//!
//! - An existing reactive slot is written in place; an existing
//!   non-reactive slot is plainly assigned, never wrapped; an absent slot
//!   gets default wrapping.
//! - A sequence instance, once produced, is never replaced by a later call
//!   onto the same target; its contents are reconciled.
//! - Each reconciled sequence signals at most one mutation notification per
//!   call.
//! - `create` runs only when no mapped counterpart exists; `update` runs on
//!   every pass and its return value becomes the mapped value.
//! - Target properties never named by the source are left alone.

use std::collections::BTreeSet;
use std::rc::Rc;

use remodel_reactive::{DeferScope, Observable};
use tracing::debug;

use crate::error::MapError;
use crate::identity::IdentityMap;
use crate::node::{ArrayRef, Node, ObjectRef, RootMeta, SeqRef};
use crate::options::{ArrayEvent, Created, FactoryInput, Hooks, Mapping, Resolved, UpdateFn};
use crate::paths::{self, Segment};
use crate::reconcile::{self, ElementMapper};

/// Map a plain source tree into a fresh reactive graph.
pub fn materialize(data: &Node, mapping: &Mapping) -> Result<Node, MapError> {
    run(data, mapping, None)
}

/// Map a source tree onto an existing mapped graph, updating it in place.
/// Options from earlier calls stored on the target are merged with
/// `mapping` (recognized fields overlay, unrecognized entries last-wins).
pub fn materialize_into(data: &Node, mapping: &Mapping, target: &Node) -> Result<Node, MapError> {
    run(data, mapping, Some(target))
}

fn run(data: &Node, mapping: &Mapping, target: Option<&Node>) -> Result<Node, MapError> {
    let literals = root_literal_keys(data);
    let previous = target.and_then(stored_options);
    let resolved = Resolved::new(mapping, previous.as_ref(), &literals)?;

    // Factories may build computed views over parts of the graph that do
    // not exist yet; they evaluate when the outermost scope closes.
    let _scope = DeferScope::enter();

    let mut ctx = Ctx {
        resolved: &resolved,
        identity: IdentityMap::new(),
        mapped_properties: BTreeSet::new(),
    };
    let result = ctx
        .map_node(data, target, &mut Vec::new(), None, &resolved.root, false)?
        .unwrap_or(Node::Null);

    // Paths accumulate across calls onto the same root; a later call that
    // maps fewer properties must not hide earlier ones from dematerialize.
    let mut mapped_properties = ctx.mapped_properties;
    if let Some(earlier) = stored_meta(&result) {
        mapped_properties.extend(earlier.mapped_properties);
    }
    let meta = RootMeta {
        mapped_properties,
        options: resolved.mapping.clone(),
    };
    debug!(properties = meta.mapped_properties.len(), "materialized");
    match &result {
        Node::Object(object) => object.set_meta(meta),
        Node::Seq(seq) => seq.set_root_meta(meta),
        _ => {}
    }
    Ok(result)
}

/// Metadata recorded on a previously mapped root, if any.
fn stored_meta(target: &Node) -> Option<RootMeta> {
    match target {
        Node::Object(object) => object.meta(),
        Node::Seq(seq) => seq.root_meta(),
        _ => None,
    }
}

/// Options recorded on a previously mapped root, if any.
fn stored_options(target: &Node) -> Option<Mapping> {
    stored_meta(target).map(|meta| meta.options)
}

/// Own literal keys of the call root, for the literal-key shadowing rule.
fn root_literal_keys(data: &Node) -> BTreeSet<String> {
    match &data.get() {
        Node::Object(object) => object.keys().into_iter().collect(),
        _ => BTreeSet::new(),
    }
}

struct Ctx<'a> {
    resolved: &'a Resolved,
    identity: IdentityMap,
    /// Full paths produced so far, root-relative, recorded into root
    /// metadata at the end of the call.
    mapped_properties: BTreeSet<String>,
}

impl Ctx<'_> {
    /// Map one source node. `Ok(None)` means a `create` factory skipped it.
    fn map_node(
        &mut self,
        data: &Node,
        target: Option<&Node>,
        path: &mut Vec<Segment>,
        parent: Option<&Node>,
        hooks: &Hooks,
        in_array: bool,
    ) -> Result<Option<Node>, MapError> {
        // Source-side reactive containers are read through.
        let mut data = data.clone();
        while matches!(data, Node::Obs(_) | Node::Computed(_)) {
            data = data.get();
        }

        if let Some(found) = self.identity.lookup(&data) {
            return Ok(Some(found));
        }

        // Hooks on an array-typed node run per element, inside the
        // reconciler, never on the sequence itself.
        let per_element = matches!(data, Node::Array(_) | Node::Seq(_));

        // A create factory replaces default mapping entirely, but only when
        // nothing mapped exists yet.
        if target.is_none()
            && !per_element
            && let Some(create) = hooks.create.clone()
        {
            let observable = data.is_atomic().then(|| Observable::new(data.clone()));
            let input = FactoryInput {
                data: data.clone(),
                parent: parent.cloned(),
                target: None,
                observable,
            };
            let mut base = match create(&input)? {
                Created::Skip => return Ok(None),
                Created::Node(node) => node,
            };
            if let Some(update) = hooks.update.clone() {
                base = self.apply_update(&update, &data, parent, None, base)?;
            }
            self.identity.register(&data, &base);
            return Ok(Some(base));
        }

        let mut base = match &data {
            Node::Null | Node::Bool(_) | Node::Int(_) | Node::Num(_) | Node::Str(_) => {
                self.map_atomic(&data, target, path, in_array)
            }
            Node::Array(items) => self.map_sequence(&data, &items.get(), target, path, hooks)?,
            Node::Seq(seq) => self.map_sequence(&data, &seq.get(), target, path, hooks)?,
            Node::Object(source) => self.map_object(&data, &source.clone(), target, path)?,
            Node::Obs(_) | Node::Computed(_) => data.clone(),
        };

        if !per_element
            && let Some(update) = hooks.update.clone()
        {
            base = self.apply_update(&update, &data, parent, target, base)?;
        }
        Ok(Some(base))
    }

    /// Run the update factory and write its return value through: into the
    /// reactive slot when there is one, as the mapped value otherwise.
    fn apply_update(
        &mut self,
        update: &UpdateFn,
        data: &Node,
        parent: Option<&Node>,
        target: Option<&Node>,
        base: Node,
    ) -> Result<Node, MapError> {
        let observable = match (&base, target) {
            (Node::Obs(obs), _) => Some(obs.clone()),
            (_, Some(Node::Obs(obs))) => Some(obs.clone()),
            _ => None,
        };
        let input = FactoryInput {
            data: data.clone(),
            parent: parent.cloned(),
            target: target.cloned(),
            observable,
        };
        let value = update(&input)?;
        Ok(match base {
            Node::Obs(obs) => {
                obs.set(value);
                Node::Obs(obs)
            }
            _ => value,
        })
    }

    fn map_atomic(
        &mut self,
        data: &Node,
        target: Option<&Node>,
        path: &[Segment],
        in_array: bool,
    ) -> Node {
        let selective = !self.resolved.observe.is_empty();
        if selective && !self.resolved.observe.matches(path) {
            return data.clone();
        }
        match target {
            Some(Node::Obs(obs)) => {
                obs.set(data.clone());
                Node::Obs(obs.clone())
            }
            // An existing plain slot is assigned, never wrapped.
            Some(_) => data.clone(),
            // Atomic array elements stay plain; the sequence itself is the
            // reactive container.
            None if in_array => data.clone(),
            None => Node::Obs(Observable::new(data.clone())),
        }
    }

    fn map_sequence(
        &mut self,
        source: &Node,
        elements: &[Node],
        target: Option<&Node>,
        path: &mut Vec<Segment>,
        hooks: &Hooks,
    ) -> Result<Node, MapError> {
        let selective = !self.resolved.observe.is_empty();
        if selective && !self.resolved.observe.matches(path) {
            // Plainly assigned, but recursion continues per element.
            let array = ArrayRef::new(Vec::new());
            let node = Node::Array(array.clone());
            self.identity.register(source, &node);
            for (index, element) in elements.iter().enumerate() {
                path.push(Segment::Index(index));
                let mapped =
                    self.map_node(element, None, path, Some(&node), &Hooks::default(), true)?;
                path.pop();
                if let Some(mapped) = mapped {
                    array.push(mapped);
                }
            }
            return Ok(node);
        }

        let seq = match target {
            Some(Node::Seq(seq)) => seq.clone(),
            _ => SeqRef::new(Vec::new()),
        };
        let node = Node::Seq(seq.clone());
        self.identity.register(source, &node);
        // A pass with no hooks configured keeps whatever an earlier call
        // stored, so keyed sequence operations keep working.
        if !hooks.is_empty() {
            seq.set_hooks(hooks.clone());
        }

        let old = seq.get();
        let out = {
            let mut mapper = SeqElements {
                ctx: self,
                path,
                parent: node.clone(),
                hooks: hooks.clone(),
            };
            match &hooks.key {
                Some(key) => reconcile::keyed(&old, elements, key, &mut mapper)?,
                None => reconcile::positional(&old, elements, &mut mapper)?,
            }
        };

        // One atomic replacement, hence at most one notification per call.
        seq.items().set(out.items);
        if let Some(callback) = &hooks.array_changed {
            for item in &out.added {
                callback(ArrayEvent::Added, item);
            }
            for item in &out.deleted {
                callback(ArrayEvent::Deleted, item);
            }
        }
        Ok(node)
    }

    fn map_object(
        &mut self,
        source_node: &Node,
        source: &ObjectRef,
        target: Option<&Node>,
        path: &mut Vec<Segment>,
    ) -> Result<Node, MapError> {
        // An existing reactive slot holding an object is rebuilt and
        // written in place.
        if let Some(Node::Obs(obs)) = target {
            let fresh = self.map_object(source_node, source, None, path)?;
            obs.set(fresh);
            return Ok(Node::Obs(obs.clone()));
        }

        let object = match target {
            Some(Node::Object(existing)) => existing.clone(),
            _ => ObjectRef::new(),
        };
        let node = Node::Object(object.clone());
        // Registered before recursing, so cycles and shared references in
        // the source resolve to this instance.
        self.identity.register(source_node, &node);

        for key in source.keys() {
            let child = source.get(&key).unwrap_or(Node::Null);
            path.push(Segment::Key(key.clone()));
            if self.resolved.ignore.matches(path) {
                path.pop();
                continue;
            }
            self.mapped_properties.insert(paths::render(path));
            if self.resolved.copy.matches(path) {
                // Verbatim, same reference.
                object.set(key, child);
                path.pop();
                continue;
            }
            let child_hooks = self.resolved.hooks_for(path);
            let existing = object.get(&key);
            let mapped =
                self.map_node(&child, existing.as_ref(), path, Some(&node), &child_hooks, false)?;
            object.set(key, mapped.unwrap_or(Node::Null));
            path.pop();
        }
        Ok(node)
    }
}

struct SeqElements<'a, 'b> {
    ctx: &'a mut Ctx<'b>,
    path: &'a mut Vec<Segment>,
    parent: Node,
    hooks: Hooks,
}

impl ElementMapper for SeqElements<'_, '_> {
    fn map_new(&mut self, index: usize, data: &Node) -> Result<Option<Node>, MapError> {
        self.path.push(Segment::Index(index));
        let result = self
            .ctx
            .map_node(data, None, self.path, Some(&self.parent), &self.hooks, true);
        self.path.pop();
        result
    }

    fn update_retained(
        &mut self,
        index: usize,
        old: &Node,
        data: &Node,
    ) -> Result<Node, MapError> {
        self.path.push(Segment::Index(index));
        let result = self.ctx.map_node(
            data,
            Some(old),
            self.path,
            Some(&self.parent),
            &self.hooks,
            true,
        );
        self.path.pop();
        // With a mapped counterpart present no create factory runs, so the
        // element cannot be skipped.
        Ok(result?.unwrap_or_else(|| old.clone()))
    }

    fn plain_of(&mut self, mapped: &Node) -> Node {
        Node::from(mapped.to_value())
    }
}

/// Materialize a single element with a sequence's stored hooks, outside a
/// full call. Used by the keyed sequence operations.
pub(crate) fn map_element(
    data: &Node,
    hooks: &Hooks,
    parent: &Node,
    index: usize,
) -> Result<Option<Node>, MapError> {
    let resolved = Resolved::new(&Mapping::default(), None, &BTreeSet::new())?;
    let _scope = DeferScope::enter();
    let mut ctx = Ctx {
        resolved: &resolved,
        identity: IdentityMap::new(),
        mapped_properties: BTreeSet::new(),
    };
    let mut path = vec![Segment::Index(index)];
    ctx.map_node(data, None, &mut path, Some(parent), hooks, true)
}

// ── dematerialize ──

/// Unwrap a mapped graph back into a fresh plain tree. The graph is never
/// mutated. Roots carrying metadata restrict the walk to the properties the
/// engine produced plus the `include` names, minus `ignore`; plain objects
/// without metadata are walked in full, so this also works on unmapped
/// data.
pub fn dematerialize(node: &Node, mapping: &Mapping) -> Result<Node, MapError> {
    let literals = root_literal_keys(node);
    let previous = stored_options(node);
    let resolved = Resolved::new(mapping, previous.as_ref(), &literals)?;
    let walker = Demat {
        resolved: &resolved,
    };
    Ok(walker.walk(node, &mut Vec::new(), None))
}

/// Property-name filter inherited from the nearest enclosing meta root.
#[derive(Clone)]
struct Scope {
    mapped: Rc<BTreeSet<String>>,
    rel: Vec<Segment>,
}

struct Demat<'a> {
    resolved: &'a Resolved,
}

impl Demat<'_> {
    fn walk(&self, node: &Node, path: &mut Vec<Segment>, scope: Option<&Scope>) -> Node {
        match node {
            Node::Null | Node::Bool(_) | Node::Int(_) | Node::Num(_) | Node::Str(_) => {
                node.clone()
            }
            Node::Obs(obs) => self.walk(&obs.get(), path, scope),
            Node::Computed(computed) => self.walk(&computed.get(), path, scope),
            Node::Array(array) => {
                let items = array.with(|items| self.walk_elements(items, path));
                Node::Array(ArrayRef::new(items))
            }
            Node::Seq(seq) => {
                let items = seq.with(|items| self.walk_elements(items, path));
                Node::Array(ArrayRef::new(items))
            }
            Node::Object(object) => {
                let own_scope = object.meta().map(|meta| Scope {
                    mapped: Rc::new(meta.mapped_properties),
                    rel: Vec::new(),
                });
                let scope = own_scope.as_ref().or(scope);
                let out = ObjectRef::new();
                for key in object.keys() {
                    path.push(Segment::Key(key.clone()));
                    if self.resolved.ignore.matches(path) {
                        path.pop();
                        continue;
                    }
                    let included = match scope {
                        Some(scope) => {
                            let mut rel = scope.rel.clone();
                            rel.push(Segment::Key(key.clone()));
                            scope.mapped.contains(&paths::render(&rel))
                                || self.resolved.include.contains(&key)
                        }
                        None => true,
                    };
                    if included {
                        let child = object.get(&key).unwrap_or(Node::Null);
                        let child_scope = scope.map(|s| {
                            let mut rel = s.rel.clone();
                            rel.push(Segment::Key(key.clone()));
                            Scope {
                                mapped: Rc::clone(&s.mapped),
                                rel,
                            }
                        });
                        out.set(key, self.walk(&child, path, child_scope.as_ref()));
                    }
                    path.pop();
                }
                Node::Object(out)
            }
        }
    }

    /// Sequence elements are always walked in full; elements created after
    /// the original call (keyed insertions) carry no recorded paths, so the
    /// property filter does not extend through arrays.
    fn walk_elements(&self, items: &[Node], path: &mut Vec<Segment>) -> Vec<Node> {
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                path.push(Segment::Index(index));
                let out = self.walk(item, path, None);
                path.pop();
                out
            })
            .collect()
    }
}
