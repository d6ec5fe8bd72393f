//! Mapping configuration: the `Mapping` builder, factory hooks, and the
//! process-wide defaults.
//!
//! Recognized root-level options (`key`, `create`, `update`,
//! `array_changed`) live in a distinguished root hook set; path lists and
//! per-path child hooks are addressed by dotted/indexed path. Unrecognized
//! plain entries are carried through merges last-wins and are observable in
//! the metadata stored on mapped roots.
//!
//! Process-wide defaults are thread-local and stored loosely as a [`Node`];
//! they are validated when the next mapping call reads them, so an invalid
//! shape surfaces as [`MapError::InvalidOptions`] on that call rather than
//! at assignment time.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use remodel_reactive::Observable;

use crate::error::MapError;
use crate::node::Node;
use crate::paths::{self, NameSet, PathSet, Segment};

/// What happened to one element of a reconciled array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayEvent {
    Added,
    Deleted,
}

/// Input handed to `create` and `update` factories.
pub struct FactoryInput {
    /// The source value being mapped.
    pub data: Node,
    /// The nearest enclosing mapped node: the sequence for array elements,
    /// the containing object for properties, `None` at the call root.
    pub parent: Option<Node>,
    /// The previously mapped counterpart, when one exists.
    pub target: Option<Node>,
    /// For atomic data, the reactive container involved: the existing one
    /// when the target slot is reactive, otherwise a fresh one wrapping
    /// `data`.
    pub observable: Option<Observable<Node>>,
}

/// Result of a `create` factory.
pub enum Created {
    /// Use this node as the mapped value.
    Node(Node),
    /// Produce no mapped value. Inside an array the element is omitted and
    /// every other element is retained; elsewhere the slot becomes null.
    Skip,
}

pub type KeyFn = Rc<dyn Fn(&Node) -> Result<Node, MapError>>;
pub type CreateFn = Rc<dyn Fn(&FactoryInput) -> Result<Created, MapError>>;
pub type UpdateFn = Rc<dyn Fn(&FactoryInput) -> Result<Node, MapError>>;
pub type ArrayChangedFn = Rc<dyn Fn(ArrayEvent, &Node)>;

/// The recognized callback set, configurable at the root or per path.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) key: Option<KeyFn>,
    pub(crate) create: Option<CreateFn>,
    pub(crate) update: Option<UpdateFn>,
    pub(crate) array_changed: Option<ArrayChangedFn>,
}

impl Hooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity function for keyed array reconciliation. Receives mapped
    /// elements on the old side and source elements on the new side.
    #[must_use]
    pub fn key(mut self, f: impl Fn(&Node) -> Result<Node, MapError> + 'static) -> Self {
        self.key = Some(Rc::new(f));
        self
    }

    /// Runs when no mapped counterpart exists yet.
    #[must_use]
    pub fn create(mut self, f: impl Fn(&FactoryInput) -> Result<Created, MapError> + 'static) -> Self {
        self.create = Some(Rc::new(f));
        self
    }

    /// Runs on every pass; its return value becomes the mapped value.
    #[must_use]
    pub fn update(mut self, f: impl Fn(&FactoryInput) -> Result<Node, MapError> + 'static) -> Self {
        self.update = Some(Rc::new(f));
        self
    }

    /// Notified once per element added to or deleted from a reconciled
    /// array.
    #[must_use]
    pub fn array_changed(mut self, f: impl Fn(ArrayEvent, &Node) + 'static) -> Self {
        self.array_changed = Some(Rc::new(f));
        self
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.key.is_none()
            && self.create.is_none()
            && self.update.is_none()
            && self.array_changed.is_none()
    }

    /// Overlay on top of `self`: fields set in `overlay` win.
    pub(crate) fn merged_with(&self, overlay: &Hooks) -> Hooks {
        Hooks {
            key: overlay.key.clone().or_else(|| self.key.clone()),
            create: overlay.create.clone().or_else(|| self.create.clone()),
            update: overlay.update.clone().or_else(|| self.update.clone()),
            array_changed: overlay
                .array_changed
                .clone()
                .or_else(|| self.array_changed.clone()),
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("key", &self.key.is_some())
            .field("create", &self.create.is_some())
            .field("update", &self.update.is_some())
            .field("array_changed", &self.array_changed.is_some())
            .finish()
    }
}

/// Configuration for one materialize/dematerialize call.
#[derive(Clone, Default)]
pub struct Mapping {
    pub(crate) ignore: Vec<String>,
    pub(crate) copy: Vec<String>,
    pub(crate) observe: Vec<String>,
    pub(crate) include: Vec<String>,
    pub(crate) root: Hooks,
    pub(crate) children: BTreeMap<String, Hooks>,
    pub(crate) extra: BTreeMap<String, Node>,
}

impl Mapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Full paths to leave entirely unmapped.
    #[must_use]
    pub fn ignore<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.ignore.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Full paths assigned verbatim, same reference, never wrapped.
    #[must_use]
    pub fn copy<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.copy.extend(paths.into_iter().map(Into::into));
        self
    }

    /// When non-empty, only these full paths become reactive; everything
    /// else is plainly assigned while recursion continues.
    #[must_use]
    pub fn observe<S: Into<String>>(mut self, paths: impl IntoIterator<Item = S>) -> Self {
        self.observe.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Property names always surfaced by dematerialize, matched at any
    /// depth.
    #[must_use]
    pub fn include<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.include.extend(names.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn key(mut self, f: impl Fn(&Node) -> Result<Node, MapError> + 'static) -> Self {
        self.root.key = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn create(mut self, f: impl Fn(&FactoryInput) -> Result<Created, MapError> + 'static) -> Self {
        self.root.create = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn update(mut self, f: impl Fn(&FactoryInput) -> Result<Node, MapError> + 'static) -> Self {
        self.root.update = Some(Rc::new(f));
        self
    }

    #[must_use]
    pub fn array_changed(mut self, f: impl Fn(ArrayEvent, &Node) + 'static) -> Self {
        self.root.array_changed = Some(Rc::new(f));
        self
    }

    /// Hooks for the node at `path`. A single-name path also matches that
    /// property name at any depth; hooks on an array apply to each of its
    /// elements.
    #[must_use]
    pub fn child(mut self, path: impl Into<String>, hooks: Hooks) -> Self {
        self.children.insert(path.into(), hooks);
        self
    }

    /// Record an unrecognized plain option entry.
    #[must_use]
    pub fn extra(mut self, name: impl Into<String>, value: Node) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Read back an unrecognized entry (after merges, last writer wins).
    #[must_use]
    pub fn extra_entry(&self, name: &str) -> Option<Node> {
        self.extra.get(name).cloned()
    }

    #[must_use]
    pub fn ignore_paths(&self) -> &[String] {
        &self.ignore
    }

    #[must_use]
    pub fn include_names(&self) -> &[String] {
        &self.include
    }

    /// Whether a recognized root hook is configured, by name.
    #[must_use]
    pub fn has_root_hook(&self, name: &str) -> bool {
        match name {
            "key" => self.root.key.is_some(),
            "create" => self.root.create.is_some(),
            "update" => self.root.update.is_some(),
            "array_changed" => self.root.array_changed.is_some(),
            _ => false,
        }
    }

    /// Merge `overlay` onto `self`: lists concatenate (first occurrence
    /// wins on duplicates), recognized hooks overlay-win where set,
    /// unrecognized entries last-wins.
    pub(crate) fn merged_with(&self, overlay: &Mapping) -> Mapping {
        fn concat(base: &[String], extra: &[String]) -> Vec<String> {
            let mut out = base.to_vec();
            for item in extra {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            out
        }
        let mut children = self.children.clone();
        for (path, hooks) in &overlay.children {
            let merged = match children.get(path) {
                Some(existing) => existing.merged_with(hooks),
                None => hooks.clone(),
            };
            children.insert(path.clone(), merged);
        }
        let mut extra = self.extra.clone();
        extra.extend(overlay.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        Mapping {
            ignore: concat(&self.ignore, &overlay.ignore),
            copy: concat(&self.copy, &overlay.copy),
            observe: concat(&self.observe, &overlay.observe),
            include: concat(&self.include, &overlay.include),
            root: self.root.merged_with(&overlay.root),
            children,
            extra,
        }
    }
}

impl fmt::Debug for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapping")
            .field("ignore", &self.ignore)
            .field("copy", &self.copy)
            .field("observe", &self.observe)
            .field("include", &self.include)
            .field("root", &self.root)
            .field("children", &self.children)
            .field("extra", &self.extra)
            .finish()
    }
}

// ── process-wide defaults ──

thread_local! {
    static DEFAULTS: RefCell<Node> = RefCell::new(initial_defaults());
}

fn initial_defaults() -> Node {
    Node::object([
        ("ignore", Node::array([])),
        ("include", Node::array([Node::str("_destroy")])),
        ("copy", Node::array([])),
        ("observe", Node::array([])),
    ])
}

/// The current process-wide default options tree.
#[must_use]
pub fn default_options() -> Node {
    DEFAULTS.with(|cell| cell.borrow().clone())
}

/// Replace the process-wide defaults. The shape is validated on the next
/// mapping call, not here.
pub fn set_default_options(options: Node) {
    DEFAULTS.with(|cell| *cell.borrow_mut() = options);
}

/// Restore the initial defaults (`include` = `["_destroy"]`, empty lists).
pub fn reset_default_options() {
    DEFAULTS.with(|cell| *cell.borrow_mut() = initial_defaults());
}

#[derive(Debug)]
pub(crate) struct DefaultLists {
    pub ignore: Vec<String>,
    pub include: Vec<String>,
    pub copy: Vec<String>,
    pub observe: Vec<String>,
}

fn string_list(options: &crate::node::ObjectRef, name: &str) -> Result<Vec<String>, MapError> {
    let Some(node) = options.get(name) else {
        return Ok(Vec::new());
    };
    let Node::Array(items) = node else {
        return Err(MapError::InvalidOptions(format!("{name} must be a list")));
    };
    items.with(|items| {
        items
            .iter()
            .map(|item| match item {
                Node::Str(s) => Ok(s.clone()),
                _ => Err(MapError::InvalidOptions(format!(
                    "{name} entries must be strings"
                ))),
            })
            .collect()
    })
}

/// Validate and read the process-wide defaults. Called at the top of every
/// materialize/dematerialize.
pub(crate) fn resolved_defaults() -> Result<DefaultLists, MapError> {
    let node = default_options();
    let Node::Object(object) = &node else {
        return Err(MapError::InvalidOptions(
            "default options must be an object".into(),
        ));
    };
    Ok(DefaultLists {
        ignore: string_list(object, "ignore")?,
        include: string_list(object, "include")?,
        copy: string_list(object, "copy")?,
        observe: string_list(object, "observe")?,
    })
}

// ── call-time resolution ──

/// A `Mapping` resolved against the defaults, a possible previous call's
/// stored options, and the call root's literal key set.
pub(crate) struct Resolved {
    pub ignore: PathSet,
    pub copy: PathSet,
    pub observe: PathSet,
    pub include: NameSet,
    pub root: Hooks,
    children: Vec<(Vec<Segment>, Hooks)>,
    /// The merged mapping, stored into root metadata for later calls.
    pub mapping: Mapping,
}

impl Resolved {
    pub fn new(
        call: &Mapping,
        previous: Option<&Mapping>,
        root_literal_keys: &BTreeSet<String>,
    ) -> Result<Self, MapError> {
        let defaults = resolved_defaults()?;
        let mapping = match previous {
            Some(previous) => previous.merged_with(call),
            None => call.clone(),
        };

        fn with_defaults(defaults: &[String], own: &[String]) -> Vec<String> {
            let mut out = defaults.to_vec();
            for item in own {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            out
        }

        let ignore = with_defaults(&defaults.ignore, &mapping.ignore);
        let copy = with_defaults(&defaults.copy, &mapping.copy);
        let observe = with_defaults(&defaults.observe, &mapping.observe);
        let include = with_defaults(&defaults.include, &mapping.include);

        let children = mapping
            .children
            .iter()
            .map(|(path, hooks)| (paths::parse(path), hooks.clone()))
            .collect();

        Ok(Self {
            ignore: PathSet::resolve(&ignore, root_literal_keys),
            copy: PathSet::resolve(&copy, root_literal_keys),
            observe: PathSet::resolve(&observe, root_literal_keys),
            include: NameSet::new(&include),
            root: mapping.root.clone(),
            children,
            mapping,
        })
    }

    /// Hooks configured for the node at `path`: an exact full-path entry
    /// if present, else a single-name entry matching the last key segment.
    pub fn hooks_for(&self, path: &[Segment]) -> Hooks {
        if path.is_empty() {
            return self.root.clone();
        }
        for (pattern, hooks) in &self.children {
            if pattern.as_slice() == path {
                return hooks.clone();
            }
        }
        if let Some(Segment::Key(name)) = path.last() {
            for (pattern, hooks) in &self.children {
                if let [Segment::Key(single)] = pattern.as_slice()
                    && single == name
                    && pattern.as_slice() != path
                {
                    return hooks.clone();
                }
            }
        }
        Hooks::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reset() {
        reset_default_options();
    }

    #[test]
    fn defaults_start_with_destroy_included() {
        reset();
        let lists = resolved_defaults().unwrap();
        assert_eq!(lists.include, vec!["_destroy".to_owned()]);
        assert!(lists.ignore.is_empty());
    }

    #[test]
    fn malformed_defaults_surface_on_read() {
        reset();
        set_default_options(Node::object([("include", Node::Int(5))]));
        let err = resolved_defaults().unwrap_err();
        assert!(matches!(err, MapError::InvalidOptions(_)));
        reset();
        assert!(resolved_defaults().is_ok());
    }

    #[test]
    fn merge_concatenates_lists_and_overlays_hooks() {
        let base = Mapping::new()
            .ignore(["a"])
            .key(|node| Ok(node.clone()));
        let overlay = Mapping::new().ignore(["b", "a"]).extra("flag", Node::Int(1));
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.ignore, vec!["a".to_owned(), "b".to_owned()]);
        assert!(merged.root.key.is_some());
        assert_eq!(merged.extra_entry("flag"), Some(Node::Int(1)));
    }

    #[test]
    fn child_hooks_resolve_by_path_then_name() {
        reset();
        let mapping = Mapping::new()
            .child("a.b", Hooks::new().update(|input| Ok(input.data.clone())))
            .child("items", Hooks::new().key(|node| Ok(node.clone())));
        let resolved = Resolved::new(&mapping, None, &BTreeSet::new()).unwrap();

        assert!(resolved.hooks_for(&paths::parse("a.b")).update.is_some());
        assert!(resolved.hooks_for(&paths::parse("items")).key.is_some());
        // Single-name entries apply at any depth.
        assert!(resolved.hooks_for(&paths::parse("x.items")).key.is_some());
        assert!(resolved.hooks_for(&paths::parse("x.other")).is_empty());
    }

    #[test]
    fn rematerialize_merge_keeps_recognized_hooks() {
        reset();
        let first = Mapping::new().key(|node| Ok(node.clone())).ignore(["a"]);
        let second = Mapping::new().ignore(["b"]);
        let resolved = Resolved::new(&second, Some(&first), &BTreeSet::new()).unwrap();
        assert!(resolved.root.key.is_some());
        assert!(resolved.ignore.matches(&paths::parse("a")));
        assert!(resolved.ignore.matches(&paths::parse("b")));
    }
}
