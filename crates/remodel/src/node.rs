//! The dynamic node model shared by sources and mapped graphs.
//!
//! A [`Node`] is either plain data (scalars, `Rc`-shared arrays and
//! objects) or a reactive container from `remodel-reactive`. Plain
//! containers use `Rc` so that shared references and cycles in a source
//! tree are expressible and recoverable by pointer identity; JSON input is
//! converted into this model by the wire layer.
//!
//! Equality is structural for plain data (with a pointer fast path) and
//! pointer identity for reactive containers.

use std::cell::{Ref, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use remodel_reactive::{Computed, Observable, ObservableVec};

use crate::options::{Hooks, Mapping};
use crate::paths::{self, Segment};

/// Mapping metadata carried on the root node of a materialize call.
#[derive(Clone, Default)]
pub struct RootMeta {
    /// Full paths (relative to this root) the engine produced, recorded in
    /// traversal order. Dematerialize restricts its walk to these.
    pub mapped_properties: BTreeSet<String>,
    /// The resolved configuration of the call, merged across successive
    /// calls targeting the same root.
    pub options: Mapping,
}

struct ObjectData {
    props: BTreeMap<String, Node>,
    meta: Option<RootMeta>,
}

/// A shared plain object.
#[derive(Clone)]
pub struct ObjectRef {
    inner: Rc<RefCell<ObjectData>>,
}

impl ObjectRef {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObjectData {
                props: BTreeMap::new(),
                meta: None,
            })),
        }
    }

    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, Node)>) -> Self {
        let object = Self::new();
        for (key, value) in pairs {
            object.set(key, value);
        }
        object
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Node> {
        self.inner.borrow().props.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Node) {
        self.inner.borrow_mut().props.insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Node> {
        self.inner.borrow_mut().props.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.borrow().props.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().props.keys().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().props.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().props.is_empty()
    }

    /// Run `f` over the property map without cloning it.
    pub fn with_props<R>(&self, f: impl FnOnce(&BTreeMap<String, Node>) -> R) -> R {
        f(&self.inner.borrow().props)
    }

    #[must_use]
    pub fn meta(&self) -> Option<RootMeta> {
        self.inner.borrow().meta.clone()
    }

    #[must_use]
    pub fn has_meta(&self) -> bool {
        self.inner.borrow().meta.is_some()
    }

    pub fn set_meta(&self, meta: RootMeta) {
        self.inner.borrow_mut().meta = Some(meta);
    }

    #[must_use]
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for ObjectRef {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared plain array.
#[derive(Clone)]
pub struct ArrayRef {
    inner: Rc<RefCell<Vec<Node>>>,
}

impl ArrayRef {
    #[must_use]
    pub fn new(items: Vec<Node>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(items)),
        }
    }

    #[must_use]
    pub fn get(&self) -> Vec<Node> {
        self.inner.borrow().clone()
    }

    pub fn with<R>(&self, f: impl FnOnce(&[Node]) -> R) -> R {
        f(&self.inner.borrow())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().is_empty()
    }

    pub fn push(&self, item: Node) {
        self.inner.borrow_mut().push(item);
    }

    #[must_use]
    pub fn ptr_id(&self) -> usize {
        Rc::as_ptr(&self.inner) as *const () as usize
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn items(&self) -> Ref<'_, Vec<Node>> {
        self.inner.borrow()
    }
}

/// Metadata attached to every mapped sequence: the element hooks resolved
/// for its position, plus root metadata when the sequence is itself the
/// root of a materialize call.
#[derive(Clone, Default)]
pub struct SeqMeta {
    pub hooks: Hooks,
    pub root: Option<RootMeta>,
}

/// A reactive ordered sequence together with its mapping metadata.
#[derive(Clone)]
pub struct SeqRef {
    items: ObservableVec<Node>,
    meta: Rc<RefCell<SeqMeta>>,
}

impl SeqRef {
    #[must_use]
    pub fn new(items: Vec<Node>) -> Self {
        Self {
            items: ObservableVec::new(items),
            meta: Rc::new(RefCell::new(SeqMeta::default())),
        }
    }

    /// The underlying reactive vector.
    #[must_use]
    pub fn items(&self) -> &ObservableVec<Node> {
        &self.items
    }

    #[must_use]
    pub fn get(&self) -> Vec<Node> {
        self.items.get()
    }

    pub fn with<R>(&self, f: impl FnOnce(&[Node]) -> R) -> R {
        self.items.with(f)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn meta(&self) -> SeqMeta {
        self.meta.borrow().clone()
    }

    pub fn set_hooks(&self, hooks: Hooks) {
        self.meta.borrow_mut().hooks = hooks;
    }

    #[must_use]
    pub fn root_meta(&self) -> Option<RootMeta> {
        self.meta.borrow().root.clone()
    }

    pub fn set_root_meta(&self, meta: RootMeta) {
        self.meta.borrow_mut().root = Some(meta);
    }

    #[must_use]
    pub fn ptr_id(&self) -> usize {
        self.items.ptr_id()
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.items.ptr_eq(&other.items)
    }
}

/// One node of a source tree or mapped graph.
#[derive(Clone)]
pub enum Node {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    /// Shared plain array.
    Array(ArrayRef),
    /// Shared plain object, optionally carrying root mapping metadata.
    Object(ObjectRef),
    /// Reactive scalar container.
    Obs(Observable<Node>),
    /// Reactive sequence with mapping metadata.
    Seq(SeqRef),
    /// Derived view.
    Computed(Computed<Node>),
}

impl Node {
    #[must_use]
    pub fn str(value: impl Into<String>) -> Self {
        Self::Str(value.into())
    }

    #[must_use]
    pub fn array(items: impl IntoIterator<Item = Node>) -> Self {
        Self::Array(ArrayRef::new(items.into_iter().collect()))
    }

    #[must_use]
    pub fn object<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Node)>) -> Self {
        Self::Object(ObjectRef::from_pairs(
            pairs.into_iter().map(|(k, v)| (k.into(), v)),
        ))
    }

    #[must_use]
    pub fn obs(value: impl Into<Node>) -> Self {
        Self::Obs(Observable::new(value.into()))
    }

    #[must_use]
    pub fn seq(items: impl IntoIterator<Item = Node>) -> Self {
        Self::Seq(SeqRef::new(items.into_iter().collect()))
    }

    /// Whether this node is a reactive container.
    #[must_use]
    pub fn is_reactive(&self) -> bool {
        matches!(self, Self::Obs(_) | Self::Seq(_) | Self::Computed(_))
    }

    /// Whether this node is an atomic value (not a container of any kind).
    #[must_use]
    pub fn is_atomic(&self) -> bool {
        matches!(
            self,
            Self::Null | Self::Bool(_) | Self::Int(_) | Self::Num(_) | Self::Str(_)
        )
    }

    /// Pointer identity, for containers that have one.
    #[must_use]
    pub fn ptr_id(&self) -> Option<usize> {
        match self {
            Self::Array(a) => Some(a.ptr_id()),
            Self::Object(o) => Some(o.ptr_id()),
            Self::Obs(o) => Some(o.ptr_id()),
            Self::Seq(s) => Some(s.ptr_id()),
            Self::Computed(c) => Some(c.ptr_id()),
            _ => None,
        }
    }

    /// Unwrap one reactive layer: the current value of an `Obs` or
    /// `Computed`, the node itself otherwise.
    #[must_use]
    pub fn get(&self) -> Node {
        match self {
            Self::Obs(o) => o.get(),
            Self::Computed(c) => c.get(),
            other => other.clone(),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_seq(&self) -> Option<&SeqRef> {
        match self {
            Self::Seq(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_obs(&self) -> Option<&Observable<Node>> {
        match self {
            Self::Obs(o) => Some(o),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Navigate a dotted/indexed path (`"a.b[0].c"`), unwrapping reactive
    /// containers along the way. The final node is returned as stored.
    #[must_use]
    pub fn path(&self, path: &str) -> Option<Node> {
        let mut current = self.clone();
        for segment in paths::parse(path) {
            let stepped = match (&current.get(), &segment) {
                (Self::Object(o), Segment::Key(key)) => o.get(key),
                (Self::Array(a), Segment::Index(i)) => a.with(|items| items.get(*i).cloned()),
                (Self::Seq(s), Segment::Index(i)) => s.with(|items| items.get(*i).cloned()),
                _ => None,
            };
            current = stepped?;
        }
        Some(current)
    }

    /// Convert to plain JSON, reading through reactive containers. Mapping
    /// metadata is not consulted; see `dematerialize` for the meta-aware
    /// walk. Non-finite numbers become `null`, as in JSON serialization.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(n) => Value::from(*n),
            Self::Num(n) => serde_json::Number::from_f64(*n).map_or(Value::Null, Value::Number),
            Self::Str(s) => Value::String(s.clone()),
            Self::Array(a) => Value::Array(a.with(|items| items.iter().map(Node::to_value).collect())),
            Self::Object(o) => {
                let mut map = serde_json::Map::new();
                o.with_props(|props| {
                    for (key, value) in props {
                        map.insert(key.clone(), value.to_value());
                    }
                });
                Value::Object(map)
            }
            Self::Obs(o) => o.get().to_value(),
            Self::Seq(s) => Value::Array(s.with(|items| items.iter().map(Node::to_value).collect())),
            Self::Computed(c) => c.get().to_value(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Num(a), Self::Num(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Array(a), Self::Array(b)) => {
                a.ptr_eq(b) || *a.items() == *b.items()
            }
            (Self::Object(a), Self::Object(b)) => {
                a.ptr_eq(b) || a.with_props(|ap| b.with_props(|bp| ap == bp))
            }
            (Self::Obs(a), Self::Obs(b)) => a.ptr_eq(b),
            (Self::Seq(a), Self::Seq(b)) => a.ptr_eq(b),
            (Self::Computed(a), Self::Computed(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(n) => write!(f, "Int({n})"),
            Self::Num(n) => write!(f, "Num({n})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Array(a) => a.with(|items| f.debug_list().entries(items).finish()),
            Self::Object(o) => o.with_props(|props| f.debug_map().entries(props).finish()),
            Self::Obs(o) => write!(f, "Obs({:?})", o.get()),
            Self::Seq(s) => {
                f.write_str("Seq")?;
                s.with(|items| f.debug_list().entries(items).finish())
            }
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<bool> for Node {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Node {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Node {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for Node {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<&str> for Node {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for Node {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Num(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Self::Str(s),
            Value::Array(items) => {
                Self::Array(ArrayRef::new(items.into_iter().map(Node::from).collect()))
            }
            Value::Object(map) => Self::Object(ObjectRef::from_pairs(
                map.into_iter().map(|(k, v)| (k, Node::from(v))),
            )),
        }
    }
}
