//! Copy-on-write value tree.
//!
//! `Tree` mirrors the JSON data model, but its containers sit behind `Arc` so
//! cloning a tree is cheap and an update only copies the containers on the
//! path being written. Every sibling subtree stays shared with the previous
//! revision.

use crate::{Path, Seg, MAX_INDEX};
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Map container used by [`Tree::Map`].
pub type TreeMap = BTreeMap<String, Tree>;

/// An immutable, structurally shared value tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Tree {
    /// Absent or cleared value.
    #[default]
    Null,
    /// Boolean leaf.
    Bool(bool),
    /// Numeric leaf.
    Number(Number),
    /// String leaf.
    String(String),
    /// Ordered sequence of subtrees.
    List(Arc<Vec<Tree>>),
    /// String-keyed map of subtrees.
    Map(Arc<TreeMap>),
}

static NULL: Tree = Tree::Null;

impl Tree {
    /// An empty map.
    pub fn map() -> Self {
        Tree::Map(Arc::new(TreeMap::new()))
    }

    /// An empty list.
    pub fn list() -> Self {
        Tree::List(Arc::new(Vec::new()))
    }

    /// A list built from items.
    pub fn from_items(items: Vec<Tree>) -> Self {
        Tree::List(Arc::new(items))
    }

    /// Reference to a shared `Null`, returned by lookups that miss.
    pub fn null_ref() -> &'static Tree {
        &NULL
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Tree::Null)
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Tree::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Tree::String(s) => Some(s),
            _ => None,
        }
    }

    #[inline]
    pub fn as_list(&self) -> Option<&[Tree]> {
        match self {
            Tree::List(items) => Some(items),
            _ => None,
        }
    }

    #[inline]
    pub fn as_map(&self) -> Option<&TreeMap> {
        match self {
            Tree::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric view of a leaf: numbers directly, strings when they parse as
    /// a finite number after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Tree::Number(n) => n.as_f64(),
            Tree::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
            }
            _ => None,
        }
    }

    /// True if both trees are the same container allocation (or equal leaves).
    ///
    /// Used to observe structural sharing; containers compare by pointer.
    pub fn ptr_eq(&self, other: &Tree) -> bool {
        match (self, other) {
            (Tree::List(a), Tree::List(b)) => Arc::ptr_eq(a, b),
            (Tree::Map(a), Tree::Map(b)) => Arc::ptr_eq(a, b),
            (a, b) => a == b,
        }
    }

    /// True if any leaf satisfies `pred`.
    pub fn any_leaf(&self, pred: &impl Fn(&Tree) -> bool) -> bool {
        match self {
            Tree::List(items) => items.iter().any(|t| t.any_leaf(pred)),
            Tree::Map(map) => map.values().any(|t| t.any_leaf(pred)),
            leaf => pred(leaf),
        }
    }

    /// Read the subtree at `path`. Missing paths yield `None`.
    pub fn get(&self, path: &Path) -> Option<&Tree> {
        let mut current = self;
        for seg in path.segments() {
            current = match (seg, current) {
                (Seg::Key(key), Tree::Map(map)) => map.get(key)?,
                (Seg::Index(idx), Tree::List(items)) => items.get(*idx)?,
                (Seg::Index(idx), Tree::Map(map)) => map.get(&idx.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Return a new tree with `value` stored at `path`.
    ///
    /// Missing intermediates are created as lists when the following segment
    /// is an index and as maps otherwise. Indexing past the end of a list
    /// pads it with `Null`. A write addressed beyond [`MAX_INDEX`] is
    /// dropped and the tree returned unchanged.
    pub fn set(&self, path: &Path, value: Tree) -> Tree {
        if let Some(index) = path.iter().filter_map(Seg::as_index).find(|i| *i > MAX_INDEX) {
            tracing::warn!(path = %path, index, "write beyond list index limit ignored");
            return self.clone();
        }
        let mut root = self.clone();
        set_in(&mut root, path.segments(), value);
        root
    }

    /// Return a new tree with the value at `path` removed.
    ///
    /// Map entries are deleted. List slots are overwritten with `Null` so the
    /// list keeps its length; splicing is a structural edit, see
    /// [`apply_array_op`](crate::apply_array_op).
    pub fn unset(&self, path: &Path) -> Tree {
        if self.get(path).is_none() {
            return self.clone();
        }
        let Some((last, parents)) = path.segments().split_last() else {
            return Tree::Null;
        };
        let mut root = self.clone();
        if let Some(parent) = get_mut(&mut root, parents) {
            match (last, parent) {
                (Seg::Key(key), Tree::Map(map)) => {
                    Arc::make_mut(map).remove(key);
                }
                (Seg::Index(idx), Tree::List(items)) => {
                    if let Some(slot) = Arc::make_mut(items).get_mut(*idx) {
                        *slot = Tree::Null;
                    }
                }
                (Seg::Index(idx), Tree::Map(map)) => {
                    Arc::make_mut(map).remove(&idx.to_string());
                }
                _ => {}
            }
        }
        root
    }

    /// Like [`unset`](Self::unset), but also drops map containers left empty
    /// on the way back up. List containers are never removed so their
    /// length is preserved.
    pub fn unset_pruned(&self, path: &Path) -> Tree {
        let mut tree = self.unset(path);
        let mut cursor = path.clone();
        while cursor.pop().is_some() && !cursor.is_empty() {
            let prunable = matches!(tree.get(&cursor), Some(Tree::Map(map)) if map.is_empty());
            if !prunable {
                break;
            }
            tree = tree.unset(&cursor);
        }
        tree
    }

    /// Visit every leaf with its path.
    pub fn for_each_leaf(&self, f: &mut impl FnMut(&Path, &Tree)) {
        fn walk(node: &Tree, at: &mut Path, f: &mut impl FnMut(&Path, &Tree)) {
            match node {
                Tree::List(items) => {
                    for (i, item) in items.iter().enumerate() {
                        at.push(Seg::Index(i));
                        walk(item, at, f);
                        at.pop();
                    }
                }
                Tree::Map(map) => {
                    for (k, v) in map.iter() {
                        at.push(Seg::Key(k.clone()));
                        walk(v, at, f);
                        at.pop();
                    }
                }
                leaf => f(at, leaf),
            }
        }
        walk(self, &mut Path::root(), f);
    }

    /// Convert to a `serde_json::Value`.
    pub fn to_value(&self) -> Value {
        Value::from(self)
    }
}

fn set_in(current: &mut Tree, segments: &[Seg], value: Tree) {
    let Some((seg, rest)) = segments.split_first() else {
        *current = value;
        return;
    };
    match seg {
        Seg::Key(key) => {
            if !matches!(current, Tree::Map(_)) {
                *current = Tree::map();
            }
            if let Tree::Map(map) = current {
                let entry = Arc::make_mut(map).entry(key.clone()).or_default();
                set_in(entry, rest, value);
            }
        }
        Seg::Index(idx) => {
            if let Tree::Map(map) = current {
                let entry = Arc::make_mut(map).entry(idx.to_string()).or_default();
                set_in(entry, rest, value);
                return;
            }
            if !matches!(current, Tree::List(_)) {
                *current = Tree::list();
            }
            if let Tree::List(items) = current {
                let items = Arc::make_mut(items);
                if items.len() <= *idx {
                    items.resize(*idx + 1, Tree::Null);
                }
                set_in(&mut items[*idx], rest, value);
            }
        }
    }
}

fn get_mut<'a>(current: &'a mut Tree, segments: &[Seg]) -> Option<&'a mut Tree> {
    let Some((seg, rest)) = segments.split_first() else {
        return Some(current);
    };
    let child = match (seg, current) {
        (Seg::Key(key), Tree::Map(map)) => Arc::make_mut(map).get_mut(key)?,
        (Seg::Index(idx), Tree::List(items)) => Arc::make_mut(items).get_mut(*idx)?,
        (Seg::Index(idx), Tree::Map(map)) => Arc::make_mut(map).get_mut(&idx.to_string())?,
        _ => return None,
    };
    get_mut(child, rest)
}

impl From<Value> for Tree {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Tree::Null,
            Value::Bool(b) => Tree::Bool(b),
            Value::Number(n) => Tree::Number(n),
            Value::String(s) => Tree::String(s),
            Value::Array(items) => Tree::List(Arc::new(items.into_iter().map(Tree::from).collect())),
            Value::Object(map) => Tree::Map(Arc::new(
                map.into_iter().map(|(k, v)| (k, Tree::from(v))).collect(),
            )),
        }
    }
}

impl From<&Tree> for Value {
    fn from(tree: &Tree) -> Self {
        match tree {
            Tree::Null => Value::Null,
            Tree::Bool(b) => Value::Bool(*b),
            Tree::Number(n) => Value::Number(n.clone()),
            Tree::String(s) => Value::String(s.clone()),
            Tree::List(items) => Value::Array(items.iter().map(Value::from).collect()),
            Tree::Map(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Tree> for Value {
    fn from(tree: Tree) -> Self {
        Value::from(&tree)
    }
}

impl From<bool> for Tree {
    fn from(b: bool) -> Self {
        Tree::Bool(b)
    }
}

impl From<&str> for Tree {
    fn from(s: &str) -> Self {
        Tree::String(s.to_owned())
    }
}

impl From<String> for Tree {
    fn from(s: String) -> Self {
        Tree::String(s)
    }
}

impl From<i64> for Tree {
    fn from(n: i64) -> Self {
        Tree::Number(n.into())
    }
}

impl PartialEq<Value> for Tree {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Tree::Null, Value::Null) => true,
            (Tree::Bool(a), Value::Bool(b)) => a == b,
            (Tree::Number(a), Value::Number(b)) => a == b,
            (Tree::String(a), Value::String(b)) => a == b,
            (Tree::List(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Tree::Map(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| b.get(k).is_some_and(|other| v == other))
            }
            _ => false,
        }
    }
}

impl Serialize for Tree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};
        match self {
            Tree::Null => serializer.serialize_unit(),
            Tree::Bool(b) => serializer.serialize_bool(*b),
            Tree::Number(n) => n.serialize(serializer),
            Tree::String(s) => serializer.serialize_str(s),
            Tree::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items.iter() {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Tree::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map.iter() {
                    out.serialize_entry(k, v)?;
                }
                out.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for Tree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Tree::from)
    }
}
