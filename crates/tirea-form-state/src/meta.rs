//! Parallel metadata trees kept aligned with a values tree.
//!
//! Four sparse trees share the values tree's addressing: `errors` holds
//! string leaves, `touched`, `dirty` and `validating` hold `true` leaves.
//! A cleared flag is removed rather than stored as `false`.

use crate::{IndexRemap, Path, Tree};
use serde::{Deserialize, Serialize};

/// Selects one of the metadata trees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetaKind {
    /// Validation error messages.
    Errors,
    /// Fields the user has visited.
    Touched,
    /// Fields whose value differs from the initial snapshot.
    Dirty,
    /// Fields with async validation pending or running.
    Validating,
}

impl MetaKind {
    /// All kinds, in a fixed order.
    pub const ALL: [MetaKind; 4] = [
        MetaKind::Errors,
        MetaKind::Touched,
        MetaKind::Dirty,
        MetaKind::Validating,
    ];
}

/// The errors/touched/dirty/validating trees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaTrees {
    pub errors: Tree,
    pub touched: Tree,
    pub dirty: Tree,
    pub validating: Tree,
}

impl MetaTrees {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// The tree for `kind`.
    pub fn tree(&self, kind: MetaKind) -> &Tree {
        match kind {
            MetaKind::Errors => &self.errors,
            MetaKind::Touched => &self.touched,
            MetaKind::Dirty => &self.dirty,
            MetaKind::Validating => &self.validating,
        }
    }

    fn tree_mut(&mut self, kind: MetaKind) -> &mut Tree {
        match kind {
            MetaKind::Errors => &mut self.errors,
            MetaKind::Touched => &mut self.touched,
            MetaKind::Dirty => &mut self.dirty,
            MetaKind::Validating => &mut self.validating,
        }
    }

    /// Error message stored exactly at `path`.
    pub fn error(&self, path: &Path) -> Option<&str> {
        self.errors.get(path).and_then(Tree::as_str)
    }

    pub fn set_error(&mut self, path: &Path, message: impl Into<String>) {
        self.errors = self.errors.set(path, Tree::String(message.into()));
    }

    /// Remove the error at `path` (and any nested errors below it).
    pub fn clear_error(&mut self, path: &Path) {
        self.clear(MetaKind::Errors, path);
    }

    /// Store `Some(msg)` as an error or clear the slot for `None`.
    pub fn put_error(&mut self, path: &Path, message: Option<String>) {
        match message {
            Some(msg) => self.set_error(path, msg),
            None => self.clear_error(path),
        }
    }

    /// True if a `true` leaf exists at or below `path`.
    pub fn flag(&self, kind: MetaKind, path: &Path) -> bool {
        self.tree(kind)
            .get(path)
            .is_some_and(|t| t.any_leaf(&|leaf| leaf.as_bool() == Some(true)))
    }

    /// Set or clear a boolean flag.
    pub fn set_flag(&mut self, kind: MetaKind, path: &Path, on: bool) {
        if on {
            let tree = self.tree_mut(kind);
            *tree = tree.set(path, Tree::Bool(true));
        } else {
            self.clear(kind, path);
        }
    }

    /// Remove the subtree at `path` in one tree.
    ///
    /// List slots are nulled rather than spliced so sibling indices stay
    /// aligned with the values tree.
    pub fn clear(&mut self, kind: MetaKind, path: &Path) {
        let tree = self.tree_mut(kind);
        if path.is_empty() {
            *tree = Tree::Null;
        } else {
            *tree = tree.unset_pruned(path);
        }
    }

    /// Replace the subtree at `path` in one tree, pruning it when `value`
    /// carries nothing.
    pub fn replace_branch(&mut self, kind: MetaKind, path: &Path, value: Tree) {
        if value.is_null() {
            self.clear(kind, path);
        } else {
            let tree = self.tree_mut(kind);
            *tree = tree.set(path, value);
        }
    }

    /// Apply a structural remap to the branch at `path` of every tree.
    pub fn remap(&mut self, path: &Path, remap: &IndexRemap) {
        for kind in MetaKind::ALL {
            let tree = self.tree_mut(kind);
            *tree = remap.remap_branch(tree, path);
        }
    }

    /// Drop entries of the branch at `path` that sit past the end of a list
    /// in `values`, in every tree. Entries under missing map keys stay, since
    /// a required field may legitimately be absent.
    pub fn trim_to(&mut self, path: &Path, values: &Tree) {
        let value = values.get(path);
        for kind in MetaKind::ALL {
            let Some(branch) = self.tree(kind).get(path) else {
                continue;
            };
            let trimmed = trim_branch(branch, value);
            if trimmed != *branch {
                self.replace_branch(kind, path, trimmed);
            }
        }
    }

    /// True if any error message is recorded.
    pub fn has_errors(&self) -> bool {
        self.errors.any_leaf(&|leaf| leaf.as_str().is_some())
    }

    /// True if any flag of `kind` is set anywhere.
    pub fn any_flag(&self, kind: MetaKind) -> bool {
        self.tree(kind)
            .any_leaf(&|leaf| leaf.as_bool() == Some(true))
    }

    /// Paths of every `true` leaf of `kind`.
    pub fn flagged_paths(&self, kind: MetaKind) -> Vec<Path> {
        let mut out = Vec::new();
        self.tree(kind).for_each_leaf(&mut |p, leaf| {
            if leaf.as_bool() == Some(true) {
                out.push(p.clone());
            }
        });
        out
    }
}

fn trim_branch(meta: &Tree, value: Option<&Tree>) -> Tree {
    match (meta, value) {
        (Tree::List(entries), Some(Tree::List(items))) => {
            let mut out: Vec<Tree> = entries
                .iter()
                .zip(items.iter())
                .map(|(entry, item)| trim_branch(entry, Some(item)))
                .collect();
            while out.last().is_some_and(Tree::is_null) {
                out.pop();
            }
            if out.is_empty() {
                Tree::Null
            } else {
                Tree::from_items(out)
            }
        }
        (Tree::Map(entries), Some(value)) => {
            let mut out = meta.clone();
            for (key, entry) in entries.iter() {
                let trimmed = trim_branch(entry, value.as_map().and_then(|m| m.get(key)));
                if trimmed != *entry {
                    let at = Path::root().key(key.clone());
                    out = if trimmed.is_null() {
                        out.unset(&at)
                    } else {
                        out.set(&at, trimmed)
                    };
                }
            }
            out
        }
        _ => meta.clone(),
    }
}

/// Compute the dirty-flag subtree for `current` compared with `initial`.
///
/// Leaves that differ become `true`, as do map keys gone from `current`.
/// A list that lost slots never gets entries past its current end: when no
/// surviving slot differs, the list itself is flagged instead. Returns `Null`
/// when nothing differs.
pub fn dirty_tree(current: &Tree, initial: Option<&Tree>) -> Tree {
    match current {
        Tree::List(items) => {
            let init = initial.and_then(Tree::as_list).unwrap_or(&[]);
            let mut out: Vec<Tree> = items
                .iter()
                .enumerate()
                .map(|(i, item)| dirty_tree(item, init.get(i)))
                .collect();
            while out.last().is_some_and(Tree::is_null) {
                out.pop();
            }
            let shrunk = init.len() > items.len();
            let retyped = initial.is_some_and(|i| i.as_list().is_none());
            if out.is_empty() {
                if shrunk || (retyped && items.is_empty()) {
                    Tree::Bool(true)
                } else {
                    Tree::Null
                }
            } else {
                Tree::from_items(out)
            }
        }
        Tree::Map(map) => {
            let init = initial.and_then(Tree::as_map);
            let mut out = Tree::map();
            for (key, value) in map.iter() {
                let diff = dirty_tree(value, init.and_then(|m| m.get(key)));
                if !diff.is_null() {
                    out = out.set(&Path::root().key(key.clone()), diff);
                }
            }
            if let Some(init) = init {
                for key in init.keys().filter(|k| !map.contains_key(*k)) {
                    out = out.set(&Path::root().key(key.clone()), Tree::Bool(true));
                }
            }
            if initial.is_some_and(|i| i.as_map().is_none()) && map.is_empty() {
                return Tree::Bool(true);
            }
            if out.as_map().is_some_and(|m| m.is_empty()) {
                Tree::Null
            } else {
                out
            }
        }
        leaf => {
            let same = match initial {
                Some(init) => init == leaf,
                None => leaf.is_null(),
            };
            if same {
                Tree::Null
            } else {
                Tree::Bool(true)
            }
        }
    }
}
