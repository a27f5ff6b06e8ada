//! Structural edits on lists found at a path.
//!
//! Each edit produces the new tree together with an [`IndexRemap`] that
//! describes where every slot of the old list went. The same remap is then
//! applied to parallel metadata trees so they stay aligned with the values.
//! Out-of-range edits are silent no-ops and produce no remap.

use crate::error::{value_type_name, StateError, StateResult};
use crate::{Path, Tree};
use serde::{Deserialize, Serialize};

/// A structural list edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ArrayOp {
    /// Push a value at the end.
    Append {
        /// Value to append.
        value: Tree,
    },
    /// Insert a value, clamping the index into `[0, len]`.
    Insert {
        /// Requested position.
        index: usize,
        /// Value to insert.
        value: Tree,
    },
    /// Splice out one slot.
    Remove {
        /// Slot to remove.
        index: usize,
    },
    /// Overwrite one slot in place.
    Replace {
        /// Slot to overwrite.
        index: usize,
        /// New value.
        value: Tree,
    },
    /// Remove a slot and reinsert it elsewhere.
    Move {
        /// Current position.
        from: usize,
        /// Destination position.
        to: usize,
    },
    /// Exchange two slots.
    Swap {
        /// First slot.
        a: usize,
        /// Second slot.
        b: usize,
    },
}

impl ArrayOp {
    /// Create an Append edit.
    #[inline]
    pub fn append(value: impl Into<Tree>) -> Self {
        ArrayOp::Append {
            value: value.into(),
        }
    }

    /// Create an Insert edit.
    #[inline]
    pub fn insert(index: usize, value: impl Into<Tree>) -> Self {
        ArrayOp::Insert {
            index,
            value: value.into(),
        }
    }

    /// Create a Remove edit.
    #[inline]
    pub fn remove(index: usize) -> Self {
        ArrayOp::Remove { index }
    }

    /// Create a Replace edit.
    #[inline]
    pub fn replace(index: usize, value: impl Into<Tree>) -> Self {
        ArrayOp::Replace {
            index,
            value: value.into(),
        }
    }

    /// Create a Move edit.
    #[inline]
    pub fn move_item(from: usize, to: usize) -> Self {
        ArrayOp::Move { from, to }
    }

    /// Create a Swap edit.
    #[inline]
    pub fn swap(a: usize, b: usize) -> Self {
        ArrayOp::Swap { a, b }
    }

    /// Get the operation name.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            ArrayOp::Append { .. } => "append",
            ArrayOp::Insert { .. } => "insert",
            ArrayOp::Remove { .. } => "remove",
            ArrayOp::Replace { .. } => "replace",
            ArrayOp::Move { .. } => "move",
            ArrayOp::Swap { .. } => "swap",
        }
    }
}

/// Positional translation produced by an effective [`ArrayOp`].
///
/// For every slot of the new list it records the old slot the content came
/// from; `None` marks a slot holding a new entity (inserted, appended, or
/// replaced). Moves, swaps and replaces also record the inclusive range they
/// touched; every slot inside it counts as affected even when its content
/// stayed in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexRemap {
    old_len: usize,
    sources: Vec<Option<usize>>,
    span: Option<(usize, usize)>,
}

impl IndexRemap {
    /// Length of the list before the edit.
    #[inline]
    pub fn old_len(&self) -> usize {
        self.old_len
    }

    /// Length of the list after the edit.
    #[inline]
    pub fn new_len(&self) -> usize {
        self.sources.len()
    }

    /// Old slot whose content now lives at `new_index`.
    pub fn source(&self, new_index: usize) -> Option<usize> {
        self.sources.get(new_index).copied().flatten()
    }

    /// New slot of the content that lived at `old_index`, if it survived.
    pub fn target(&self, old_index: usize) -> Option<usize> {
        self.sources.iter().position(|s| *s == Some(old_index))
    }

    /// New slots holding new entities.
    pub fn inserted(&self) -> Vec<usize> {
        self.sources
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Old slots whose content did not survive.
    pub fn removed(&self) -> Vec<usize> {
        (0..self.old_len)
            .filter(|old| self.target(*old).is_none())
            .collect()
    }

    /// `(old, new)` pairs for content that changed position.
    pub fn moved(&self) -> Vec<(usize, usize)> {
        self.sources
            .iter()
            .enumerate()
            .filter_map(|(new, s)| s.filter(|old| *old != new).map(|old| (old, new)))
            .collect()
    }

    /// True if work addressed to `old_index` must be invalidated: the slot
    /// moved, was removed or replaced, or lies inside the touched range.
    pub fn is_old_affected(&self, old_index: usize) -> bool {
        old_index < self.old_len
            && (self.in_span(old_index) || self.target(old_index) != Some(old_index))
    }

    /// True if `new_index` holds something other than what it held before.
    pub fn is_new_affected(&self, new_index: usize) -> bool {
        new_index < self.new_len()
            && (self.in_span(new_index) || self.source(new_index) != Some(new_index))
    }

    fn in_span(&self, index: usize) -> bool {
        self.span.is_some_and(|(lo, hi)| (lo..=hi).contains(&index))
    }

    /// Old slots whose in-flight work must be invalidated.
    pub fn affected_old(&self) -> Vec<usize> {
        (0..self.old_len)
            .filter(|i| self.is_old_affected(*i))
            .collect()
    }

    /// New slots whose derived state must be discarded.
    pub fn affected_new(&self) -> Vec<usize> {
        (0..self.new_len())
            .filter(|i| self.is_new_affected(*i))
            .collect()
    }

    /// Apply the remap to a (possibly shorter, sparse) parallel list.
    ///
    /// Slots without a source become `Null`; trailing `Null`s are trimmed.
    pub fn remap_list(&self, items: &[Tree]) -> Vec<Tree> {
        let mut out: Vec<Tree> = self
            .sources
            .iter()
            .map(|s| {
                s.and_then(|old| items.get(old))
                    .cloned()
                    .unwrap_or(Tree::Null)
            })
            .collect();
        while out.last().is_some_and(Tree::is_null) {
            out.pop();
        }
        out
    }

    /// Apply the remap to the branch of `tree` rooted at `path`.
    ///
    /// Branches that are absent or not lists are left alone. A branch left
    /// with no content is pruned.
    pub fn remap_branch(&self, tree: &Tree, path: &Path) -> Tree {
        let Some(Tree::List(items)) = tree.get(path) else {
            return tree.clone();
        };
        let remapped = self.remap_list(items);
        if remapped.is_empty() {
            tree.unset_pruned(path)
        } else {
            tree.set(path, Tree::from_items(remapped))
        }
    }
}

/// Result of [`apply_array_op`].
#[derive(Clone, Debug)]
pub struct ArrayEdit {
    /// The tree after the edit (the input tree when nothing changed).
    pub tree: Tree,
    /// Positional remap; `None` when the edit was a no-op.
    pub remap: Option<IndexRemap>,
}

impl ArrayEdit {
    fn unchanged(tree: &Tree) -> Self {
        Self {
            tree: tree.clone(),
            remap: None,
        }
    }

    /// True if the edit changed nothing.
    #[inline]
    pub fn is_noop(&self) -> bool {
        self.remap.is_none()
    }
}

/// Apply a structural edit to the list at `path` (pure function).
///
/// A missing or `Null` target behaves as an empty list, so `append` and
/// `insert` create it. Any other non-list target is a type mismatch.
///
/// # Examples
///
/// ```
/// use tirea_form_state::{apply_array_op, path, ArrayOp, Tree};
/// use serde_json::json;
///
/// let tree = Tree::from(json!({"items": ["a", "b", "c"]}));
/// let edit = apply_array_op(&tree, &path!("items"), &ArrayOp::move_item(0, 2)).unwrap();
///
/// assert_eq!(edit.tree, json!({"items": ["b", "c", "a"]}));
/// assert_eq!(edit.remap.unwrap().target(0), Some(2));
/// ```
pub fn apply_array_op(tree: &Tree, path: &Path, op: &ArrayOp) -> StateResult<ArrayEdit> {
    let current: &[Tree] = match tree.get(path) {
        None | Some(Tree::Null) => &[],
        Some(Tree::List(items)) => items.as_slice(),
        Some(other) => {
            return Err(StateError::type_mismatch(
                path.clone(),
                "array",
                value_type_name(other),
            ))
        }
    };
    let n = current.len();
    let mut items = current.to_vec();
    let mut sources: Vec<Option<usize>> = (0..n).map(Some).collect();
    let mut span = None;

    match op {
        ArrayOp::Append { value } => {
            items.push(value.clone());
            sources.push(None);
        }
        ArrayOp::Insert { index, value } => {
            let at = (*index).min(n);
            items.insert(at, value.clone());
            sources.insert(at, None);
        }
        ArrayOp::Remove { index } => {
            if *index >= n {
                return Ok(noop(tree, path, op));
            }
            items.remove(*index);
            sources.remove(*index);
        }
        ArrayOp::Replace { index, value } => {
            if *index >= n {
                return Ok(noop(tree, path, op));
            }
            items[*index] = value.clone();
            sources[*index] = None;
            span = Some((*index, *index));
        }
        ArrayOp::Move { from, to } => {
            if from == to || *from >= n || *to >= n {
                return Ok(noop(tree, path, op));
            }
            let item = items.remove(*from);
            items.insert(*to, item);
            let src = sources.remove(*from);
            sources.insert(*to, src);
            span = Some(((*from).min(*to), (*from).max(*to)));
        }
        ArrayOp::Swap { a, b } => {
            if a == b || *a >= n || *b >= n {
                return Ok(noop(tree, path, op));
            }
            items.swap(*a, *b);
            sources.swap(*a, *b);
            span = Some(((*a).min(*b), (*a).max(*b)));
        }
    }

    Ok(ArrayEdit {
        tree: tree.set(path, Tree::from_items(items)),
        remap: Some(IndexRemap {
            old_len: n,
            sources,
            span,
        }),
    })
}

fn noop(tree: &Tree, path: &Path, op: &ArrayOp) -> ArrayEdit {
    tracing::trace!(path = %path, op = op.name(), "structural edit out of range, ignored");
    ArrayEdit::unchanged(tree)
}
