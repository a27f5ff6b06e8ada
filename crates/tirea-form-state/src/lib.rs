//! Copy-on-write value trees with path addressing.
//!
//! `tirea-form-state` is the data layer under `tirea-form`: a JSON-shaped
//! [`Tree`] whose updates share every untouched subtree with the previous
//! revision, dot/bracket [`Path`]s, structural list edits that report how
//! indices moved, and the parallel metadata trees that follow those edits.
//!
//! # Core Concepts
//!
//! - **Tree**: immutable value tree; `set`/`unset` return a new root
//! - **Path**: parsed from `"items.2.name"` or `"items[2].name"`
//! - **ArrayOp / IndexRemap**: list edits plus the positional translation
//!   needed to re-index parallel trees
//! - **MetaTrees**: errors, touched, dirty and validating trees
//!
//! # Quick Start
//!
//! ```
//! use tirea_form_state::{Path, Tree};
//! use serde_json::json;
//!
//! let state = Tree::from(json!({"user": {"name": "Ada"}, "tags": []}));
//! let path = Path::parse("user.name").unwrap();
//!
//! let next = state.set(&path, Tree::from("Grace"));
//!
//! assert_eq!(next.get(&path), Some(&Tree::from("Grace")));
//! assert_eq!(state.get(&path), Some(&Tree::from("Ada"))); // Original unchanged
//! ```
//!
//! # Structural Edits
//!
//! ```
//! use tirea_form_state::{apply_array_op, path, ArrayOp, MetaTrees, Tree};
//! use serde_json::json;
//!
//! let values = Tree::from(json!({"items": ["A", "B"]}));
//! let mut meta = MetaTrees::new();
//! meta.set_error(&path!("items", 1usize), "taken");
//!
//! let edit = apply_array_op(&values, &path!("items"), &ArrayOp::remove(0)).unwrap();
//! meta.remap(&path!("items"), edit.remap.as_ref().unwrap());
//!
//! assert_eq!(edit.tree, json!({"items": ["B"]}));
//! assert_eq!(meta.error(&path!("items", 0usize)), Some("taken"));
//! ```

mod array;
mod error;
mod meta;
mod path;
mod tree;

pub use array::{apply_array_op, ArrayEdit, ArrayOp, IndexRemap};
pub use error::{value_type_name, StateError, StateResult};
pub use meta::{dirty_tree, MetaKind, MetaTrees};
pub use path::{Path, Seg, MAX_INDEX};
pub use tree::{Tree, TreeMap};

// Re-export serde_json::Value for convenience
pub use serde_json::Value;
