//! Synchronous rule evaluation.

use crate::rules::{FieldRules, FormValues};
use tirea_form_state::{Path, Seg, Tree};

/// Run the built-in checks and the custom predicate for one path.
///
/// Checks run in a fixed order and the first failure wins: required,
/// pattern, length bounds, numeric bounds, custom predicate.
pub fn evaluate_sync(path: &Path, values: &FormValues, rules: &FieldRules) -> Option<String> {
    let value = values.get_path(path).unwrap_or_else(|| Tree::null_ref());

    if let Some(message) = &rules.required {
        if is_blank(value) {
            return Some(message.clone());
        }
    }

    if let Some(text) = value.as_str().filter(|s| !s.is_empty()) {
        if let Some(check) = &rules.pattern {
            if !check.value.is_match(text) {
                return Some(check.message.clone());
            }
        }
        let len = text.chars().count();
        if let Some(check) = &rules.min_length {
            if len < check.value {
                return Some(check.message.clone());
            }
        }
        if let Some(check) = &rules.max_length {
            if len > check.value {
                return Some(check.message.clone());
            }
        }
    }

    if let Some(n) = value.as_number() {
        if let Some(check) = &rules.min {
            if n < check.value {
                return Some(check.message.clone());
            }
        }
        if let Some(check) = &rules.max {
            if n > check.value {
                return Some(check.message.clone());
            }
        }
    }

    rules.validate.as_ref().and_then(|f| f(value, values))
}

fn is_blank(value: &Tree) -> bool {
    match value {
        Tree::Null => true,
        Tree::String(s) => s.trim().is_empty(),
        Tree::List(items) => items.is_empty(),
        _ => false,
    }
}

/// Evaluate every registered path and collect the failures into one error
/// tree. Paths orphaned by a shrunken list are skipped.
pub fn validate_all<'a, I>(values: &FormValues, rules: I) -> Tree
where
    I: IntoIterator<Item = (&'a Path, &'a FieldRules)>,
{
    let mut errors = Tree::Null;
    for (path, rules) in rules {
        if is_orphaned(path, values.tree()) {
            continue;
        }
        if let Some(message) = evaluate_sync(path, values, rules) {
            errors = errors.set(path, Tree::String(message));
        }
    }
    errors
}

/// True when some index segment of `path` points past the end of a list
/// that exists in `values`.
///
/// A rule registered for `items.3.name` outlives a removal that shrinks
/// `items` to three entries; such a rule has no field to check.
pub fn is_orphaned(path: &Path, values: &Tree) -> bool {
    let mut cursor = values;
    for seg in path.iter() {
        match (seg, cursor) {
            (Seg::Index(i), Tree::List(items)) => match items.get(*i) {
                Some(next) => cursor = next,
                None => return true,
            },
            (Seg::Key(k), Tree::Map(map)) => match map.get(k) {
                Some(next) => cursor = next,
                None => return false,
            },
            _ => return false,
        }
    }
    false
}
