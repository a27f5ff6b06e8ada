//! Path representation for navigating tree structure.
//!
//! Paths are sequences of segments that describe a location in a tree.
//! Each segment is either a key (for maps) or an index (for lists). Paths are
//! usually written as dot strings (`items.2.name`) and may use bracket
//! indices (`items[2].name`).

use crate::error::{StateError, StateResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest list index a parsed path may address.
///
/// Writing to an index pads the list up to it, so unbounded indices would let
/// a single path string allocate arbitrarily large lists.
pub const MAX_INDEX: usize = 1 << 20;

/// A single segment in a path.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seg {
    /// Map key access: `{"key": value}`
    Key(String),
    /// List index access: `[index]`
    Index(usize),
}

impl Seg {
    /// Create a key segment.
    #[inline]
    pub fn key(k: impl Into<String>) -> Self {
        Seg::Key(k.into())
    }

    /// Create an index segment.
    #[inline]
    pub fn index(i: usize) -> Self {
        Seg::Index(i)
    }

    /// Classify a dot-path token: all-digit tokens address list slots.
    fn from_token(input: &str, token: String) -> StateResult<Self> {
        if token.bytes().all(|b| b.is_ascii_digit()) {
            return parse_index(input, &token).map(Seg::Index);
        }
        Ok(Seg::Key(token))
    }

    /// Get the index if this is an index segment.
    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Seg::Key(_) => None,
            Seg::Index(i) => Some(*i),
        }
    }
}

fn parse_index(input: &str, digits: &str) -> StateResult<usize> {
    match digits.parse::<usize>() {
        Ok(i) if i <= MAX_INDEX => Ok(i),
        _ => Err(StateError::index_too_large(input, digits)),
    }
}

impl fmt::Display for Seg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Seg::Key(k) => write!(f, ".{}", k),
            Seg::Index(i) => write!(f, "[{}]", i),
        }
    }
}

impl From<String> for Seg {
    fn from(s: String) -> Self {
        Seg::Key(s)
    }
}

impl From<&str> for Seg {
    fn from(s: &str) -> Self {
        Seg::Key(s.to_owned())
    }
}

impl From<usize> for Seg {
    fn from(i: usize) -> Self {
        Seg::Index(i)
    }
}

/// A complete path into a tree.
///
/// # Examples
///
/// ```
/// use tirea_form_state::{Path, Seg};
///
/// let path = Path::parse("users[0].name").unwrap();
/// assert_eq!(path, Path::root().key("users").index(0).key("name"));
/// assert_eq!(path.to_dotted(), "users.0.name");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Path(Vec<Seg>);

impl Path {
    /// Create an empty path (root).
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Create an empty path (alias for `new`).
    #[inline]
    pub fn root() -> Self {
        Self::new()
    }

    /// Create a path from a vector of segments.
    #[inline]
    pub fn from_segments(segments: Vec<Seg>) -> Self {
        Self(segments)
    }

    /// Parse a dot path, accepting bracket indices.
    ///
    /// The empty string is the root path. Empty segments, a trailing dot,
    /// and bracket contents that are not a plain decimal index are rejected.
    pub fn parse(input: &str) -> StateResult<Path> {
        let mut path = Path::root();
        let mut token = String::new();
        let mut after_bracket = false;
        let mut chars = input.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if after_bracket {
                        after_bracket = false;
                    } else if token.is_empty() {
                        return Err(StateError::malformed_path(input, "empty segment"));
                    } else {
                        path.push(Seg::from_token(input, std::mem::take(&mut token))?);
                    }
                    match chars.peek() {
                        None => return Err(StateError::malformed_path(input, "trailing dot")),
                        Some('.') | Some('[') => {
                            return Err(StateError::malformed_path(input, "empty segment"))
                        }
                        Some(_) => {}
                    }
                }
                '[' => {
                    if !token.is_empty() {
                        path.push(Seg::from_token(input, std::mem::take(&mut token))?);
                    }
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(']') => break,
                            Some(d) if d.is_ascii_digit() => digits.push(d),
                            Some(_) => {
                                return Err(StateError::malformed_path(
                                    input,
                                    "bracket index must be a non-negative integer",
                                ))
                            }
                            None => {
                                return Err(StateError::malformed_path(
                                    input,
                                    "unterminated bracket",
                                ))
                            }
                        }
                    }
                    if digits.is_empty() {
                        return Err(StateError::malformed_path(input, "empty bracket index"));
                    }
                    path.push(Seg::Index(parse_index(input, &digits)?));
                    after_bracket = true;
                }
                ']' => return Err(StateError::malformed_path(input, "unmatched ']'")),
                _ => {
                    if after_bracket {
                        return Err(StateError::malformed_path(
                            input,
                            "expected '.' or '[' after ']'",
                        ));
                    }
                    token.push(c);
                }
            }
        }

        if !token.is_empty() {
            path.push(Seg::from_token(input, token)?);
        }
        Ok(path)
    }

    /// Append a key segment and return self (builder pattern).
    #[inline]
    pub fn key(mut self, k: impl Into<String>) -> Self {
        self.0.push(Seg::Key(k.into()));
        self
    }

    /// Append an index segment and return self (builder pattern).
    #[inline]
    pub fn index(mut self, i: usize) -> Self {
        self.0.push(Seg::Index(i));
        self
    }

    /// Push a segment onto the path (mutating).
    #[inline]
    pub fn push(&mut self, seg: Seg) {
        self.0.push(seg);
    }

    /// Pop the last segment from the path.
    #[inline]
    pub fn pop(&mut self) -> Option<Seg> {
        self.0.pop()
    }

    /// Get the segments of this path.
    #[inline]
    pub fn segments(&self) -> &[Seg] {
        &self.0
    }

    /// Check if this path is empty (root).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the number of segments in this path.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Get the last segment.
    #[inline]
    pub fn last(&self) -> Option<&Seg> {
        self.0.last()
    }

    /// Join this path with another path.
    #[inline]
    pub fn join(&self, other: &Path) -> Path {
        let mut result = self.clone();
        result.0.extend(other.0.iter().cloned());
        result
    }

    /// Append a segment and return a new path (non-mutating builder).
    #[inline]
    pub fn with_segment(&self, seg: Seg) -> Path {
        let mut result = self.clone();
        result.0.push(seg);
        result
    }

    /// Check if this path is a prefix of another path.
    ///
    /// A path is a prefix of itself.
    #[inline]
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Get the parent path (path without the last segment).
    #[inline]
    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            let mut p = self.clone();
            p.pop();
            Some(p)
        }
    }

    /// Index segment directly below `prefix`, if `prefix` is a prefix of
    /// this path and the next segment is an index.
    ///
    /// `items.3.name` relative to `items` yields `Some(3)`.
    pub fn index_below(&self, prefix: &Path) -> Option<usize> {
        if !prefix.is_prefix_of(self) {
            return None;
        }
        self.0.get(prefix.len()).and_then(Seg::as_index)
    }

    /// Render as a canonical dot path (`items.0.name`); root renders empty.
    pub fn to_dotted(&self) -> String {
        let mut out = String::new();
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            match seg {
                Seg::Key(k) => out.push_str(k),
                Seg::Index(idx) => out.push_str(&idx.to_string()),
            }
        }
        out
    }

    /// Iterate over the segments.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Seg> {
        self.0.iter()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for seg in &self.0 {
            write!(f, "{}", seg)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<&str> for Path {
    type Error = StateError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Path::parse(s)
    }
}

impl FromIterator<Seg> for Path {
    fn from_iter<I: IntoIterator<Item = Seg>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Seg;
    type IntoIter = std::slice::Iter<'a, Seg>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::ops::Index<usize> for Path {
    type Output = Seg;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

/// Construct a `Path` from a sequence of segments.
///
/// # Examples
///
/// ```
/// use tirea_form_state::path;
///
/// // String literals become Key segments
/// let p = path!("users", "alice", "email");
///
/// // Numbers become Index segments
/// let p = path!("items", 0, "name");
/// ```
#[macro_export]
macro_rules! path {
    () => {
        $crate::Path::root()
    };
    ($($seg:expr),+ $(,)?) => {{
        let mut p = $crate::Path::root();
        $(
            p.push($crate::path!(@seg $seg));
        )+
        p
    }};
    (@seg $seg:expr) => {
        $crate::Seg::from($seg)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_construction() {
        let path = Path::root().key("users").index(0).key("name");
        assert_eq!(path.len(), 3);
        assert_eq!(path[0], Seg::Key("users".into()));
        assert_eq!(path[1], Seg::Index(0));
        assert_eq!(path[2], Seg::Key("name".into()));
    }

    #[test]
    fn test_path_display() {
        let path = Path::root().key("users").index(0).key("name");
        assert_eq!(format!("{}", path), "$.users[0].name");
        assert_eq!(path.to_dotted(), "users.0.name");
    }

    #[test]
    fn test_parse_dot_form() {
        let p = Path::parse("user.items.2.name").unwrap();
        assert_eq!(p, path!("user", "items", 2usize, "name"));
    }

    #[test]
    fn test_parse_bracket_form() {
        assert_eq!(Path::parse("a[0].c").unwrap(), path!("a", 0usize, "c"));
        assert_eq!(Path::parse("a[0][1]").unwrap(), path!("a", 0usize, 1usize));
        assert_eq!(Path::parse("[3]").unwrap(), path!(3usize));
        assert_eq!(Path::parse("a.b[10]").unwrap(), path!("a", "b", 10usize));
    }

    #[test]
    fn test_parse_empty_is_root() {
        assert!(Path::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_mixed_alnum_is_key() {
        let p = Path::parse("items.2a").unwrap();
        assert_eq!(p[1], Seg::Key("2a".into()));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "a..b", ".a", "a.", "a[", "a[x]", "a[-1]", "a]", "a[0]b", "a.[0]", "a[]", "a[0].",
        ] {
            assert!(
                matches!(Path::parse(bad), Err(StateError::MalformedPath { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_huge_indices() {
        for bad in [
            "items.18446744073709551615",
            "items.99999999999999999999999",
            "items[1000000000000]",
            "a.1048577.b",
        ] {
            assert!(
                matches!(Path::parse(bad), Err(StateError::IndexTooLarge { .. })),
                "expected {bad:?} to be rejected"
            );
        }
        assert_eq!(
            Path::parse("items.1048576").unwrap(),
            path!("items", MAX_INDEX)
        );
    }

    #[test]
    fn test_from_str() {
        let p: Path = "a.b".parse().unwrap();
        assert_eq!(p, path!("a", "b"));
    }

    #[test]
    fn test_path_macro() {
        let p = path!("users", 0usize, "name");
        assert_eq!(p.len(), 3);
        assert_eq!(p[1], Seg::Index(0));
    }

    #[test]
    fn test_index_below() {
        let base = path!("items");
        assert_eq!(path!("items", 3usize, "name").index_below(&base), Some(3));
        assert_eq!(path!("items").index_below(&base), None);
        assert_eq!(path!("other", 3usize).index_below(&base), None);
    }

    #[test]
    fn test_path_parent_and_prefix() {
        let path = path!("a", "b");
        assert_eq!(path.parent().unwrap(), path!("a"));
        assert!(path!("a").is_prefix_of(&path));
        assert!(path.is_prefix_of(&path));
        assert!(!path.is_prefix_of(&path!("a")));
    }

    #[test]
    fn test_path_serde() {
        let path = Path::root().key("users").index(0);
        let json = serde_json::to_string(&path).unwrap();
        let parsed: Path = serde_json::from_str(&json).unwrap();
        assert_eq!(path, parsed);
    }
}
