//! Per-field validation rules.
//!
//! A [`FieldRules`] value bundles the built-in checks (each with its own
//! message), an optional synchronous predicate and an optional asynchronous
//! rule. Rules are registered against a path on the engine and are metadata
//! about validation, never part of the values tree.

use async_trait::async_trait;
use regex::Regex;
use std::fmt;
use std::future::Future;
use std::ops::Index;
use std::sync::Arc;
use std::time::Duration;
use tirea_form_state::{Path, Tree};

/// Whole-tree accessor handed to custom rules.
///
/// Lookups accept either a top-level key or a full dot path, so
/// `values["user.email"]` reads the nested email field. Missing entries
/// read as `Null`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormValues(Tree);

impl FormValues {
    /// Wrap a values tree.
    #[inline]
    pub fn new(tree: Tree) -> Self {
        Self(tree)
    }

    /// Look up `key` as a literal top-level key first, then as a path.
    pub fn get(&self, key: &str) -> Option<&Tree> {
        if let Some(hit) = self.0.as_map().and_then(|m| m.get(key)) {
            return Some(hit);
        }
        Path::parse(key).ok().and_then(|p| self.0.get(&p))
    }

    /// Look up a parsed path.
    #[inline]
    pub fn get_path(&self, path: &Path) -> Option<&Tree> {
        self.0.get(path)
    }

    /// The underlying tree.
    #[inline]
    pub fn tree(&self) -> &Tree {
        &self.0
    }

    /// Unwrap into the underlying tree.
    #[inline]
    pub fn into_tree(self) -> Tree {
        self.0
    }
}

impl Index<&str> for FormValues {
    type Output = Tree;

    fn index(&self, key: &str) -> &Tree {
        self.get(key).unwrap_or_else(|| Tree::null_ref())
    }
}

/// Synchronous custom rule: `(value, whole tree) -> error message`.
///
/// Must be pure; it runs while the engine holds its state lock.
pub type SyncRule = Arc<dyn Fn(&Tree, &FormValues) -> Option<String> + Send + Sync>;

/// Asynchronous custom rule.
///
/// The engine may invoke a rule again before an earlier call resolves; stale
/// results are discarded, never cancelled.
#[async_trait]
pub trait AsyncRule: Send + Sync {
    /// Check `value`, with the whole tree available for cross-field rules.
    async fn validate(&self, value: Tree, values: FormValues) -> Option<String>;
}

#[async_trait]
impl<F, Fut> AsyncRule for F
where
    F: Fn(Tree, FormValues) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Option<String>> + Send + 'static,
{
    async fn validate(&self, value: Tree, values: FormValues) -> Option<String> {
        (self)(value, values).await
    }
}

/// A rule parameter paired with the message reported when it fails.
#[derive(Clone, Debug, PartialEq)]
pub struct Check<T> {
    pub value: T,
    pub message: String,
}

impl<T> Check<T> {
    fn new(value: T, message: impl Into<String>) -> Self {
        Self {
            value,
            message: message.into(),
        }
    }
}

/// Validation rules for one path.
///
/// # Example
///
/// ```
/// use regex::Regex;
/// use tirea_form::FieldRules;
///
/// let rules = FieldRules::new()
///     .required("Email is required")
///     .pattern(Regex::new(r"^[^@]+@[^@]+$").unwrap(), "Not an email")
///     .max_length(120, "Too long");
/// assert!(!rules.has_async());
/// ```
#[derive(Clone, Default)]
pub struct FieldRules {
    pub required: Option<String>,
    pub pattern: Option<Check<Regex>>,
    pub min_length: Option<Check<usize>>,
    pub max_length: Option<Check<usize>>,
    pub min: Option<Check<f64>>,
    pub max: Option<Check<f64>>,
    pub validate: Option<SyncRule>,
    pub validate_async: Option<Arc<dyn AsyncRule>>,
    /// Overrides the engine's default debounce for the async rule.
    pub debounce: Option<Duration>,
    /// Paths re-validated whenever this field changes.
    pub deps: Vec<String>,
}

impl FieldRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn pattern(mut self, pattern: Regex, message: impl Into<String>) -> Self {
        self.pattern = Some(Check::new(pattern, message));
        self
    }

    pub fn min_length(mut self, len: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(Check::new(len, message));
        self
    }

    pub fn max_length(mut self, len: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(Check::new(len, message));
        self
    }

    pub fn min(mut self, min: f64, message: impl Into<String>) -> Self {
        self.min = Some(Check::new(min, message));
        self
    }

    pub fn max(mut self, max: f64, message: impl Into<String>) -> Self {
        self.max = Some(Check::new(max, message));
        self
    }

    /// Attach a synchronous custom predicate.
    pub fn validate<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Tree, &FormValues) -> Option<String> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(rule));
        self
    }

    /// Attach an asynchronous rule.
    pub fn validate_async(mut self, rule: impl AsyncRule + 'static) -> Self {
        self.validate_async = Some(Arc::new(rule));
        self
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    /// Re-validate `paths` whenever this field changes.
    pub fn deps<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deps = paths.into_iter().map(Into::into).collect();
        self
    }

    /// True if an asynchronous rule is attached.
    #[inline]
    pub fn has_async(&self) -> bool {
        self.validate_async.is_some()
    }
}

impl fmt::Debug for FieldRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRules")
            .field("required", &self.required)
            .field("pattern", &self.pattern.as_ref().map(|c| c.value.as_str()))
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("validate", &self.validate.is_some())
            .field("validate_async", &self.validate_async.is_some())
            .field("debounce", &self.debounce)
            .field("deps", &self.deps)
            .finish()
    }
}
