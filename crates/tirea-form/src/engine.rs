//! The form engine: values, metadata, rules and the async validation glue.
//!
//! All state sits behind one mutex that is never held across an `.await`.
//! Async rules run on tokio tasks that hold only a weak reference to the
//! engine; each resolution re-acquires the lock and consults the scheduler
//! before writing anything.

use crate::error::{FormError, FormResult};
use crate::evaluator::{evaluate_sync, is_orphaned};
use crate::options::{FormOptions, ResetOptions};
use crate::rules::{AsyncRule, FieldRules, FormValues};
use crate::scheduler::AsyncScheduler;
use futures::future::join_all;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tirea_form_state::{apply_array_op, dirty_tree, ArrayOp, MetaKind, MetaTrees, Path, Tree};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Per-path metadata view for rendering one field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FieldState {
    pub is_touched: bool,
    pub is_dirty: bool,
    pub is_validating: bool,
    pub error: Option<String>,
    /// Touched, or the form has been submitted at least once.
    pub show_error: bool,
}

/// Point-in-time copy of everything the engine tracks.
#[derive(Clone, Debug, Serialize)]
pub struct FormSnapshot {
    pub values: Tree,
    pub errors: Tree,
    pub touched: Tree,
    pub dirty: Tree,
    pub validating: Tree,
    pub submit_count: u32,
    pub is_submitting: bool,
    pub is_submit_successful: bool,
    pub is_valid: bool,
    pub is_validating: bool,
    pub is_dirty: bool,
}

/// Result of [`FormEngine::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitOutcome {
    Valid,
    Invalid,
}

impl SubmitOutcome {
    pub fn is_valid(self) -> bool {
        self == SubmitOutcome::Valid
    }
}

struct FormState {
    initial: Tree,
    values: Tree,
    meta: MetaTrees,
    rules: BTreeMap<Path, Arc<FieldRules>>,
    deps: BTreeMap<Path, Vec<Path>>,
    scheduler: AsyncScheduler,
    submit_count: u32,
    is_submitting: bool,
    is_submit_successful: bool,
}

impl FormState {
    fn new(initial: Tree) -> Self {
        Self {
            values: initial.clone(),
            initial,
            meta: MetaTrees::new(),
            rules: BTreeMap::new(),
            deps: BTreeMap::new(),
            scheduler: AsyncScheduler::new(),
            submit_count: 0,
            is_submitting: false,
            is_submit_successful: false,
        }
    }

    fn value_at(&self, path: &Path) -> Tree {
        self.values.get(path).cloned().unwrap_or_default()
    }

    /// Recompute dirty flags for the branch at `path`.
    ///
    /// Work starts at the outermost list above `path`, since a shrunk list
    /// carries its dirty flag on the list itself.
    fn refresh_dirty(&mut self, path: &Path) {
        let anchor = match path.iter().position(|seg| seg.as_index().is_some()) {
            Some(i) => Path::from_segments(path.segments()[..i].to_vec()),
            None => path.clone(),
        };
        let branch = dirty_tree(
            self.values.get(&anchor).unwrap_or_else(|| Tree::null_ref()),
            self.initial.get(&anchor),
        );
        self.meta.replace_branch(MetaKind::Dirty, &anchor, branch);
    }

    /// After a write at `path`, drop metadata and async work addressed to
    /// list slots that no longer exist.
    fn prune_orphans(&mut self, path: &Path) {
        let values = self.values.clone();
        let stale = self
            .scheduler
            .invalidate_matching(|p| path.is_prefix_of(p) && is_orphaned(p, &values));
        if !stale.is_empty() {
            tracing::debug!(path = %path, invalidated = stale.len(), "orphaned async work dropped");
        }
        self.meta.trim_to(path, &values);
    }

    /// Drop pending async work for `path` and its validating flag.
    fn abandon(&mut self, path: &Path) {
        self.scheduler.invalidate(path);
        self.meta.clear(MetaKind::Validating, path);
    }

    /// Registered fields a change at `path` should re-validate: those at,
    /// above or below it, plus their declared dependents.
    fn fields_affected_by(&self, path: &Path) -> Vec<Path> {
        let mut out = BTreeSet::new();
        for registered in self.rules.keys() {
            if registered.is_prefix_of(path) || path.is_prefix_of(registered) {
                out.insert(registered.clone());
                if let Some(deps) = self.deps.get(registered) {
                    out.extend(deps.iter().filter(|d| self.rules.contains_key(*d)).cloned());
                }
            }
        }
        out.into_iter().collect()
    }

    fn live_fields(&self) -> Vec<Path> {
        self.rules
            .keys()
            .filter(|p| !is_orphaned(p, &self.values))
            .cloned()
            .collect()
    }
}

struct Inner {
    state: Mutex<FormState>,
    options: FormOptions,
    alive: AtomicBool,
    revision: watch::Sender<u64>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.state
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .scheduler
            .clear();
    }
}

/// One async rule invocation, captured under the lock and run without it.
struct Job {
    path: Path,
    seq: u64,
    rule: Arc<dyn AsyncRule>,
    value: Tree,
    values: FormValues,
}

struct JobResult {
    path: Path,
    error: Option<String>,
    applied: bool,
}

impl Job {
    async fn run(self, engine: Weak<Inner>) -> JobResult {
        tracing::debug!(path = %self.path, seq = self.seq, "async validation running");
        let error = self.rule.validate(self.value, self.values).await;
        let applied = resolve(&engine, &self.path, self.seq, error.clone());
        JobResult {
            path: self.path,
            error,
            applied,
        }
    }
}

/// Write an async result if `seq` is still the latest attempt for `path`.
fn resolve(engine: &Weak<Inner>, path: &Path, seq: u64, error: Option<String>) -> bool {
    let Some(inner) = engine.upgrade() else {
        tracing::trace!(path = %path, seq, "engine dropped, async result discarded");
        return false;
    };
    if !inner.is_alive() {
        tracing::trace!(path = %path, seq, "engine torn down, async result discarded");
        return false;
    }
    {
        let mut state = inner.lock();
        if !state.scheduler.settle(path, seq) {
            tracing::trace!(path = %path, seq, "stale async result discarded");
            return false;
        }
        state.meta.put_error(path, error);
        state.meta.clear(MetaKind::Validating, path);
    }
    tracing::debug!(path = %path, seq, "async validation applied");
    inner.notify();
    true
}

/// Body of a debounce timer task, after its delay.
async fn fire(engine: Weak<Inner>, path: Path, seq: u64) {
    let job = {
        let Some(inner) = engine.upgrade() else {
            return;
        };
        if !inner.is_alive() {
            return;
        }
        let job = {
            let mut state = inner.lock();
            if !state.scheduler.fire(&path, seq) {
                tracing::trace!(path = %path, seq, "superseded timer fired, ignored");
                return;
            }
            let Some(rules) = state.rules.get(&path).cloned() else {
                state.abandon(&path);
                return;
            };
            let values = FormValues::new(state.values.clone());
            if let Some(message) = evaluate_sync(&path, &values, &rules) {
                // the value changed under the timer; sync wins
                state.abandon(&path);
                state.meta.set_error(&path, message);
                None
            } else {
                rules.validate_async.clone().map(|rule| {
                    let run_seq = state.scheduler.mint(&path);
                    state.meta.set_flag(MetaKind::Validating, &path, true);
                    Job {
                        path: path.clone(),
                        seq: run_seq,
                        rule,
                        value: state.value_at(&path),
                        values,
                    }
                })
            }
        };
        inner.notify();
        job
    };
    if let Some(job) = job {
        job.run(engine).await;
    }
}

/// Run bypass jobs to completion, concurrently.
///
/// Jobs go onto their own tasks when a tokio runtime is available so that
/// dropping the caller's future does not strand a validating flag.
async fn run_jobs(engine: &Weak<Inner>, jobs: Vec<Job>) -> Vec<JobResult> {
    if jobs.is_empty() {
        return Vec::new();
    }
    match Handle::try_current() {
        Ok(handle) => {
            let tasks = jobs
                .into_iter()
                .map(|job| handle.spawn(job.run(engine.clone())));
            let mut out = Vec::new();
            for joined in join_all(tasks).await {
                match joined {
                    Ok(result) => out.push(result),
                    Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                    Err(err) => tracing::warn!(error = %err, "async validation task cancelled"),
                }
            }
            out
        }
        Err(_) => join_all(jobs.into_iter().map(|job| job.run(engine.clone()))).await,
    }
}

/// Reactive form state engine.
///
/// Cloning yields another handle to the same form. Dropping the last handle
/// (or calling [`teardown`](Self::teardown)) aborts pending debounce timers;
/// async results that resolve afterwards are discarded.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use tirea_form::{FieldRules, FormEngine, Tree};
///
/// let form = FormEngine::new(Tree::from(json!({"user": {"name": ""}})));
/// form.register("user.name", FieldRules::new().required("Name is required")).unwrap();
///
/// form.set_value("user.name", "   ").unwrap();
/// assert_eq!(form.error("user.name").unwrap().as_deref(), Some("Name is required"));
///
/// form.set_value("user.name", "Ada").unwrap();
/// assert!(form.is_valid());
/// assert!(form.is_dirty());
/// ```
#[derive(Clone)]
pub struct FormEngine {
    inner: Arc<Inner>,
}

impl FormEngine {
    /// Create an engine with default options.
    pub fn new(initial: impl Into<Tree>) -> Self {
        Self::with_options(initial, FormOptions::default())
    }

    pub fn with_options(initial: impl Into<Tree>, options: FormOptions) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(FormState::new(initial.into())),
                options,
                alive: AtomicBool::new(true),
                revision,
            }),
        }
    }

    pub fn options(&self) -> &FormOptions {
        &self.inner.options
    }

    /// Receiver whose value increments after every state change, including
    /// async results landing.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, FormState> {
        self.inner.lock()
    }

    fn notify(&self) {
        self.inner.notify();
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Register rules for `path`, replacing any earlier registration.
    ///
    /// Work started under the old rules is invalidated.
    pub fn register(&self, path: &str, rules: FieldRules) -> FormResult<()> {
        let path = Path::parse(path)?;
        let deps = rules
            .deps
            .iter()
            .map(|dep| {
                Path::parse(dep).map_err(|source| FormError::InvalidDependency {
                    path: path.to_dotted(),
                    dep: dep.clone(),
                    source,
                })
            })
            .collect::<FormResult<Vec<_>>>()?;
        {
            let mut state = self.lock();
            if state.rules.insert(path.clone(), Arc::new(rules)).is_some() {
                state.abandon(&path);
            }
            if deps.is_empty() {
                state.deps.remove(&path);
            } else {
                state.deps.insert(path.clone(), deps);
            }
        }
        tracing::debug!(path = %path, "field registered");
        self.notify();
        Ok(())
    }

    /// Drop the rules for `path` together with its error and pending async
    /// work. Returns whether anything was registered.
    pub fn unregister(&self, path: &str) -> FormResult<bool> {
        let path = Path::parse(path)?;
        let existed = {
            let mut state = self.lock();
            let existed = state.rules.remove(&path).is_some();
            state.deps.remove(&path);
            if existed {
                state.abandon(&path);
                state.meta.clear_error(&path);
            }
            existed
        };
        if existed {
            self.notify();
        }
        Ok(existed)
    }

    // ---------------------------------------------------------------------
    // Values
    // ---------------------------------------------------------------------

    /// Store `value` at `path`, refresh dirty flags and run live validation
    /// for the affected fields.
    pub fn set_value(&self, path: &str, value: impl Into<Tree>) -> FormResult<()> {
        let path = Path::parse(path)?;
        {
            let mut state = self.lock();
            state.values = state.values.set(&path, value.into());
            state.prune_orphans(&path);
            state.refresh_dirty(&path);
            self.validate_on_change(&mut state, std::slice::from_ref(&path));
        }
        self.notify();
        Ok(())
    }

    /// Store several values as one change. Every path is parsed before
    /// anything is written.
    pub fn set_values<I, K, V>(&self, entries: I) -> FormResult<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Tree>,
    {
        let entries = entries
            .into_iter()
            .map(|(k, v)| Ok((Path::parse(k.as_ref())?, v.into())))
            .collect::<FormResult<Vec<_>>>()?;
        {
            let mut state = self.lock();
            for (path, value) in &entries {
                state.values = state.values.set(path, value.clone());
                state.prune_orphans(path);
                state.refresh_dirty(path);
            }
            let paths: Vec<Path> = entries.into_iter().map(|(p, _)| p).collect();
            self.validate_on_change(&mut state, &paths);
        }
        self.notify();
        Ok(())
    }

    fn validate_on_change(&self, state: &mut FormState, changed: &[Path]) {
        let submitted = state.submit_count > 0;
        let mut targets = BTreeSet::new();
        for path in changed {
            targets.extend(state.fields_affected_by(path));
        }
        for target in targets {
            let touched = state.meta.flag(MetaKind::Touched, &target);
            if self.inner.options.validates_on_change(submitted, touched) {
                if let Some(job) = self.validate_field(state, &target, false) {
                    self.spawn_detached(state, job);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Validation core
    // ---------------------------------------------------------------------

    /// Validate one registered field.
    ///
    /// Sync failures are written immediately and supersede pending async
    /// work. When the field passes sync and owns an async rule, a debounced
    /// live validation arms a timer and returns `None`; an undebounced or
    /// bypassing one returns the job to run.
    fn validate_field(&self, state: &mut FormState, path: &Path, bypass: bool) -> Option<Job> {
        let rules = state.rules.get(path).cloned()?;
        if is_orphaned(path, &state.values) {
            state.abandon(path);
            state.meta.clear_error(path);
            state.meta.clear(MetaKind::Touched, path);
            return None;
        }
        let values = FormValues::new(state.values.clone());
        if let Some(message) = evaluate_sync(path, &values, &rules) {
            state.abandon(path);
            state.meta.set_error(path, message);
            return None;
        }
        state.meta.clear_error(path);
        let Some(rule) = rules.validate_async.clone() else {
            state.abandon(path);
            return None;
        };
        if !self.inner.is_alive() {
            tracing::warn!(path = %path, "async validation requested after teardown");
            state.abandon(path);
            return None;
        }

        let window = if bypass {
            Duration::ZERO
        } else {
            rules
                .debounce
                .unwrap_or_else(|| self.inner.options.default_debounce())
        };
        if window.is_zero() {
            state.scheduler.cancel_timer(path);
            let seq = state.scheduler.mint(path);
            state.meta.set_flag(MetaKind::Validating, path, true);
            return Some(Job {
                path: path.clone(),
                seq,
                rule,
                value: state.value_at(path),
                values,
            });
        }

        let Ok(handle) = Handle::try_current() else {
            tracing::warn!(path = %path, "no tokio runtime, async validation skipped");
            state.abandon(path);
            return None;
        };
        let seq = state.scheduler.mint(path);
        state.meta.set_flag(MetaKind::Validating, path, true);
        let engine = Arc::downgrade(&self.inner);
        let timer_path = path.clone();
        let timer = handle.spawn(async move {
            tokio::time::sleep(window).await;
            fire(engine, timer_path, seq).await;
        });
        state.scheduler.arm(path, timer.abort_handle());
        tracing::debug!(
            path = %path,
            seq,
            debounce_ms = window.as_millis() as u64,
            "async validation scheduled"
        );
        None
    }

    /// Run a live job on its own task; its result lands through the
    /// scheduler like any other.
    fn spawn_detached(&self, state: &mut FormState, job: Job) {
        match Handle::try_current() {
            Ok(handle) => {
                let engine = Arc::downgrade(&self.inner);
                handle.spawn(job.run(engine));
            }
            Err(_) => {
                tracing::warn!(path = %job.path, "no tokio runtime, async validation skipped");
                state.abandon(&job.path);
            }
        }
    }

    /// Touch `path` and, if the validation mode asks for it, validate it
    /// without debounce.
    pub async fn blur(&self, path: &str) -> FormResult<()> {
        let path = Path::parse(path)?;
        let jobs = {
            let mut state = self.lock();
            if !self.inner.is_alive() {
                return Err(FormError::TornDown);
            }
            state.meta.set_flag(MetaKind::Touched, &path, true);
            let submitted = state.submit_count > 0;
            if self.inner.options.validates_on_blur(submitted) {
                let targets: Vec<Path> = state
                    .rules
                    .keys()
                    .filter(|p| path.is_prefix_of(p))
                    .cloned()
                    .collect();
                targets
                    .iter()
                    .filter_map(|t| self.validate_field(&mut state, t, true))
                    .collect()
            } else {
                Vec::new()
            }
        };
        self.notify();
        run_jobs(&Arc::downgrade(&self.inner), jobs).await;
        Ok(())
    }

    /// Validate every registered field at or below `path` now, bypassing
    /// debounce and ignoring the validation mode. An empty path validates
    /// the whole form. Returns whether those fields ended up error-free.
    pub async fn trigger(&self, path: &str) -> FormResult<bool> {
        let path = Path::parse(path)?;
        let (targets, jobs) = {
            let mut state = self.lock();
            if !self.inner.is_alive() {
                return Err(FormError::TornDown);
            }
            let targets: Vec<Path> = state
                .live_fields()
                .into_iter()
                .filter(|p| path.is_prefix_of(p))
                .collect();
            let jobs: Vec<Job> = targets
                .iter()
                .filter_map(|t| self.validate_field(&mut state, t, true))
                .collect();
            (targets, jobs)
        };
        self.notify();
        run_jobs(&Arc::downgrade(&self.inner), jobs).await;
        let state = self.lock();
        Ok(targets.iter().all(|t| state.meta.error(t).is_none()))
    }

    // ---------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------

    /// Attach a manual error. Pending async work for the path is untouched.
    pub fn set_error(&self, path: &str, message: impl Into<String>) -> FormResult<()> {
        let path = Path::parse(path)?;
        self.lock().meta.set_error(&path, message);
        self.notify();
        Ok(())
    }

    pub fn clear_error(&self, path: &str) -> FormResult<()> {
        let path = Path::parse(path)?;
        self.lock().meta.clear_error(&path);
        self.notify();
        Ok(())
    }

    pub fn clear_errors(&self) {
        self.lock().meta.errors = Tree::Null;
        self.notify();
    }

    pub fn set_touched(&self, path: &str, touched: bool) -> FormResult<()> {
        let path = Path::parse(path)?;
        self.lock().meta.set_flag(MetaKind::Touched, &path, touched);
        self.notify();
        Ok(())
    }

    /// Mark every registered field touched.
    pub fn touch_all(&self) {
        {
            let mut state = self.lock();
            for path in state.live_fields() {
                state.meta.set_flag(MetaKind::Touched, &path, true);
            }
        }
        self.notify();
    }

    // ---------------------------------------------------------------------
    // Reset
    // ---------------------------------------------------------------------

    /// Restore the initial values and clear metadata not kept by `opts`.
    pub fn reset(&self, opts: ResetOptions) {
        {
            let mut state = self.lock();
            state.values = state.initial.clone();
            reset_meta(&mut state, opts);
            state.prune_orphans(&Path::root());
        }
        tracing::debug!("form reset");
        self.notify();
    }

    /// Replace the restoration target, then [`reset`](Self::reset).
    pub fn reset_to(&self, initial: impl Into<Tree>, opts: ResetOptions) {
        {
            let mut state = self.lock();
            state.initial = initial.into();
            state.values = state.initial.clone();
            reset_meta(&mut state, opts);
            state.prune_orphans(&Path::root());
        }
        tracing::debug!("form reset to new initial values");
        self.notify();
    }

    /// Restore one field's initial value and clear its metadata.
    ///
    /// Metadata list slots are nulled, never spliced, so sibling indices
    /// stay aligned.
    pub fn reset_field(&self, path: &str, opts: ResetOptions) -> FormResult<()> {
        let path = Path::parse(path)?;
        {
            let mut state = self.lock();
            state.values = match state.initial.get(&path).cloned() {
                Some(initial) => state.values.set(&path, initial),
                None => state.values.unset(&path),
            };
            if !opts.keep_errors {
                state.meta.clear(MetaKind::Errors, &path);
            }
            if !opts.keep_touched {
                state.meta.clear(MetaKind::Touched, &path);
            }
            if !opts.keep_dirty {
                state.meta.clear(MetaKind::Dirty, &path);
            }
            if !opts.keep_validating {
                state.scheduler.invalidate_matching(|p| path.is_prefix_of(p));
                state.meta.clear(MetaKind::Validating, &path);
            }
            state.prune_orphans(&path);
        }
        self.notify();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Structural edits
    // ---------------------------------------------------------------------

    pub fn append(&self, path: &str, value: impl Into<Tree>) -> FormResult<()> {
        self.edit_array(path, ArrayOp::append(value))
    }

    pub fn insert(&self, path: &str, index: usize, value: impl Into<Tree>) -> FormResult<()> {
        self.edit_array(path, ArrayOp::insert(index, value))
    }

    pub fn remove(&self, path: &str, index: usize) -> FormResult<()> {
        self.edit_array(path, ArrayOp::remove(index))
    }

    pub fn replace(&self, path: &str, index: usize, value: impl Into<Tree>) -> FormResult<()> {
        self.edit_array(path, ArrayOp::replace(index, value))
    }

    pub fn move_item(&self, path: &str, from: usize, to: usize) -> FormResult<()> {
        self.edit_array(path, ArrayOp::move_item(from, to))
    }

    pub fn swap(&self, path: &str, a: usize, b: usize) -> FormResult<()> {
        self.edit_array(path, ArrayOp::swap(a, b))
    }

    /// Apply a structural edit to the list at `path`.
    ///
    /// Out-of-range edits are silent no-ops that leave every tree and the
    /// sequence table untouched. Effective edits remap all metadata trees,
    /// invalidate async work under every shifted index, then refresh dirty
    /// flags and validation for the list itself.
    pub fn edit_array(&self, path: &str, op: ArrayOp) -> FormResult<()> {
        let path = Path::parse(path)?;
        {
            let mut state = self.lock();
            let edit = apply_array_op(&state.values, &path, &op)?;
            let Some(remap) = edit.remap else {
                return Ok(());
            };
            state.values = edit.tree;
            state.meta.remap(&path, &remap);

            let stale = state.scheduler.invalidate_matching(|p| {
                p.index_below(&path)
                    .is_some_and(|i| remap.is_old_affected(i))
            });
            for i in remap.affected_new() {
                state.meta.clear(MetaKind::Validating, &path.with_segment(i.into()));
            }
            tracing::debug!(
                path = %path,
                op = op.name(),
                invalidated = stale.len(),
                "structural edit applied"
            );

            state.refresh_dirty(&path);
            if state.rules.contains_key(&path) {
                let submitted = state.submit_count > 0;
                let touched = state.meta.flag(MetaKind::Touched, &path);
                if self.inner.options.validates_on_change(submitted, touched) {
                    if let Some(job) = self.validate_field(&mut state, &path, false) {
                        self.spawn_detached(&mut state, job);
                    }
                }
            }
        }
        self.notify();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Submit
    // ---------------------------------------------------------------------

    /// Validate every registered field, awaiting async rules without
    /// debounce, then call exactly one of the callbacks.
    ///
    /// `on_valid` receives the values, `on_invalid` the error tree. The
    /// decision reflects every async rule's answer for the values current at
    /// submit time, even if a later change superseded it in the stored
    /// errors.
    pub async fn submit<V, I>(&self, on_valid: V, on_invalid: I) -> FormResult<SubmitOutcome>
    where
        V: FnOnce(Tree),
        I: FnOnce(Tree),
    {
        let jobs = {
            let mut state = self.lock();
            if !self.inner.is_alive() {
                return Err(FormError::TornDown);
            }
            state.submit_count += 1;
            state.is_submitting = true;
            let fields = state.live_fields();
            fields
                .iter()
                .filter_map(|path| {
                    state.scheduler.cancel_timer(path);
                    self.validate_field(&mut state, path, true)
                })
                .collect::<Vec<_>>()
        };
        let mut submitting = SubmittingGuard {
            inner: &self.inner,
            armed: true,
        };
        tracing::debug!(async_jobs = jobs.len(), "form submit started");
        self.notify();

        let results = run_jobs(&Arc::downgrade(&self.inner), jobs).await;

        submitting.armed = false;
        let (outcome, payload) = {
            let mut state = self.lock();
            let mut decision = state.meta.errors.clone();
            for result in results.iter().filter(|r| !r.applied) {
                decision = match &result.error {
                    Some(message) => decision.set(&result.path, Tree::String(message.clone())),
                    None => decision.unset_pruned(&result.path),
                };
            }
            let valid = !decision.any_leaf(&|leaf| leaf.as_str().is_some());
            state.is_submitting = false;
            state.is_submit_successful = valid;
            if valid {
                (SubmitOutcome::Valid, state.values.clone())
            } else {
                (SubmitOutcome::Invalid, decision)
            }
        };
        tracing::debug!(outcome = ?outcome, "form submit finished");
        self.notify();

        match outcome {
            SubmitOutcome::Valid => on_valid(payload),
            SubmitOutcome::Invalid => on_invalid(payload),
        }
        Ok(outcome)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Abort pending timers and refuse further async results. Synchronous
    /// mutations keep working.
    pub fn teardown(&self) {
        if !self.inner.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let mut state = self.lock();
            state.scheduler.clear();
            state.meta.validating = Tree::Null;
        }
        tracing::debug!("form torn down");
        self.notify();
    }

    pub fn is_torn_down(&self) -> bool {
        !self.inner.is_alive()
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    pub fn values(&self) -> Tree {
        self.lock().values.clone()
    }

    pub fn errors(&self) -> Tree {
        self.lock().meta.errors.clone()
    }

    pub fn touched(&self) -> Tree {
        self.lock().meta.touched.clone()
    }

    pub fn dirty(&self) -> Tree {
        self.lock().meta.dirty.clone()
    }

    pub fn validating(&self) -> Tree {
        self.lock().meta.validating.clone()
    }

    /// The initial snapshot used by reset.
    pub fn initial(&self) -> Tree {
        self.lock().initial.clone()
    }

    pub fn value(&self, path: &str) -> FormResult<Option<Tree>> {
        let path = Path::parse(path)?;
        Ok(self.lock().values.get(&path).cloned())
    }

    pub fn error(&self, path: &str) -> FormResult<Option<String>> {
        let path = Path::parse(path)?;
        Ok(self.lock().meta.error(&path).map(str::to_owned))
    }

    pub fn field_state(&self, path: &str) -> FormResult<FieldState> {
        let path = Path::parse(path)?;
        let state = self.lock();
        let is_touched = state.meta.flag(MetaKind::Touched, &path);
        Ok(FieldState {
            is_touched,
            is_dirty: state.meta.flag(MetaKind::Dirty, &path),
            is_validating: state.meta.flag(MetaKind::Validating, &path),
            error: state.meta.error(&path).map(str::to_owned),
            show_error: is_touched || state.submit_count > 0,
        })
    }

    pub fn is_valid(&self) -> bool {
        !self.lock().meta.has_errors()
    }

    pub fn is_validating(&self) -> bool {
        self.lock().meta.any_flag(MetaKind::Validating)
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().meta.any_flag(MetaKind::Dirty)
    }

    pub fn submit_count(&self) -> u32 {
        self.lock().submit_count
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().is_submitting
    }

    pub fn is_submitted(&self) -> bool {
        self.lock().submit_count > 0
    }

    pub fn is_submit_successful(&self) -> bool {
        self.lock().is_submit_successful
    }

    /// Paths with async validation scheduled or running.
    pub fn pending_validations(&self) -> Vec<Path> {
        self.lock().scheduler.pending_paths()
    }

    pub fn snapshot(&self) -> FormSnapshot {
        let state = self.lock();
        FormSnapshot {
            values: state.values.clone(),
            errors: state.meta.errors.clone(),
            touched: state.meta.touched.clone(),
            dirty: state.meta.dirty.clone(),
            validating: state.meta.validating.clone(),
            submit_count: state.submit_count,
            is_submitting: state.is_submitting,
            is_submit_successful: state.is_submit_successful,
            is_valid: !state.meta.has_errors(),
            is_validating: state.meta.any_flag(MetaKind::Validating),
            is_dirty: state.meta.any_flag(MetaKind::Dirty),
        }
    }
}

/// Clears `is_submitting` if a submit future is dropped before it decides.
struct SubmittingGuard<'a> {
    inner: &'a Inner,
    armed: bool,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.inner.lock().is_submitting = false;
            tracing::debug!("form submit abandoned");
            self.inner.notify();
        }
    }
}

fn reset_meta(state: &mut FormState, opts: ResetOptions) {
    if !opts.keep_errors {
        state.meta.errors = Tree::Null;
    }
    if !opts.keep_touched {
        state.meta.touched = Tree::Null;
    }
    if !opts.keep_dirty {
        state.meta.dirty = Tree::Null;
    }
    if !opts.keep_validating {
        state.scheduler.clear();
        state.meta.validating = Tree::Null;
    }
    if !opts.keep_submit_count {
        state.submit_count = 0;
        state.is_submit_successful = false;
    }
}

impl std::fmt::Debug for FormEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FormEngine")
            .field("values", &state.values)
            .field("errors", &state.meta.errors)
            .field("rules", &state.rules.keys().collect::<Vec<_>>())
            .field("submit_count", &state.submit_count)
            .field("alive", &self.inner.is_alive())
            .finish()
    }
}
