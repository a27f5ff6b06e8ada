#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tirea_form::{AsyncRule, FormValues, Tree};
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Route engine logs to the test writer; filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Async rule whose calls park until the test resolves them by value.
#[derive(Clone, Default)]
pub struct GatedRule {
    pending: Arc<Mutex<Vec<(Tree, oneshot::Sender<Option<String>>)>>>,
    calls: Arc<AtomicUsize>,
}

impl GatedRule {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Values of the calls still waiting, in call order.
    pub fn waiting(&self) -> Vec<Tree> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|(v, _)| v.clone())
            .collect()
    }

    /// Resolve the oldest waiting call made with `value`.
    pub fn resolve(&self, value: &str, outcome: Option<&str>) {
        let mut pending = self.pending.lock().unwrap();
        let pos = pending
            .iter()
            .position(|(v, _)| v.as_str() == Some(value))
            .unwrap_or_else(|| panic!("no waiting call for {value:?}"));
        let (_, tx) = pending.remove(pos);
        let _ = tx.send(outcome.map(str::to_owned));
    }
}

#[async_trait]
impl AsyncRule for GatedRule {
    async fn validate(&self, value: Tree, _values: FormValues) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().unwrap().push((value, tx));
        rx.await.unwrap_or(None)
    }
}

/// Async rule that answers immediately: `"taken"` is rejected.
#[derive(Clone, Default)]
pub struct TakenRule {
    calls: Arc<AtomicUsize>,
}

impl TakenRule {
    pub fn new() -> Self {
        init_tracing();
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AsyncRule for TakenRule {
    async fn validate(&self, value: Tree, _values: FormValues) -> Option<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (value.as_str() == Some("taken")).then(|| "Username taken".to_string())
    }
}

/// Let spawned tasks run without advancing the clock.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
