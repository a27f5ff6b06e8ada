//! Per-path sequence numbers and debounce timers.
//!
//! Every async validation attempt captures a sequence number when it is
//! scheduled or started. Only the attempt holding the number most recently
//! minted for its path may write results; anything else is stale. Numbers
//! come from one counter per scheduler, so a path that was invalidated and
//! scheduled again never sees an old number reappear.

use std::collections::HashMap;
use tirea_form_state::Path;
use tokio::task::AbortHandle;

#[derive(Debug, Default)]
pub struct AsyncScheduler {
    next_seq: u64,
    latest: HashMap<Path, u64>,
    timers: HashMap<Path, AbortHandle>,
}

impl AsyncScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh number for `path`, superseding any earlier attempt.
    pub fn mint(&mut self, path: &Path) -> u64 {
        self.next_seq += 1;
        self.latest.insert(path.clone(), self.next_seq);
        self.next_seq
    }

    /// True if `seq` is the latest number for `path`.
    pub fn is_current(&self, path: &Path, seq: u64) -> bool {
        self.latest.get(path) == Some(&seq)
    }

    pub fn current(&self, path: &Path) -> Option<u64> {
        self.latest.get(path).copied()
    }

    /// Track the timer task for `path`, aborting the one it replaces.
    pub fn arm(&mut self, path: &Path, timer: AbortHandle) {
        if let Some(old) = self.timers.insert(path.clone(), timer) {
            old.abort();
        }
    }

    /// Abort the pending timer for `path`, if any.
    pub fn cancel_timer(&mut self, path: &Path) -> bool {
        match self.timers.remove(path) {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    /// Called by a timer task when its delay elapses. Returns false if the
    /// task's number was superseded while it slept.
    ///
    /// A fired timer is no longer tracked, so later supersession leaves the
    /// running call alone and only discards its result.
    pub fn fire(&mut self, path: &Path, seq: u64) -> bool {
        if !self.is_current(path, seq) {
            return false;
        }
        self.timers.remove(path);
        true
    }

    /// Retire `seq` once its result has been applied. Returns false for a
    /// stale number, in which case the result must be dropped.
    pub fn settle(&mut self, path: &Path, seq: u64) -> bool {
        if !self.is_current(path, seq) {
            return false;
        }
        self.latest.remove(path);
        true
    }

    /// Make every outstanding attempt for `path` stale and abort its timer.
    pub fn invalidate(&mut self, path: &Path) -> bool {
        let had_seq = self.latest.remove(path).is_some();
        let had_timer = self.cancel_timer(path);
        had_seq || had_timer
    }

    /// Invalidate every tracked path matching `pred`; returns those paths.
    pub fn invalidate_matching(&mut self, mut pred: impl FnMut(&Path) -> bool) -> Vec<Path> {
        let mut hits: Vec<Path> = self
            .latest
            .keys()
            .chain(self.timers.keys())
            .filter(|p| pred(p))
            .cloned()
            .collect();
        hits.sort();
        hits.dedup();
        for path in &hits {
            self.invalidate(path);
        }
        hits
    }

    /// Invalidate everything.
    pub fn clear(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        self.latest.clear();
    }

    /// Paths with a scheduled or running attempt, sorted.
    pub fn pending_paths(&self) -> Vec<Path> {
        let mut paths: Vec<Path> = self.latest.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn is_idle(&self) -> bool {
        self.latest.is_empty() && self.timers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tirea_form_state::path;

    fn sleeper() -> AbortHandle {
        tokio::spawn(std::future::pending::<()>()).abort_handle()
    }

    #[test]
    fn test_newer_mint_supersedes() {
        let mut s = AsyncScheduler::new();
        let p = path!("email");
        let a = s.mint(&p);
        let b = s.mint(&p);
        assert!(b > a);
        assert!(!s.is_current(&p, a));
        assert!(!s.settle(&p, a));
        assert!(s.settle(&p, b));
        assert!(s.is_idle());
    }

    #[test]
    fn test_numbers_never_reused_after_invalidate() {
        let mut s = AsyncScheduler::new();
        let p = path!("email");
        let a = s.mint(&p);
        assert!(s.invalidate(&p));
        let b = s.mint(&p);
        assert_ne!(a, b);
        assert!(!s.is_current(&p, a));
    }

    #[test]
    fn test_paths_are_independent() {
        let mut s = AsyncScheduler::new();
        let a = s.mint(&path!("a"));
        let _ = s.mint(&path!("b"));
        assert!(s.is_current(&path!("a"), a));
        assert_eq!(s.pending_paths(), vec![path!("a"), path!("b")]);
    }

    #[tokio::test]
    async fn test_arm_aborts_previous_timer() {
        let mut s = AsyncScheduler::new();
        let p = path!("a");
        let first = sleeper();
        s.arm(&p, first.clone());
        s.arm(&p, sleeper());
        tokio::task::yield_now().await;
        assert!(first.is_finished());
        s.clear();
        assert!(s.is_idle());
    }

    #[tokio::test]
    async fn test_fire_untracks_timer_only_when_current() {
        let mut s = AsyncScheduler::new();
        let p = path!("a");
        let seq = s.mint(&p);
        s.arm(&p, sleeper());
        assert!(!s.fire(&p, seq + 100));
        assert!(s.fire(&p, seq));
        assert!(!s.cancel_timer(&p));
        assert!(s.is_current(&p, seq));
        s.clear();
    }

    #[tokio::test]
    async fn test_invalidate_matching_prefix() {
        let mut s = AsyncScheduler::new();
        s.mint(&path!("items", 0usize, "name"));
        s.mint(&path!("items", 2usize, "name"));
        s.arm(&path!("items", 3usize), sleeper());
        s.mint(&path!("other"));

        let hit = s.invalidate_matching(|p| {
            p.index_below(&path!("items")).is_some_and(|i| i >= 2)
        });
        assert_eq!(hit, vec![path!("items", 2usize, "name"), path!("items", 3usize)]);
        assert_eq!(
            s.pending_paths(),
            vec![path!("items", 0usize, "name"), path!("other")]
        );
    }
}
