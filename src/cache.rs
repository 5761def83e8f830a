//! In-memory result cache owned by a resolver instance.
//!
//! Two maps behind `std::sync::RwLock`:
//!
//! - **results**: item id → last [`ResolutionResult`]. Successes live for
//!   the success TTL, failures for the (shorter) failure TTL.
//! - **failed URLs**: URL → time of last failure. A marked URL is skipped on
//!   the first pass of later resolutions until the failure TTL runs out.
//!
//! Timestamps use `tokio::time::Instant`, so tests can drive expiry with a
//! paused clock. Locks are never held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;
use crate::models::ResolutionResult;

struct CachedEntry {
    result: ResolutionResult,
    stored_at: Instant,
}

/// Entry counts, for `/health`-style reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub successes: usize,
    pub failures: usize,
    pub failed_urls: usize,
}

pub struct ResultCache {
    results: RwLock<HashMap<String, CachedEntry>>,
    failed_urls: RwLock<HashMap<String, Instant>>,
    success_ttl: Duration,
    failure_ttl: Duration,
}

impl ResultCache {
    pub fn new(success_ttl: Duration, failure_ttl: Duration) -> Self {
        Self {
            results: RwLock::new(HashMap::new()),
            failed_urls: RwLock::new(HashMap::new()),
            success_ttl,
            failure_ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.success_ttl(), config.failure_ttl())
    }

    pub fn success_ttl(&self) -> Duration {
        self.success_ttl
    }

    pub fn failure_ttl(&self) -> Duration {
        self.failure_ttl
    }

    fn ttl_for(&self, result: &ResolutionResult) -> Duration {
        if result.is_success() {
            self.success_ttl
        } else {
            self.failure_ttl
        }
    }

    /// Cached result for `key`, unless it has outlived its TTL.
    pub fn get(&self, key: &str) -> Option<ResolutionResult> {
        let results = read(&self.results);
        let entry = results.get(key)?;
        if entry.stored_at.elapsed() < self.ttl_for(&entry.result) {
            Some(entry.result.clone())
        } else {
            None
        }
    }

    pub fn put(&self, key: &str, result: ResolutionResult) {
        self.put_at(key, result, Instant::now());
    }

    /// Store `result` as of `at`. An older write never replaces a newer one.
    pub fn put_at(&self, key: &str, result: ResolutionResult, at: Instant) {
        let mut results = write(&self.results);
        if let Some(existing) = results.get(key) {
            if existing.stored_at > at {
                return;
            }
        }
        results.insert(
            key.to_string(),
            CachedEntry {
                result,
                stored_at: at,
            },
        );
    }

    pub fn remove(&self, key: &str) -> bool {
        write(&self.results).remove(key).is_some()
    }

    /// Drop every result older than `max_age`. Returns the number removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let mut results = write(&self.results);
        let before = results.len();
        results.retain(|_, e| e.stored_at.elapsed() < max_age);
        before - results.len()
    }

    /// Drop cached failures older than `max_age`, leaving successes alone.
    pub fn sweep_failures(&self, max_age: Duration) -> usize {
        let mut results = write(&self.results);
        let before = results.len();
        results.retain(|_, e| e.result.is_success() || e.stored_at.elapsed() < max_age);
        before - results.len()
    }

    /// Drop failed-URL markers older than `max_age`.
    pub fn sweep_failed_urls(&self, max_age: Duration) -> usize {
        let mut failed = write(&self.failed_urls);
        let before = failed.len();
        failed.retain(|_, at| at.elapsed() < max_age);
        before - failed.len()
    }

    /// Whether `url` failed within the failure TTL.
    pub fn is_url_failed(&self, url: &str) -> bool {
        read(&self.failed_urls)
            .get(url)
            .is_some_and(|at| at.elapsed() < self.failure_ttl)
    }

    pub fn mark_url_failed(&self, url: &str) {
        write(&self.failed_urls).insert(url.to_string(), Instant::now());
    }

    pub fn clear_url(&self, url: &str) {
        write(&self.failed_urls).remove(url);
    }

    /// Explicit reset of both maps.
    pub fn clear(&self) {
        write(&self.results).clear();
        write(&self.failed_urls).clear();
    }

    pub fn stats(&self) -> CacheStats {
        let results = read(&self.results);
        let successes = results.values().filter(|e| e.result.is_success()).count();
        CacheStats {
            successes,
            failures: results.len() - successes,
            failed_urls: read(&self.failed_urls).len(),
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

/// Periodically sweep `cache` on two wall-clock intervals.
///
/// Successful results are swept every `success_every`; failed results and
/// failed-URL markers every `failure_every`. The task runs until aborted.
pub fn spawn_sweeper(
    cache: Arc<ResultCache>,
    success_every: Duration,
    failure_every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut success_tick =
            tokio::time::interval_at(Instant::now() + success_every, success_every);
        let mut failure_tick =
            tokio::time::interval_at(Instant::now() + failure_every, failure_every);
        loop {
            tokio::select! {
                _ = success_tick.tick() => {
                    let removed = cache.sweep(cache.success_ttl());
                    debug!(removed, "swept cached results");
                }
                _ = failure_tick.tick() => {
                    let ttl = cache.failure_ttl();
                    let urls = cache.sweep_failed_urls(ttl);
                    let failures = cache.sweep_failures(ttl);
                    debug!(urls, failures, "swept failure markers");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateSource, FailureReason};

    fn success(url: &str) -> ResolutionResult {
        ResolutionResult::Success {
            url: url.to_string(),
            width: 400,
            height: 600,
            resolved_at: chrono::Utc::now(),
            source: CandidateSource::Generated,
            score: 90,
        }
    }

    fn failure() -> ResolutionResult {
        ResolutionResult::Failure {
            tried_urls: vec!["https://a.example/x.jpg".into()],
            title: "T".into(),
            author: "A".into(),
            reason: FailureReason::ExhaustedAllCandidates,
        }
    }

    fn cache() -> ResultCache {
        ResultCache::new(Duration::from_secs(60), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_respects_distinct_ttls() {
        let c = cache();
        c.put("ok", success("https://a.example/1.jpg"));
        c.put("bad", failure());
        assert!(c.get("ok").is_some());
        assert!(c.get("bad").is_some());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(c.get("ok").is_some());
        assert!(c.get("bad").is_none());

        tokio::time::advance(Duration::from_secs(50)).await;
        assert!(c.get("ok").is_none());
        assert!(c.get("missing").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_url_expires() {
        let c = cache();
        c.mark_url_failed("https://a.example/x.jpg");
        assert!(c.is_url_failed("https://a.example/x.jpg"));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!c.is_url_failed("https://a.example/x.jpg"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_url_and_clear() {
        let c = cache();
        c.mark_url_failed("u1");
        c.mark_url_failed("u2");
        c.put("k", success("u3"));
        c.clear_url("u1");
        assert!(!c.is_url_failed("u1"));
        assert!(c.is_url_failed("u2"));
        c.clear();
        assert_eq!(c.stats(), CacheStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_at_ignores_older_writes() {
        let c = cache();
        let earlier = Instant::now();
        tokio::time::advance(Duration::from_secs(1)).await;
        c.put_at("k", success("new"), Instant::now());
        c.put_at("k", failure(), earlier);
        assert_eq!(c.get("k").unwrap().url(), Some("new"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeps() {
        let c = cache();
        c.put("old", success("u"));
        c.put("bad", failure());
        c.mark_url_failed("u");
        tokio::time::advance(Duration::from_secs(30)).await;
        c.put("fresh", success("v"));

        assert_eq!(c.sweep_failed_urls(Duration::from_secs(10)), 1);
        assert_eq!(c.sweep_failures(Duration::from_secs(10)), 1);
        assert_eq!(c.sweep(Duration::from_secs(20)), 1);
        assert_eq!(
            c.stats(),
            CacheStats {
                successes: 1,
                failures: 0,
                failed_urls: 0
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_task_runs_on_interval() {
        let c = Arc::new(cache());
        c.mark_url_failed("u");
        c.put("bad", failure());
        let handle = spawn_sweeper(c.clone(), Duration::from_secs(120), Duration::from_secs(15));

        tokio::time::sleep(Duration::from_secs(16)).await;
        assert_eq!(c.stats().failed_urls, 0);
        assert_eq!(c.stats().failures, 0);
        handle.abort();
    }
}
