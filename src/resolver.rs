//! Cover resolution loop.
//!
//! [`Resolver::resolve_image`] is the single entry point. It turns a
//! [`CatalogItem`] into an ordered candidate list and tries each candidate
//! until one decodes as a usable image.
//!
//! ```text
//! Idle ─▶ Attempting(0) ─▶ Attempting(1) ─▶ … ─▶ AllFailed
//!            │                 │                    │ sleep(retry_delay)
//!            ▼                 ▼                    ▼
//!        Succeeded         Succeeded            RetryPass ─▶ Succeeded | Failure
//! ```
//!
//! # Rules
//!
//! - Candidates are tried strictly in descending score order.
//! - On the primary pass, URLs that failed within the failure TTL are
//!   skipped. Retry passes try every candidate again.
//! - Each attempt gets a host-based timeout budget, scaled up for
//!   [`Priority::High`]. The load future is dropped when the budget runs
//!   out, so a late success is never observed.
//! - Decoded images no larger than `min_dimension` on either axis are
//!   placeholders or tracking pixels and count as decode failures.
//! - The first valid image wins; nothing after it is attempted.
//! - After the retry passes, the item is cached as a failure and reported
//!   to the [`FailureSink`].
//!
//! # Coalescing
//!
//! Concurrent calls for the same item id share one in-flight future, so a
//! burst of requests for one book runs a single candidate sequence.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::candidates::build_candidates;
use crate::config::{Config, ResolverConfig};
use crate::diagnostics::{AttemptRecord, FailureReport, FailureSink, NoopSink};
use crate::error::AttemptError;
use crate::hosts::HostPolicyTable;
use crate::loader::{HttpImageLoader, ImageLoader, LoadOptions};
use crate::models::{Candidate, CatalogItem, Dimensions, FailureReason, Priority, ResolutionResult};

type InFlight = Shared<BoxFuture<'static, ResolutionResult>>;

/// Resolves cover images for catalog items.
///
/// Cheap to clone; clones share the cache and the in-flight table.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

struct Inner {
    config: ResolverConfig,
    policy: HostPolicyTable,
    loader: Arc<dyn ImageLoader>,
    cache: Arc<ResultCache>,
    sink: Arc<dyn FailureSink>,
    in_flight: Mutex<HashMap<String, InFlight>>,
}

/// Builder for [`Resolver`].
pub struct ResolverBuilder {
    config: ResolverConfig,
    policy: HostPolicyTable,
    loader: Arc<dyn ImageLoader>,
    cache: Option<Arc<ResultCache>>,
    sink: Arc<dyn FailureSink>,
}

impl ResolverBuilder {
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn policy(mut self, policy: HostPolicyTable) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn failure_sink(mut self, sink: Arc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn build(self) -> Resolver {
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(ResultCache::from_config(&crate::config::CacheConfig::default()))
        });
        Resolver {
            inner: Arc::new(Inner {
                config: self.config,
                policy: self.policy,
                loader: self.loader,
                cache,
                sink: self.sink,
                in_flight: Mutex::new(HashMap::new()),
            }),
        }
    }
}

impl Resolver {
    /// Start a builder around an image loader. Everything else has defaults.
    pub fn builder(loader: Arc<dyn ImageLoader>) -> ResolverBuilder {
        ResolverBuilder {
            config: ResolverConfig::default(),
            policy: HostPolicyTable::default(),
            loader,
            cache: None,
            sink: Arc::new(NoopSink),
        }
    }

    /// Production resolver: HTTP loader, host table with `[[hosts]]`
    /// overrides, and a cache sized from `[cache]`.
    pub fn from_config(config: &Config, sink: Arc<dyn FailureSink>) -> Result<Self> {
        let loader = HttpImageLoader::new(&config.loader)?;
        Ok(Self::builder(Arc::new(loader))
            .config(config.resolver.clone())
            .policy(HostPolicyTable::from_config(
                config.timeouts.clone(),
                &config.hosts,
            ))
            .cache(Arc::new(ResultCache::from_config(&config.cache)))
            .failure_sink(sink)
            .build())
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.inner.cache
    }

    pub fn policy(&self) -> &HostPolicyTable {
        &self.inner.policy
    }

    /// The ordered candidate list this resolver would try for `item`.
    pub fn candidates(&self, item: &CatalogItem) -> Vec<Candidate> {
        build_candidates(item, &self.inner.policy)
    }

    /// Resolve a displayable cover for `item`.
    ///
    /// Returns a cached result while it is fresh. Otherwise joins an
    /// in-flight resolution for the same id or starts a new one. The
    /// resolution runs as its own task, so it completes and fills the
    /// cache even if every caller goes away.
    pub async fn resolve_image(&self, item: &CatalogItem, priority: Priority) -> ResolutionResult {
        if let Some(cached) = self.inner.cache.get(&item.id) {
            debug!(item = %item.id, "cache hit");
            return cached;
        }

        let shared = {
            let mut in_flight = self.inner.lock_in_flight();
            if let Some(existing) = in_flight.get(&item.id) {
                debug!(item = %item.id, "joining in-flight resolution");
                existing.clone()
            } else if let Some(cached) = self.inner.cache.get(&item.id) {
                // a run finished between the first check and the lock
                return cached;
            } else {
                let fut = self.spawn_run(item, priority);
                in_flight.insert(item.id.clone(), fut.clone());
                fut
            }
        };

        shared.await
    }

    fn spawn_run(&self, item: &CatalogItem, priority: Priority) -> InFlight {
        let inner = Arc::clone(&self.inner);
        let owned = item.clone();
        let task = tokio::spawn(async move {
            let result = inner.run(&owned, priority).await;
            inner.lock_in_flight().remove(&owned.id);
            result
        });

        let inner = Arc::clone(&self.inner);
        let item = item.clone();
        async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(item = %item.id, error = %e, "resolution task failed");
                    inner.lock_in_flight().remove(&item.id);
                    ResolutionResult::Failure {
                        tried_urls: Vec::new(),
                        title: item.title.clone(),
                        author: item.author.clone(),
                        reason: FailureReason::ExhaustedAllCandidates,
                    }
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Attempt bookkeeping for one resolution.
#[derive(Default)]
struct AttemptLog {
    tried: Vec<String>,
    records: Vec<AttemptRecord>,
}

impl AttemptLog {
    fn note_tried(&mut self, url: &str) {
        if !self.tried.iter().any(|u| u == url) {
            self.tried.push(url.to_string());
        }
    }
}

impl Inner {
    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, InFlight>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(&self, item: &CatalogItem, priority: Priority) -> ResolutionResult {
        if !item.has_identifiers() {
            debug!(item = %item.id, "no ISBN or primary URL; not attempting");
            return ResolutionResult::Failure {
                tried_urls: Vec::new(),
                title: item.title.clone(),
                author: item.author.clone(),
                reason: FailureReason::NoIdentifiers,
            };
        }

        let candidates = build_candidates(item, &self.policy);
        let mut log = AttemptLog::default();

        if !candidates.is_empty() {
            if let Some(result) = self.pass(item, &candidates, priority, 0, &mut log).await {
                return result;
            }
            for pass in 1..=self.config.retry_passes {
                debug!(item = %item.id, pass, "all candidates failed; retrying after delay");
                tokio::time::sleep(self.config.retry_delay()).await;
                if let Some(result) = self.pass(item, &candidates, priority, pass, &mut log).await {
                    return result;
                }
            }
        }

        self.exhausted(item, log)
    }

    /// One ordered sweep over `candidates`. Pass `0` honours the
    /// failed-URL skip rule; retry passes do not.
    async fn pass(
        &self,
        item: &CatalogItem,
        candidates: &[Candidate],
        priority: Priority,
        pass: u32,
        log: &mut AttemptLog,
    ) -> Option<ResolutionResult> {
        for candidate in candidates {
            let url = candidate.url.as_str();
            if pass == 0 && self.cache.is_url_failed(url) {
                debug!(item = %item.id, url, "skipping recently failed URL");
                continue;
            }

            let request = self.policy.request_policy(url);
            let options = LoadOptions {
                timeout: self.budget(request.timeout_ms, priority),
                cross_origin: request.cross_origin,
            };
            log.note_tried(url);

            match self.attempt(url, options).await {
                Ok(dims) => {
                    self.cache.clear_url(url);
                    let result = ResolutionResult::Success {
                        url: candidate.url.clone(),
                        width: dims.width,
                        height: dims.height,
                        resolved_at: Utc::now(),
                        source: candidate.source,
                        score: candidate.score,
                    };
                    self.cache.put(&item.id, result.clone());
                    info!(
                        item = %item.id,
                        url,
                        width = dims.width,
                        height = dims.height,
                        pass,
                        "cover resolved"
                    );
                    return Some(result);
                }
                Err(error) => {
                    debug!(item = %item.id, url, pass, error = %error, "candidate failed");
                    self.cache.mark_url_failed(url);
                    log.records.push(AttemptRecord {
                        url: candidate.url.clone(),
                        pass,
                        error,
                    });
                }
            }
        }
        None
    }

    async fn attempt(&self, url: &str, options: LoadOptions) -> Result<Dimensions, AttemptError> {
        let dims = match tokio::time::timeout(options.timeout, self.loader.attempt_load(url, options))
            .await
        {
            Ok(result) => result?,
            Err(_) => {
                return Err(AttemptError::Timeout {
                    timeout_ms: options.timeout.as_millis() as u64,
                })
            }
        };

        let min = self.config.min_dimension;
        if dims.width <= min || dims.height <= min {
            return Err(AttemptError::decode(format!(
                "{}x{} image rejected as placeholder",
                dims.width, dims.height
            )));
        }
        Ok(dims)
    }

    fn budget(&self, timeout_ms: u64, priority: Priority) -> Duration {
        let ms = match priority {
            Priority::Normal => timeout_ms,
            Priority::High => {
                (timeout_ms as f64 * self.config.high_priority_timeout_factor).round() as u64
            }
        };
        Duration::from_millis(ms.max(1))
    }

    fn exhausted(&self, item: &CatalogItem, log: AttemptLog) -> ResolutionResult {
        warn!(
            item = %item.id,
            title = %item.title,
            tried = log.tried.len(),
            "no usable cover after retry"
        );
        let report = FailureReport {
            item_id: item.id.clone(),
            title: item.title.clone(),
            author: item.author.clone(),
            tried_urls: log.tried.clone(),
            attempts: log.records,
            reported_at: Utc::now(),
        };
        self.sink.report_failure(&report);

        let result = ResolutionResult::Failure {
            tried_urls: log.tried,
            title: item.title.clone(),
            author: item.author.clone(),
            reason: FailureReason::ExhaustedAllCandidates,
        };
        self.cache.put(&item.id, result.clone());
        result
    }
}
