//! Host reliability policy and URL scoring.
//!
//! A single data-driven table maps hosts to a base score, a timeout class,
//! and a cross-origin request mode. The resolver consults the same table
//! for ordering, timeout budgets, and request mode, so no call site keeps
//! its own copy of host heuristics.
//!
//! # Scoring
//!
//! ```text
//! score = base(host) + Σ penalties(url shape) + bonus(extension) − insecure
//!         clamped to [0, 100]
//! ```
//!
//! Host matching tries an exact host first, then a substring match
//! (`cloudfront.net` covers every distribution subdomain). Unknown hosts
//! get [`DEFAULT_SCORE`]. Scores only order candidates; they never decide
//! success.
//!
//! The insecure penalty only shows up when a raw URL is scored directly
//! (`libflix score`). Resolution candidates are upgraded to `https://` by
//! [`crate::candidates::clean_url`] before they are scored.

use serde::Deserialize;
use url::Url;

use crate::config::{HostOverride, TimeoutConfig};

/// Base score for hosts missing from the table.
pub const DEFAULT_SCORE: u8 = 50;

const EXTENSION_BONUS: i32 = 5;
const INSECURE_PENALTY: i32 = 10;
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".gif"];

/// Timeout classification of a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostClass {
    /// Fast, dependable image hosts.
    Trusted,
    #[default]
    Standard,
    /// Hosts that often hang or deny; fail fast and move on.
    Unreliable,
}

impl HostClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostClass::Trusted => "trusted",
            HostClass::Standard => "standard",
            HostClass::Unreliable => "unreliable",
        }
    }
}

/// Policy for one host pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPolicy {
    pub host: String,
    pub base_score: u8,
    pub class: HostClass,
    /// Overrides the class timeout when set.
    pub timeout_ms: Option<u64>,
    /// Request in anonymous cross-origin mode.
    pub cross_origin: bool,
}

impl HostPolicy {
    fn new(host: &str, base_score: u8, class: HostClass, cross_origin: bool) -> Self {
        Self {
            host: host.to_string(),
            base_score,
            class,
            timeout_ms: None,
            cross_origin,
        }
    }
}

impl From<&HostOverride> for HostPolicy {
    fn from(o: &HostOverride) -> Self {
        Self {
            host: o.host.to_ascii_lowercase(),
            base_score: o.base_score.min(100),
            class: o.class,
            timeout_ms: o.timeout_ms,
            cross_origin: o.cross_origin,
        }
    }
}

/// A score adjustment for URLs containing a known-bad pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlPenalty {
    pub pattern: String,
    pub delta: i32,
}

/// How a URL will be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestPolicy {
    pub timeout_ms: u64,
    pub cross_origin: bool,
    pub class: HostClass,
}

/// The authoritative host table.
#[derive(Debug, Clone)]
pub struct HostPolicyTable {
    hosts: Vec<HostPolicy>,
    penalties: Vec<UrlPenalty>,
    timeouts: TimeoutConfig,
}

impl Default for HostPolicyTable {
    fn default() -> Self {
        Self::builtin(TimeoutConfig::default())
    }
}

impl HostPolicyTable {
    /// The built-in table.
    ///
    /// Amazon's media CDN is kept at a reduced but positive score rather
    /// than blocklisted; its legacy `/images/P/` path is penalized because
    /// it answers unknown ISBNs with a 1x1 GIF.
    pub fn builtin(timeouts: TimeoutConfig) -> Self {
        use HostClass::*;
        let hosts = vec![
            HostPolicy::new("firebasestorage.googleapis.com", 95, Trusted, true),
            HostPolicy::new("covers.openlibrary.org", 90, Trusted, true),
            HostPolicy::new("books.google.com", 85, Trusted, false),
            HostPolicy::new("books.googleusercontent.com", 85, Trusted, false),
            HostPolicy::new("archive.org", 70, Standard, false),
            HostPolicy::new("images-na.ssl-images-amazon.com", 60, Standard, false),
            HostPolicy::new("m.media-amazon.com", 55, Standard, false),
            HostPolicy::new("images.amazon.com", 45, Standard, false),
            HostPolicy::new("cloudfront.net", 30, Unreliable, false),
        ];
        let penalties = vec![
            UrlPenalty {
                pattern: "/images/P/".to_string(),
                delta: -15,
            },
            UrlPenalty {
                pattern: "._SX0_".to_string(),
                delta: -25,
            },
            UrlPenalty {
                pattern: "no_image".to_string(),
                delta: -40,
            },
            UrlPenalty {
                pattern: "placeholder".to_string(),
                delta: -40,
            },
        ];
        Self {
            hosts,
            penalties,
            timeouts,
        }
    }

    /// Build the built-in table, then apply `[[hosts]]` overrides.
    ///
    /// An override with the same host replaces the built-in entry; new
    /// hosts are checked before built-ins so they win substring matches.
    pub fn from_config(timeouts: TimeoutConfig, overrides: &[HostOverride]) -> Self {
        let mut table = Self::builtin(timeouts);
        for o in overrides.iter().rev() {
            let policy = HostPolicy::from(o);
            table.hosts.retain(|h| h.host != policy.host);
            table.hosts.insert(0, policy);
        }
        table
    }

    pub fn hosts(&self) -> &[HostPolicy] {
        &self.hosts
    }

    /// Find the policy for a URL's host: exact match, then substring.
    pub fn lookup(&self, url: &str) -> Option<&HostPolicy> {
        let host = host_of(url)?;
        self.hosts
            .iter()
            .find(|p| p.host == host)
            .or_else(|| self.hosts.iter().find(|p| host.contains(p.host.as_str())))
    }

    /// Advisory reliability score in `[0, 100]`.
    ///
    /// Plain `http://` URLs lose ten points; candidates
    /// built for resolution never carry that scheme.
    pub fn score(&self, url: &str) -> u8 {
        let base = self
            .lookup(url)
            .map(|p| p.base_score)
            .unwrap_or(DEFAULT_SCORE) as i32;

        let mut score = base;
        for penalty in &self.penalties {
            if url.contains(penalty.pattern.as_str()) {
                score += penalty.delta;
            }
        }
        if has_image_extension(url) {
            score += EXTENSION_BONUS;
        }
        if url.starts_with("http://") {
            score -= INSECURE_PENALTY;
        }
        score.clamp(0, 100) as u8
    }

    /// Timeout and request mode for a URL.
    pub fn request_policy(&self, url: &str) -> RequestPolicy {
        match self.lookup(url) {
            Some(p) => RequestPolicy {
                timeout_ms: p
                    .timeout_ms
                    .unwrap_or_else(|| self.timeouts.for_class(p.class)),
                cross_origin: p.cross_origin,
                class: p.class,
            },
            None => RequestPolicy {
                timeout_ms: self.timeouts.for_class(HostClass::Standard),
                cross_origin: false,
                class: HostClass::Standard,
            },
        }
    }
}

/// Lowercased host of an absolute URL.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

fn has_image_extension(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(u) => u.path().to_ascii_lowercase(),
        Err(_) => return false,
    };
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
