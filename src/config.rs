use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::hosts::HostClass;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub loader: LoaderConfig,
    #[serde(default)]
    pub preload: PreloadConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub hosts: Vec<HostOverride>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("./data/catalog.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_passes")]
    pub retry_passes: u32,
    #[serde(default = "default_min_dimension")]
    pub min_dimension: u32,
    #[serde(default = "default_high_priority_factor")]
    pub high_priority_timeout_factor: f64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            retry_delay_ms: default_retry_delay_ms(),
            retry_passes: default_retry_passes(),
            min_dimension: default_min_dimension(),
            high_priority_timeout_factor: default_high_priority_factor(),
        }
    }
}

impl ResolverConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_retry_delay_ms() -> u64 {
    1500
}
fn default_retry_passes() -> u32 {
    1
}
fn default_min_dimension() -> u32 {
    10
}
fn default_high_priority_factor() -> f64 {
    1.5
}

/// Timeout budget per host class, in milliseconds.
#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    #[serde(default = "default_trusted_ms")]
    pub trusted_ms: u64,
    #[serde(default = "default_standard_ms")]
    pub standard_ms: u64,
    #[serde(default = "default_unreliable_ms")]
    pub unreliable_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            trusted_ms: default_trusted_ms(),
            standard_ms: default_standard_ms(),
            unreliable_ms: default_unreliable_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn for_class(&self, class: HostClass) -> u64 {
        match class {
            HostClass::Trusted => self.trusted_ms,
            HostClass::Standard => self.standard_ms,
            HostClass::Unreliable => self.unreliable_ms,
        }
    }
}

fn default_trusted_ms() -> u64 {
    5000
}
fn default_standard_ms() -> u64 {
    4000
}
fn default_unreliable_ms() -> u64 {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_success_ttl_secs")]
    pub success_ttl_secs: u64,
    #[serde(default = "default_failure_ttl_secs")]
    pub failure_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_failure_sweep_interval_secs")]
    pub failure_sweep_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            success_ttl_secs: default_success_ttl_secs(),
            failure_ttl_secs: default_failure_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            failure_sweep_interval_secs: default_failure_sweep_interval_secs(),
        }
    }
}

impl CacheConfig {
    pub fn success_ttl(&self) -> Duration {
        Duration::from_secs(self.success_ttl_secs)
    }
    pub fn failure_ttl(&self) -> Duration {
        Duration::from_secs(self.failure_ttl_secs)
    }
}

fn default_success_ttl_secs() -> u64 {
    30 * 60
}
fn default_failure_ttl_secs() -> u64 {
    5 * 60
}
fn default_sweep_interval_secs() -> u64 {
    10 * 60
}
fn default_failure_sweep_interval_secs() -> u64 {
    2 * 60
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoaderConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Origin sent when a host is fetched in cross-origin mode.
    #[serde(default = "default_origin")]
    pub origin: String,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            origin: default_origin(),
            max_bytes: default_max_bytes(),
        }
    }
}

fn default_user_agent() -> String {
    format!("libflix-covers/{}", env!("CARGO_PKG_VERSION"))
}
fn default_origin() -> String {
    "https://libflix.app".to_string()
}
fn default_max_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreloadConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// A `[[hosts]]` entry that adds to or replaces a built-in host policy.
#[derive(Debug, Deserialize, Clone)]
pub struct HostOverride {
    pub host: String,
    pub base_score: u8,
    #[serde(default)]
    pub class: HostClass,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub cross_origin: bool,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate resolver
    if config.resolver.retry_passes > 5 {
        anyhow::bail!("resolver.retry_passes must be <= 5");
    }
    let factor = config.resolver.high_priority_timeout_factor;
    if factor.is_nan() || factor <= 0.0 {
        anyhow::bail!("resolver.high_priority_timeout_factor must be > 0");
    }

    // Validate cache
    if config.cache.success_ttl_secs == 0 || config.cache.failure_ttl_secs == 0 {
        anyhow::bail!("cache TTLs must be > 0");
    }
    if config.cache.sweep_interval_secs == 0 || config.cache.failure_sweep_interval_secs == 0 {
        anyhow::bail!("cache sweep intervals must be > 0");
    }

    // Validate preload
    if config.preload.concurrency == 0 {
        anyhow::bail!("preload.concurrency must be >= 1");
    }

    for host in &config.hosts {
        if host.host.trim().is_empty() {
            anyhow::bail!("hosts.host must not be empty");
        }
        if host.base_score > 100 {
            anyhow::bail!(
                "hosts.base_score for '{}' must be in [0, 100]",
                host.host
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.resolver.retry_passes, 1);
        assert_eq!(config.resolver.min_dimension, 10);
        assert_eq!(config.preload.concurrency, 6);
        assert_eq!(config.cache.success_ttl(), Duration::from_secs(1800));
        assert!(config.hosts.is_empty());
    }

    #[test]
    fn test_host_overrides_parse() {
        let config = parse(
            r#"
[[hosts]]
host = "covers.example.org"
base_score = 80
class = "trusted"
cross_origin = true

[[hosts]]
host = "slow.example.net"
base_score = 20
class = "unreliable"
timeout_ms = 500
"#,
        )
        .unwrap();
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.hosts[0].class, HostClass::Trusted);
        assert!(config.hosts[0].cross_origin);
        assert_eq!(config.hosts[1].timeout_ms, Some(500));
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = parse("[preload]\nconcurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("preload.concurrency"));
    }

    #[test]
    fn test_rejects_out_of_range_score() {
        let err = parse("[[hosts]]\nhost = \"x.example\"\nbase_score = 150\n").unwrap_err();
        assert!(err.to_string().contains("base_score"));
    }

    #[test]
    fn test_timeout_for_class() {
        let t = TimeoutConfig::default();
        assert_eq!(t.for_class(HostClass::Trusted), 5000);
        assert_eq!(t.for_class(HostClass::Unreliable), 1500);
    }
}
