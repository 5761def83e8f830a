//! # LibFlix cover CLI (`libflix`)
//!
//! Inspect and drive cover resolution for the LibFlix catalog.
//!
//! ## Usage
//!
//! ```bash
//! libflix --config ./config/libflix.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `libflix isbn <raw>` | Normalize an ISBN and print both forms |
//! | `libflix score <url>` | Show the host policy and score for a URL |
//! | `libflix candidates <id>` | List the ordered candidates for a catalog item |
//! | `libflix resolve <id>` | Resolve one item's cover |
//! | `libflix preload` | Resolve the whole catalog with bounded concurrency |
//! | `libflix serve` | Start the HTTP API |
//!
//! Logs go to stderr; set `RUST_LOG=libflix_covers=debug` to see every
//! candidate attempt.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use libflix_covers::catalog::{find_item, load_catalog};
use libflix_covers::config::{self, Config};
use libflix_covers::diagnostics::{LogSink, MemoryFailureLog, NoopSink};
use libflix_covers::hosts::HostPolicyTable;
use libflix_covers::isbn::{normalize_isbn, IsbnForms};
use libflix_covers::models::{CatalogItem, Priority, ResolutionResult};
use libflix_covers::preload::preload;
use libflix_covers::progress::ProgressMode;
use libflix_covers::resolver::Resolver;
use libflix_covers::server;

/// LibFlix cover resolution: ISBN normalization, candidate scoring, and
/// bounded retry loading of book cover images.
#[derive(Parser)]
#[command(name = "libflix", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Commands that only inspect identifiers or URLs fall back to built-in
    /// defaults when the file does not exist.
    #[arg(long, global = true, default_value = "./config/libflix.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize an ISBN and print its ISBN-10 and ISBN-13 forms.
    Isbn {
        /// ISBN in any common notation (hyphens and spaces are ignored).
        raw: String,
    },

    /// Score a URL against the host policy table.
    Score {
        url: String,
    },

    /// List the ordered, scored candidates for a catalog item.
    Candidates {
        /// Catalog item id.
        id: String,
    },

    /// Resolve one catalog item's cover.
    Resolve {
        /// Catalog item id.
        id: String,

        /// `high` widens the timeout budget; `normal` is the default.
        #[arg(long, default_value = "normal")]
        priority: Priority,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Resolve every catalog item and report the ones without a cover.
    Preload {
        /// Maximum number of items to resolve.
        #[arg(long)]
        limit: Option<usize>,

        /// Override `[preload].concurrency`.
        #[arg(long)]
        concurrency: Option<usize>,

        /// Progress output on stderr: `human`, `json`, or `off`.
        /// Defaults to `human` on a TTY, otherwise `off`.
        #[arg(long)]
        progress: Option<String>,
    },

    /// Start the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Isbn { raw } => run_isbn(&raw)?,
        Commands::Score { url } => {
            let cfg = config_or_default(&cli.config)?;
            run_score(&cfg, &url);
        }
        Commands::Candidates { id } => {
            let cfg = config::load_config(&cli.config)?;
            let items = load_catalog(&cfg.catalog.path)?;
            let item = lookup(&items, &id)?;
            let resolver = Resolver::from_config(&cfg, Arc::new(NoopSink))?;
            println!("{:<6} {:<10} URL", "SCORE", "SOURCE");
            for c in resolver.candidates(item) {
                println!("{:<6} {:<10} {}", c.score, format!("{:?}", c.source).to_lowercase(), c.url);
            }
        }
        Commands::Resolve { id, priority, json } => {
            let cfg = config::load_config(&cli.config)?;
            let items = load_catalog(&cfg.catalog.path)?;
            let item = lookup(&items, &id)?;
            let resolver = Resolver::from_config(&cfg, Arc::new(LogSink))?;
            let result = resolver.resolve_image(item, priority).await;
            print_result(&result, json)?;
        }
        Commands::Preload {
            limit,
            concurrency,
            progress,
        } => {
            let cfg = config::load_config(&cli.config)?;
            let mut items = load_catalog(&cfg.catalog.path)?;
            if let Some(limit) = limit {
                items.truncate(limit);
            }
            let mode = match progress.as_deref() {
                Some(s) => ProgressMode::parse(s)
                    .with_context(|| format!("invalid --progress value: {}", s))?,
                None => ProgressMode::default_for_tty(),
            };
            let failures = Arc::new(MemoryFailureLog::default());
            let resolver = Resolver::from_config(&cfg, failures.clone())?;
            let window = concurrency.unwrap_or(cfg.preload.concurrency);
            if window == 0 {
                bail!("--concurrency must be >= 1");
            }

            let summary = preload(&resolver, &items, window, mode.reporter().as_ref()).await;

            println!("preload ok");
            println!("  items: {}", summary.total);
            println!("  resolved: {}", summary.succeeded);
            println!("  missing: {}", summary.failed);
            for report in failures.reports() {
                println!(
                    "  - {} ({}): {} attempts, {} timeouts",
                    report.item_id,
                    report.title,
                    report.attempts.len(),
                    report.timeouts()
                );
            }
        }
        Commands::Serve => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        config::load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn lookup<'a>(items: &'a [CatalogItem], id: &str) -> Result<&'a CatalogItem> {
    find_item(items, id).with_context(|| format!("no catalog item with id: {}", id))
}

fn run_isbn(raw: &str) -> Result<()> {
    let normalized = normalize_isbn(raw).with_context(|| format!("invalid ISBN: {}", raw))?;
    let forms = IsbnForms::from_raw(&normalized)?;
    println!("normalized: {}", normalized);
    println!("isbn10: {}", forms.isbn10.as_deref().unwrap_or("-"));
    println!("isbn13: {}", forms.isbn13.as_deref().unwrap_or("-"));
    Ok(())
}

fn run_score(cfg: &Config, url: &str) {
    let table = HostPolicyTable::from_config(cfg.timeouts.clone(), &cfg.hosts);
    let request = table.request_policy(url);
    let host = table
        .lookup(url)
        .map(|p| p.host.as_str())
        .unwrap_or("(default)");
    println!("score: {}", table.score(url));
    println!("host: {}", host);
    println!("class: {}", request.class.as_str());
    println!("timeout_ms: {}", request.timeout_ms);
    println!("cross_origin: {}", request.cross_origin);
}

fn print_result(result: &ResolutionResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }
    match result {
        ResolutionResult::Success {
            url, width, height, ..
        } => {
            println!("resolved: {}", url);
            println!("size: {}x{}", width, height);
        }
        ResolutionResult::Failure {
            tried_urls,
            title,
            author,
            reason,
        } => {
            println!("no cover for \"{}\" by {} ({:?})", title, author, reason);
            for url in tried_urls {
                println!("  tried: {}", url);
            }
        }
    }
    Ok(())
}
