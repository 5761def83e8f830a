//! # LibFlix Covers
//!
//! Cover image resolution for the LibFlix book catalog.
//!
//! Given a catalog item's ISBN, title, author, primary cover URL, and
//! fallback URLs, the resolver builds an ordered list of candidate image
//! URLs and tries them until one decodes as a usable image. Hosts are
//! ranked by a single reliability table, every attempt gets a host-based
//! timeout, degenerate placeholder images are rejected, and a fully failed
//! pass is retried once after a delay.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌────────────┐   ┌─────────────┐
//! │ ISBN       │──▶│ Candidates  │──▶│ Resolver   │──▶│ ImageLoader │
//! │ normalize  │   │ + host score│   │ 2-pass loop│   │ HTTP+decode │
//! └────────────┘   └─────────────┘   └─────┬──────┘   └─────────────┘
//!                                          │
//!                          ┌───────────────┼───────────────┐
//!                          ▼               ▼               ▼
//!                    ┌──────────┐   ┌────────────┐   ┌──────────┐
//!                    │ Result   │   │ Failure    │   │ CLI/HTTP │
//!                    │ cache    │   │ sink       │   │ (libflix)│
//!                    └──────────┘   └────────────┘   └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! libflix isbn 0-439-70818-4                 # both ISBN forms
//! libflix candidates hp1                     # ordered candidate list
//! libflix resolve hp1 --priority high        # resolve one cover
//! libflix preload --progress human           # warm the cache
//! libflix serve                              # HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Identifier and attempt errors |
//! | [`isbn`] | ISBN normalization and conversion |
//! | [`candidates`] | Provider templates and candidate merging |
//! | [`hosts`] | Host reliability table and scoring |
//! | [`loader`] | Image fetch-and-decode primitive |
//! | [`resolver`] | The resolution loop |
//! | [`cache`] | Result cache and sweeper |
//! | [`diagnostics`] | Failure reporting sink |
//! | [`catalog`] | Catalog file loading |
//! | [`preload`] | Bounded-concurrency cache warming |
//! | [`progress`] | Preload progress reporting |
//! | [`server`] | HTTP API |

pub mod cache;
pub mod candidates;
pub mod catalog;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod hosts;
pub mod isbn;
pub mod loader;
pub mod models;
pub mod preload;
pub mod progress;
pub mod resolver;
pub mod server;
