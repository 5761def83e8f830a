//! Bulk cache warming.
//!
//! Resolves many items ahead of display with a fixed concurrency window
//! instead of issuing every resolution at once.

use futures::stream::{self, StreamExt};
use serde::Serialize;

use crate::models::{CatalogItem, Priority, ResolutionResult};
use crate::progress::{PreloadProgressEvent, PreloadProgressReporter};
use crate::resolver::Resolver;

/// An item that ended without a cover.
#[derive(Debug, Clone, Serialize)]
pub struct PreloadMiss {
    pub id: String,
    pub title: String,
    pub tried_urls: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreloadSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub misses: Vec<PreloadMiss>,
}

/// Resolve `items` with at most `concurrency` resolutions in flight.
pub async fn preload(
    resolver: &Resolver,
    items: &[CatalogItem],
    concurrency: usize,
    progress: &dyn PreloadProgressReporter,
) -> PreloadSummary {
    let total = items.len();
    progress.report(PreloadProgressEvent::Started {
        total: total as u64,
    });

    let mut results = stream::iter(items)
        .map(|item| async move {
            let result = resolver.resolve_image(item, Priority::Normal).await;
            (item, result)
        })
        .buffer_unordered(concurrency.max(1));

    let mut summary = PreloadSummary {
        total,
        ..Default::default()
    };
    let mut n = 0u64;
    while let Some((item, result)) = results.next().await {
        n += 1;
        let ok = result.is_success();
        match result {
            ResolutionResult::Success { .. } => summary.succeeded += 1,
            ResolutionResult::Failure { tried_urls, .. } => {
                summary.failed += 1;
                summary.misses.push(PreloadMiss {
                    id: item.id.clone(),
                    title: item.title.clone(),
                    tried_urls,
                });
            }
        }
        progress.report(PreloadProgressEvent::Resolved {
            id: item.id.clone(),
            ok,
            n,
            total: total as u64,
        });
    }

    summary.misses.sort_by(|a, b| a.id.cmp(&b.id));
    summary
}
