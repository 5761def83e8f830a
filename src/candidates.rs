//! Candidate URL generation and merging.
//!
//! [`generate`] expands a fixed set of cover-by-ISBN provider templates.
//! [`build_candidates`] merges those with the item's supplied URLs,
//! deduplicates, scores, and orders them for the resolver.
//!
//! Both are pure: the same item and policy table always produce the same
//! list, and neither touches the network.

use tracing::debug;

use crate::hosts::HostPolicyTable;
use crate::isbn::IsbnForms;
use crate::models::{Candidate, CandidateSource, CatalogItem};

/// Which ISBN forms a provider recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IsbnForm {
    Both,
    Only10,
}

struct Provider {
    template: &'static str,
    accepts: IsbnForm,
}

const PROVIDERS: &[Provider] = &[
    Provider {
        template: "https://covers.openlibrary.org/b/isbn/{isbn}-L.jpg?default=false",
        accepts: IsbnForm::Both,
    },
    Provider {
        template: "https://books.google.com/books/content?vid=ISBN{isbn}&printsec=frontcover&img=1&zoom=1",
        accepts: IsbnForm::Both,
    },
    Provider {
        template: "https://images-na.ssl-images-amazon.com/images/P/{isbn}.01.L.jpg",
        accepts: IsbnForm::Only10,
    },
];

/// Expand provider templates for every derivable ISBN form.
///
/// ISBN-13 expansions come first, then ISBN-10. An invalid or missing ISBN
/// yields an empty list.
pub fn generate(item: &CatalogItem) -> Vec<String> {
    let raw = match item.isbn.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Vec::new(),
    };
    let forms = match IsbnForms::from_raw(raw) {
        Ok(forms) => forms,
        Err(e) => {
            debug!(item = %item.id, isbn = raw, error = %e, "skipping ISBN-based candidates");
            return Vec::new();
        }
    };
    generate_for_forms(&forms)
}

fn generate_for_forms(forms: &IsbnForms) -> Vec<String> {
    let mut urls = Vec::new();
    if let Some(isbn13) = &forms.isbn13 {
        for p in PROVIDERS.iter().filter(|p| p.accepts == IsbnForm::Both) {
            urls.push(p.template.replace("{isbn}", isbn13));
        }
    }
    if let Some(isbn10) = &forms.isbn10 {
        for p in PROVIDERS {
            urls.push(p.template.replace("{isbn}", isbn10));
        }
    }
    urls
}

/// Clean a supplied URL.
///
/// Trims whitespace, upgrades protocol-relative and plain `http://` URLs
/// to `https://`, and drops anything that is not an absolute HTTP(S) URL.
pub fn clean_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upgraded = if let Some(rest) = trimmed.strip_prefix("//") {
        format!("https://{}", rest)
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("https://{}", rest)
    } else {
        trimmed.to_string()
    };
    let parsed = url::Url::parse(&upgraded).ok()?;
    if parsed.scheme() != "https" || parsed.host_str().is_none() {
        return None;
    }
    Some(upgraded)
}

/// Merge, deduplicate, score, and order an item's candidates.
///
/// Merge order is primary URL, generated URLs, then fallbacks. The first
/// occurrence of a URL wins. The sort is stable, so equal scores keep
/// merge order.
pub fn build_candidates(item: &CatalogItem, policy: &HostPolicyTable) -> Vec<Candidate> {
    let primary = item
        .primary_image_url
        .iter()
        .filter_map(|u| clean_url(u))
        .map(|u| (u, CandidateSource::Supplied));
    let generated = generate(item)
        .into_iter()
        .map(|u| (u, CandidateSource::Generated));
    let fallbacks = item
        .fallback_urls
        .iter()
        .filter_map(|u| clean_url(u))
        .map(|u| (u, CandidateSource::Supplied));
    let merged = primary.chain(generated).chain(fallbacks);

    let mut seen = std::collections::HashSet::new();
    let mut candidates: Vec<Candidate> = merged
        .filter(|(url, _)| seen.insert(url.clone()))
        .map(|(url, source)| Candidate {
            score: policy.score(&url),
            url,
            source,
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}
