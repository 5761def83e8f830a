//! Catalog supplier: loads [`CatalogItem`]s from a JSON file.
//!
//! Accepts either a bare array of items or an object with an `items`
//! array, which is the shape the document-store export writes.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::models::CatalogItem;

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Items(Vec<CatalogItem>),
    Wrapped { items: Vec<CatalogItem> },
}

pub fn load_catalog(path: &Path) -> Result<Vec<CatalogItem>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;
    parse_catalog(&content)
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))
}

pub fn parse_catalog(content: &str) -> Result<Vec<CatalogItem>> {
    let items = match serde_json::from_str(content)? {
        CatalogFile::Items(items) => items,
        CatalogFile::Wrapped { items } => items,
    };

    let mut seen = HashSet::new();
    for item in &items {
        if item.id.trim().is_empty() {
            bail!("catalog item '{}' has an empty id", item.title);
        }
        if !seen.insert(item.id.as_str()) {
            bail!("duplicate catalog id: {}", item.id);
        }
    }
    Ok(items)
}

pub fn find_item<'a>(items: &'a [CatalogItem], id: &str) -> Option<&'a CatalogItem> {
    items.iter().find(|item| item.id == id)
}
