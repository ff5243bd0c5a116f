//! JSONL-backed content source.
//!
//! The engine treats content as external; the CLI feeds it from a JSON
//! Lines export, one item per line:
//!
//! ```json
//! {"id": 1, "type": "post", "title": "...", "body": "...", "published": true}
//! ```
//!
//! Unpublished items are invisible: they are excluded from `resolve_items`
//! and read as vanished from `fetch_item`, which routes them to removal
//! during sync.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tessera_core::{AppError, ContentItem, ContentSource, ItemRef};

#[derive(Debug, Clone, Deserialize)]
struct ItemLine {
    id: i64,
    #[serde(rename = "type", default = "default_item_type")]
    item_type: String,
    title: String,
    body: String,
    #[serde(default = "default_content_type")]
    content_type: String,
    #[serde(default = "Utc::now")]
    modified_at: DateTime<Utc>,
    #[serde(default = "default_published")]
    published: bool,
}

fn default_item_type() -> String {
    "post".to_string()
}

fn default_content_type() -> String {
    "text/plain".to_string()
}

fn default_published() -> bool {
    true
}

/// Content source backed by a JSONL export file, loaded once at startup.
#[derive(Debug)]
pub struct JsonlContentSource {
    items: BTreeMap<i64, ItemLine>,
}

impl JsonlContentSource {
    /// Loads every item line from the file. Blank lines are skipped; a
    /// malformed line is a hard error with its line number.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Failed to read content file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let mut items = BTreeMap::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let item: ItemLine = serde_json::from_str(line).map_err(|e| {
                AppError::Config(format!(
                    "Invalid item on line {} of '{}': {}",
                    index + 1,
                    path.display(),
                    e
                ))
            })?;
            items.insert(item.id, item);
        }

        Ok(Self { items })
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}

impl ContentSource for JsonlContentSource {
    async fn resolve_items(&self, content_filter: Option<&str>) -> Result<Vec<ItemRef>, AppError> {
        let types: Option<Vec<&str>> = content_filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| f.split(',').map(str::trim).collect());

        Ok(self
            .items
            .values()
            .filter(|item| item.published)
            .filter(|item| {
                types
                    .as_ref()
                    .is_none_or(|t| t.contains(&item.item_type.as_str()))
            })
            .map(|item| ItemRef::new(item.id, item.item_type.clone()))
            .collect())
    }

    async fn fetch_item(&self, item: &ItemRef) -> Result<Option<ContentItem>, AppError> {
        Ok(self
            .items
            .get(&item.id)
            .filter(|line| line.published)
            .map(|line| ContentItem {
                title: line.title.clone(),
                body: line.body.clone(),
                content_type: line.content_type.clone(),
                modified_at: line.modified_at,
            }))
    }
}
