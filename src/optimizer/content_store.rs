//! Content items and the stores that hold them
//!
//! The optimizer only reads and writes whole items through [`ContentStore`];
//! when to persist is always the caller's decision.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::errors::OptimizeResult;
use crate::storage::{StoreError, StoreResult};

/// Item type used when a catalog entry does not name one
pub const DEFAULT_ITEM_TYPE: &str = "product";

/// Status of items visible to visitors
pub const PUBLISHED_STATUS: &str = "publish";

fn default_item_type() -> String {
    DEFAULT_ITEM_TYPE.to_string()
}

fn default_status() -> String {
    PUBLISHED_STATUS.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: u64,
    #[serde(default = "default_item_type")]
    pub item_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub title: String,
    /// Full description HTML
    #[serde(default)]
    pub content: String,
    /// Short description
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>) -> Self {
        Self {
            id,
            item_type: default_item_type(),
            status: default_status(),
            title: title.into(),
            content: String::new(),
            excerpt: String::new(),
            metadata: BTreeMap::new(),
            modified_at: None,
        }
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    #[must_use]
    pub fn with_item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = item_type.into();
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Metadata value, `None` when missing or blank
    #[must_use]
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }
}

/// Selection for [`ContentStore::list_items`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub item_type: Option<String>,
    pub status: Option<String>,
    pub limit: Option<usize>,
}

impl ItemFilter {
    /// Published items of one type
    #[must_use]
    pub fn published(item_type: impl Into<String>) -> Self {
        Self {
            item_type: Some(item_type.into()),
            status: Some(PUBLISHED_STATUS.to_string()),
            limit: None,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, item: &ContentItem) -> bool {
        self.item_type.as_ref().is_none_or(|t| *t == item.item_type)
            && self.status.as_ref().is_none_or(|s| *s == item.status)
    }

    /// Keep matching items, newest first (unmodified items last, then by id
    /// descending), truncated to the limit
    fn select(&self, items: impl IntoIterator<Item = ContentItem>) -> Vec<ContentItem> {
        let mut selected: Vec<ContentItem> =
            items.into_iter().filter(|item| self.matches(item)).collect();
        selected.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

pub trait ContentStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage fails.
    fn get_content(&self, id: u64) -> OptimizeResult<Option<ContentItem>>;

    /// Insert or replace an item
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage fails.
    fn save_content(&self, item: &ContentItem) -> OptimizeResult<()>;

    /// # Errors
    ///
    /// Returns an error if the backing storage fails.
    fn list_items(&self, filter: &ItemFilter) -> OptimizeResult<Vec<ContentItem>>;
}

#[derive(Debug, Default)]
pub struct MemoryContentStore {
    items: DashMap<u64, ContentItem>,
}

impl MemoryContentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = ContentItem>) -> Self {
        let store = Self::new();
        for item in items {
            store.items.insert(item.id, item);
        }
        store
    }
}

impl ContentStore for MemoryContentStore {
    fn get_content(&self, id: u64) -> OptimizeResult<Option<ContentItem>> {
        Ok(self.items.get(&id).map(|entry| entry.value().clone()))
    }

    fn save_content(&self, item: &ContentItem) -> OptimizeResult<()> {
        self.items.insert(item.id, item.clone());
        Ok(())
    }

    fn list_items(&self, filter: &ItemFilter) -> OptimizeResult<Vec<ContentItem>> {
        Ok(filter.select(self.items.iter().map(|entry| entry.value().clone())))
    }
}

/// Catalog kept as a JSON array of items in one file
#[derive(Debug)]
pub struct JsonCatalogStore {
    path: PathBuf,
    guard: Mutex<()>,
}

impl JsonCatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_items(&self) -> StoreResult<Vec<ContentItem>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn write_items(&self, items: &[ContentItem]) -> StoreResult<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        let mut temp_file = NamedTempFile::new_in(&parent)?;
        serde_json::to_writer_pretty(&mut temp_file, items)?;
        temp_file.write_all(b"\n")?;
        temp_file.as_file().sync_all()?;
        temp_file.persist(&self.path).map_err(StoreError::from)?;
        Ok(())
    }
}

impl ContentStore for JsonCatalogStore {
    fn get_content(&self, id: u64) -> OptimizeResult<Option<ContentItem>> {
        let _guard = self.guard.lock();
        Ok(self.read_items()?.into_iter().find(|item| item.id == id))
    }

    fn save_content(&self, item: &ContentItem) -> OptimizeResult<()> {
        let _guard = self.guard.lock();
        let mut items = self.read_items()?;
        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        self.write_items(&items)?;
        Ok(())
    }

    fn list_items(&self, filter: &ItemFilter) -> OptimizeResult<Vec<ContentItem>> {
        let _guard = self.guard.lock();
        Ok(filter.select(self.read_items()?))
    }
}
