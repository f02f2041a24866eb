// WHY: Adaptation history lives behind an explicit store interface owned by the boundary
// The engine never touches storage; records are stamped here, not in the core

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::AdaptationResult;

/// Default history file name used by the CLI
pub const DEFAULT_HISTORY_FILE: &str = ".plainspeak_history.json";

/// Adaptation result with its record id and creation timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredAdaptation {
    pub id: String,
    #[serde(flatten)]
    pub result: AdaptationResult,
    pub created_at: DateTime<Utc>,
}

/// One page of a listing; `page` is 1-based
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Storage interface for adaptation history
pub trait AdaptationStore {
    /// Record a result, assigning its id and `created_at`
    fn save(&mut self, result: AdaptationResult) -> Result<StoredAdaptation>;

    /// List records newest first
    fn list(&self, page: usize, page_size: usize) -> Result<Page<StoredAdaptation>>;

    fn get(&self, id: &str) -> Result<Option<StoredAdaptation>>;

    /// Remove a record; returns whether anything was removed
    fn delete(&mut self, id: &str) -> Result<bool>;
}

/// In-process store, records kept in insertion order
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    records: Vec<StoredAdaptation>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AdaptationStore for MemoryStore {
    fn save(&mut self, result: AdaptationResult) -> Result<StoredAdaptation> {
        let record = StoredAdaptation {
            id: Uuid::new_v4().to_string(),
            result,
            created_at: Utc::now(),
        };
        debug!(id = %record.id, expressions = record.result.expressions.len(), "Saved adaptation");
        self.records.push(record.clone());
        Ok(record)
    }

    fn list(&self, page: usize, page_size: usize) -> Result<Page<StoredAdaptation>> {
        if page == 0 {
            bail!("Page numbers start at 1");
        }
        if page_size == 0 {
            bail!("Page size must be at least 1");
        }

        let total = self.records.len();
        let total_pages = total.div_ceil(page_size);
        let data = self
            .records
            .iter()
            .rev()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .cloned()
            .collect();

        Ok(Page {
            data,
            total,
            page,
            page_size,
            total_pages,
        })
    }

    fn get(&self, id: &str) -> Result<Option<StoredAdaptation>> {
        Ok(self.records.iter().find(|record| record.id == id).cloned())
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records.retain(|record| record.id != id);
        Ok(self.records.len() != before)
    }
}

/// JSON-file backed history
///
/// Mutations stay in memory until [`HistoryFile::persist`] is called.
#[derive(Debug)]
pub struct HistoryFile {
    path: PathBuf,
    store: MemoryStore,
}

impl HistoryFile {
    /// Load history from `path`; a missing file yields an empty history
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let store = match fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Corrupt history file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No history file at {}, starting empty", path.display());
                MemoryStore::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read history file {}", path.display()));
            }
        };

        info!("Loaded {} adaptation records from {}", store.len(), path.display());
        Ok(Self { path, store })
    }

    /// Write history as pretty JSON, creating parent directories
    pub async fn persist(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.store)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write history file {}", self.path.display()))?;
        debug!("Persisted {} records to {}", self.store.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl AdaptationStore for HistoryFile {
    fn save(&mut self, result: AdaptationResult) -> Result<StoredAdaptation> {
        self.store.save(result)
    }

    fn list(&self, page: usize, page_size: usize) -> Result<Page<StoredAdaptation>> {
        self.store.list(page, page_size)
    }

    fn get(&self, id: &str) -> Result<Option<StoredAdaptation>> {
        self.store.get(id)
    }

    fn delete(&mut self, id: &str) -> Result<bool> {
        self.store.delete(id)
    }
}
