//! Durable cache storage seam.

use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ImportError;
use crate::types::GlobalRecipe;

/// Storage for cached recipe entries. Rows are insert-only; the only
/// permitted mutation is refreshing an entry's fetch timestamp.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The current entry for a normalized URL: the most recently
    /// updated row, which by construction is the head of its
    /// supersession chain.
    async fn find_current(&self, normalized_url: &str)
        -> Result<Option<GlobalRecipe>, ImportError>;

    async fn insert(&self, entry: GlobalRecipe) -> Result<GlobalRecipe, ImportError>;

    /// Refresh the freshness clock of an entry without changing content.
    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ImportError>;
}

/// In-memory store backing tests and database-less runs.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<GlobalRecipe>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every row, newest insert last. Test helper.
    pub fn all(&self) -> Vec<GlobalRecipe> {
        self.rows.read().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn find_current(
        &self,
        normalized_url: &str,
    ) -> Result<Option<GlobalRecipe>, ImportError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| ImportError::Store(e.to_string()))?;
        Ok(rows
            .iter()
            .filter(|r| r.source_url_normalized == normalized_url)
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn insert(&self, entry: GlobalRecipe) -> Result<GlobalRecipe, ImportError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| ImportError::Store(e.to_string()))?;
        rows.push(entry.clone());
        Ok(entry)
    }

    async fn touch(&self, id: Uuid, now: DateTime<Utc>) -> Result<(), ImportError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| ImportError::Store(e.to_string()))?;
        let row = rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ImportError::Store(format!("no cache entry with id {}", id)))?;
        row.last_fetched_at = Some(now);
        row.updated_at = now;
        Ok(())
    }
}
