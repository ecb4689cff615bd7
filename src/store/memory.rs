//! In-memory catalog store
//!
//! Reference implementation of the [`CatalogStore`] seam, used by the CLI
//! and the test suite. The mutex scope is the transaction unit: deletion
//! of the prior row and insertion of the new one happen under a single
//! lock acquisition, so no reader ever observes the key missing between
//! the two.

use crate::core::metadata::ModuleKey;
use crate::core::traits::{CatalogStore, VersionRecord};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use tokio::sync::Mutex;

type VersionKey = (ModuleKey, String);

/// [`CatalogStore`] over a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryCatalogStore {
    rows: Mutex<HashMap<VersionKey, VersionRecord>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored version rows
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Fetch a copy of a stored row
    pub async fn get(&self, module: &ModuleKey, version: &str) -> Option<VersionRecord> {
        self.rows
            .lock()
            .await
            .get(&(module.clone(), version.to_string()))
            .cloned()
    }

    /// Flip the publish approval flag on an existing row
    ///
    /// This is the registry-side action the pipeline itself never performs;
    /// it exists so re-publication behavior can be exercised.
    pub async fn set_published(&self, module: &ModuleKey, version: &str) -> bool {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&(module.clone(), version.to_string())) {
            Some(record) => {
                record.published = true;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn replace_version(&self, record: &VersionRecord) -> anyhow::Result<bool> {
        // One lock scope covers both the delete and the insert
        let mut rows = self.rows.lock().await;
        let key = (record.module.clone(), record.version.clone());
        let previous_published = rows
            .remove(&key)
            .map(|previous| previous.published)
            .unwrap_or(false);
        rows.insert(key, record.clone());
        debug!(
            "catalog row replaced: {} {} (previous published: {})",
            record.module, record.version, previous_published
        );
        Ok(previous_published)
    }
}
