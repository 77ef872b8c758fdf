use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::RecordBackend;
use crate::error::StoreError;
use crate::record::{Record, RecordFilters, RecordKey, RecordPatch};

/// In-process backend for local runs and tests.
///
/// Records are ordered by (partition, sort) key, so scans and the
/// sort-key-only lookup are deterministic.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: RwLock<BTreeMap<RecordKey, Record>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate from an iterator of records, later keys overwriting earlier ones
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let records = records.into_iter().map(|r| (r.key(), r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn find_by_sort_key(&self, sort_key: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.sort_key == sort_key)
            .cloned())
    }

    async fn query_partition(
        &self,
        partition_key: &str,
        filters: &RecordFilters,
        limit: u32,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.partition_key == partition_key && filters.matches(r))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn scan(&self, filters: &RecordFilters, limit: u32) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| filters.matches(r))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn put(&self, record: &Record) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.key(), record.clone());
        Ok(())
    }

    async fn update(
        &self,
        key: &RecordKey,
        patch: &RecordPatch,
    ) -> Result<Option<Record>, StoreError> {
        let mut records = self.records.write().await;
        Ok(records.get_mut(key).map(|record| {
            patch.apply(record);
            record.clone()
        }))
    }
}
