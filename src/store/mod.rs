//! Record store adapter.
//!
//! Backends implement [`RecordBackend`] and report failures as [`StoreError`].
//! [`RecordStore`] wraps a backend and is the only thing the rest of the crate
//! talks to: it logs every backend failure and folds it into a typed outcome,
//! so callers can degrade instead of failing the whole request.

mod memory;
mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::record::{Record, RecordFilters, RecordKey, RecordPatch};

/// Raw storage operations over (partition, sort) keyed records.
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Exact point lookup
    async fn get(&self, key: &RecordKey) -> Result<Option<Record>, StoreError>;

    /// First record (in partition order) whose sort key matches, across all
    /// partitions. Cost is proportional to table size unless the backend
    /// indexes sort keys.
    async fn find_by_sort_key(&self, sort_key: &str) -> Result<Option<Record>, StoreError>;

    /// Records in one partition matching `filters`, at most `limit`
    async fn query_partition(
        &self,
        partition_key: &str,
        filters: &RecordFilters,
        limit: u32,
    ) -> Result<Vec<Record>, StoreError>;

    /// Records in any partition matching `filters`, at most `limit`
    async fn scan(&self, filters: &RecordFilters, limit: u32) -> Result<Vec<Record>, StoreError>;

    /// Upsert: an existing record with the same key is overwritten
    async fn put(&self, record: &Record) -> Result<(), StoreError>;

    /// Apply `patch` to an existing record and return the result, or `None`
    /// when the key does not exist. Never creates a record.
    async fn update(
        &self,
        key: &RecordKey,
        patch: &RecordPatch,
    ) -> Result<Option<Record>, StoreError>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Record),
    NotFound,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Records(Vec<Record>),
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    Updated(Record),
    NotFound,
    /// Nothing in the patch intersected the attribute whitelist
    NoOp,
    Unavailable,
}

/// Outcome-typed facade over a [`RecordBackend`]
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn RecordBackend>,
    page_size: u32,
}

impl RecordStore {
    pub fn new(backend: Arc<dyn RecordBackend>, page_size: u32) -> Self {
        Self {
            backend,
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub async fn get_by_key(&self, partition_key: &str, sort_key: &str) -> Lookup {
        let key = RecordKey::new(partition_key, sort_key);
        match self.backend.get(&key).await {
            Ok(Some(record)) => Lookup::Found(record),
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                warn!("Store lookup for {} failed: {}", key, e);
                Lookup::Unavailable
            }
        }
    }

    /// Resolve a record when only the sort key is known. First match wins;
    /// sort keys are not guaranteed unique across partitions.
    pub async fn get_by_sort_key(&self, sort_key: &str) -> Lookup {
        match self.backend.find_by_sort_key(sort_key).await {
            Ok(Some(record)) => Lookup::Found(record),
            Ok(None) => Lookup::NotFound,
            Err(e) => {
                warn!("Store scan for sort key '{}' failed: {}", sort_key, e);
                Lookup::Unavailable
            }
        }
    }

    pub async fn list_by_partition(&self, partition_key: &str, filters: &RecordFilters) -> Listing {
        match self
            .backend
            .query_partition(partition_key, filters, self.page_size)
            .await
        {
            Ok(records) => {
                debug!(
                    "Listed {} records in partition '{}'",
                    records.len(),
                    partition_key
                );
                Listing::Records(records)
            }
            Err(e) => {
                warn!("Store query for partition '{}' failed: {}", partition_key, e);
                Listing::Unavailable
            }
        }
    }

    pub async fn list_all(&self, filters: &RecordFilters) -> Listing {
        match self.backend.scan(filters, self.page_size).await {
            Ok(records) => {
                debug!("Listed {} records across partitions", records.len());
                Listing::Records(records)
            }
            Err(e) => {
                warn!("Store scan failed: {}", e);
                Listing::Unavailable
            }
        }
    }

    pub async fn insert(&self, record: &Record) -> WriteOutcome {
        match self.backend.put(record).await {
            Ok(()) => WriteOutcome::Written,
            Err(e) => {
                warn!("Store write for {} failed: {}", record.key(), e);
                WriteOutcome::Failed
            }
        }
    }

    pub async fn update_fields(
        &self,
        partition_key: &str,
        sort_key: &str,
        patch: &RecordPatch,
    ) -> UpdateOutcome {
        if patch.is_empty() {
            return UpdateOutcome::NoOp;
        }

        let key = RecordKey::new(partition_key, sort_key);
        match self.backend.update(&key, patch).await {
            Ok(Some(record)) => UpdateOutcome::Updated(record),
            Ok(None) => UpdateOutcome::NotFound,
            Err(e) => {
                warn!("Store update for {} failed: {}", key, e);
                UpdateOutcome::Unavailable
            }
        }
    }
}
