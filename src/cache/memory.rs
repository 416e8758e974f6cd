use super::{CacheRecord, CacheStore};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// In-process cache store backed by a `DashMap`.
#[derive(Clone, Debug)]
pub struct MemoryStore<E> {
    entries: Arc<DashMap<String, E>>,
    next_id: Arc<AtomicU64>,
}

impl<E: CacheRecord> MemoryStore<E> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<E: CacheRecord> Default for MemoryStore<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<E: CacheRecord> CacheStore<E> for MemoryStore<E> {
    async fn get(&self, key: &str) -> Result<Option<E>, StoreError> {
        Ok(self.entries.get(key).map(|entry| entry.clone()))
    }

    async fn upsert(&self, mut entry: E) -> Result<E, StoreError> {
        match self.entries.entry(entry.cache_key().to_string()) {
            Entry::Occupied(mut slot) => {
                if let Some(id) = slot.get().id() {
                    entry.set_id(id);
                }
                debug!("Updating {} record {}", E::KIND, slot.key());
                slot.insert(entry.clone());
            }
            Entry::Vacant(slot) => {
                if entry.id().is_none() {
                    entry.set_id(self.next_id.fetch_add(1, Ordering::Relaxed));
                }
                debug!("Inserting {} record {}", E::KIND, slot.key());
                slot.insert(entry.clone());
            }
        }
        Ok(entry)
    }

    async fn all(&self) -> Result<Vec<E>, StoreError> {
        let mut records: Vec<E> = self.entries.iter().map(|e| e.value().clone()).collect();
        records.sort_by_key(|r| r.id());
        Ok(records)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.entries.len() as u64)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let mut removed = 0;
        self.entries.retain(|_, _| {
            removed += 1;
            false
        });
        Ok(removed)
    }
}
