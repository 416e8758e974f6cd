use super::{CacheRecord, CacheStore};
use crate::error::StoreError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::info;

/// Keys scanned or fetched per round-trip.
const SCAN_BATCH: usize = 100;

/// Cache store persisted in Valkey/Redis as JSON strings.
///
/// Records live under `<prefix>:<kind>:rec:<key>` without a native expiry:
/// expired records must stay readable for degraded-mode fallback.
#[derive(Clone)]
pub struct ValkeyStore<E> {
    conn: ConnectionManager,
    prefix: String,
    _record: PhantomData<fn() -> E>,
}

impl<E: CacheRecord> ValkeyStore<E> {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected {} store to Valkey at {}", E::KIND, url);
        Ok(Self::with_connection(conn))
    }

    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self {
            conn,
            prefix: format!("tubeproxy:{}", E::KIND),
            _record: PhantomData,
        }
    }

    fn record_key(&self, key: &str) -> String {
        format!("{}:rec:{}", self.prefix, key)
    }

    fn sequence_key(&self) -> String {
        format!("{}:seq", self.prefix)
    }

    /// Collect every record key with cursor-based SCAN, each key once.
    async fn scan_keys(&self) -> Result<Vec<String>, StoreError> {
        let pattern = format!("{}:rec:*", self.prefix);
        let mut conn = self.conn.clone();
        let mut cursor: u64 = 0;
        let mut batches = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;
            batches.push(batch);
            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        Ok(unique_keys(batches))
    }
}

/// Flatten SCAN batches. SCAN may report a key more than once.
fn unique_keys(batches: Vec<Vec<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

#[async_trait]
impl<E: CacheRecord> CacheStore<E> for ValkeyStore<E> {
    async fn get(&self, key: &str) -> Result<Option<E>, StoreError> {
        let mut conn = self.conn.clone();
        let json: Option<String> = redis::cmd("GET")
            .arg(self.record_key(key))
            .query_async(&mut conn)
            .await?;
        json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
            .transpose()
    }

    async fn upsert(&self, mut entry: E) -> Result<E, StoreError> {
        let mut conn = self.conn.clone();

        let existing_id = self.get(entry.cache_key()).await?.and_then(|e| e.id());
        match existing_id {
            Some(id) => entry.set_id(id),
            None if entry.id().is_none() => {
                let id: u64 = redis::cmd("INCR")
                    .arg(self.sequence_key())
                    .query_async(&mut conn)
                    .await?;
                entry.set_id(id);
            }
            None => {}
        }

        let json = serde_json::to_string(&entry)?;
        redis::cmd("SET")
            .arg(self.record_key(entry.cache_key()))
            .arg(json)
            .query_async::<()>(&mut conn)
            .await?;
        Ok(entry)
    }

    async fn all(&self) -> Result<Vec<E>, StoreError> {
        let keys = self.scan_keys().await?;
        let mut conn = self.conn.clone();
        let mut records = Vec::with_capacity(keys.len());
        for chunk in keys.chunks(SCAN_BATCH) {
            let values: Vec<Option<String>> = redis::cmd("MGET")
                .arg(chunk)
                .query_async(&mut conn)
                .await?;
            // Keys deleted between SCAN and MGET come back as nil
            for json in values.into_iter().flatten() {
                records.push(serde_json::from_str::<E>(&json)?);
            }
        }
        records.sort_by_key(|r| r.id());
        Ok(records)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.scan_keys().await?.len() as u64)
    }

    async fn clear(&self) -> Result<u64, StoreError> {
        let keys = self.scan_keys().await?;
        let mut conn = self.conn.clone();
        let mut removed = 0u64;
        for chunk in keys.chunks(SCAN_BATCH) {
            let deleted: u64 = redis::cmd("DEL").arg(chunk).query_async(&mut conn).await?;
            removed += deleted;
        }
        Ok(removed)
    }
}
