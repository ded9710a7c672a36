//! In-memory cache of directory user records keyed by distinguished name.
//!
//! Thread-safe with many concurrent readers and serialized writers; records
//! and rebuild metadata only ever change together under one write lock, so
//! a reader never observes metadata describing a different record set.
//! Nothing here is persisted; the cache is rebuilt from the directory on
//! each process start.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::error::{LdapCacheError, LdapCacheResult};
use crate::model::{CacheMetadata, CacheSnapshot, DirectoryUserRecord};

#[derive(Debug, Default)]
struct CacheInner {
    records: HashMap<String, Arc<DirectoryUserRecord>>,
    metadata: Option<CacheMetadata>,
    /// Approximate heap footprint of the previous committed record set,
    /// used to report the rebuild's memory delta.
    approx_bytes: i64,
}

/// Thread-safe cache store.
///
/// Cheap to clone; all clones share the same underlying snapshot. Created
/// empty at startup, replaced wholesale by [`UserCache::rebuild`] and
/// patched record-by-record by the mutation synchronizer.
#[derive(Clone, Default)]
pub struct UserCache {
    inner: Arc<RwLock<CacheInner>>,
}

impl UserCache {
    /// Create an empty, uninitialized cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entire snapshot atomically.
    ///
    /// A zero-record rebuild is a failure ("cache not initialized" stays
    /// observable) and preserves any previously committed snapshot.
    pub async fn rebuild(
        &self,
        records: Vec<DirectoryUserRecord>,
        status: u32,
        started: Instant,
    ) -> LdapCacheResult<CacheMetadata> {
        if records.is_empty() {
            warn!("Rejecting cache rebuild with zero records");
            return Err(LdapCacheError::build_failed(
                "rebuild observed zero records",
            ));
        }

        let mut map = HashMap::with_capacity(records.len());
        let mut bytes = 0i64;
        for record in records {
            bytes += record.approx_bytes() as i64;
            map.insert(record.dn.clone(), Arc::new(record));
        }

        let mut inner = self.inner.write().await;
        let metadata = CacheMetadata {
            last_update: Utc::now(),
            total_users: map.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
            memory_bytes_delta: bytes - inner.approx_bytes,
            last_status: status,
        };
        inner.records = map;
        inner.approx_bytes = bytes;
        inner.metadata = Some(metadata.clone());

        info!(
            "Cache rebuilt: {} users in {} ms (status {})",
            metadata.total_users, metadata.elapsed_ms, metadata.last_status
        );
        Ok(metadata)
    }

    /// Insert or replace one record by its DN.
    ///
    /// Applied only against a committed snapshot: on an uninitialized cache
    /// this is a no-op (the next rebuild picks the record up anyway).
    /// Ordering against a concurrent rebuild's fetch window is the
    /// caller's job; the service facade serializes mutations and rebuilds
    /// under one lock.
    pub async fn upsert(&self, record: DirectoryUserRecord) {
        let mut inner = self.inner.write().await;
        if inner.metadata.is_none() {
            warn!(
                "Dropping upsert of {} on uninitialized cache",
                record.dn
            );
            return;
        }

        let bytes = record.approx_bytes() as i64;
        if let Some(old) = inner.records.insert(record.dn.clone(), Arc::new(record)) {
            inner.approx_bytes -= old.approx_bytes() as i64;
        }
        inner.approx_bytes += bytes;
        let total = inner.records.len();
        if let Some(meta) = inner.metadata.as_mut() {
            meta.total_users = total;
        }
        debug!("Cache upsert committed ({total} users)");
    }

    /// Remove a record by DN. Idempotent; absent keys are not an error.
    pub async fn remove(&self, dn: &str) {
        let mut inner = self.inner.write().await;
        if inner.metadata.is_none() {
            return;
        }
        if let Some(old) = inner.records.remove(dn) {
            inner.approx_bytes -= old.approx_bytes() as i64;
            let total = inner.records.len();
            if let Some(meta) = inner.metadata.as_mut() {
                meta.total_users = total;
            }
            debug!("Cache removed {dn} ({total} users)");
        }
    }

    /// Coherent read-only view for the query engine.
    ///
    /// Fails with [`LdapCacheError::CacheNotInitialized`] before the first
    /// successful rebuild.
    pub async fn snapshot(&self) -> LdapCacheResult<CacheSnapshot> {
        let inner = self.inner.read().await;
        let metadata = inner
            .metadata
            .clone()
            .ok_or(LdapCacheError::CacheNotInitialized)?;
        Ok(CacheSnapshot {
            records: inner.records.clone(),
            metadata,
        })
    }

    /// Whether any rebuild has ever succeeded.
    pub async fn is_initialized(&self) -> bool {
        self.inner.read().await.metadata.is_some()
    }
}
