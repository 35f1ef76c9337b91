//! The access-token revocation set and its read cache.
//!
//! Validation runs on every protected call, so lookups are cached for at
//! most the configured TTL. A revocation made through this process is
//! written to the cache immediately and is visible at once. A revocation made
//! by another process sharing the database becomes visible here within one
//! TTL.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use time::OffsetDateTime;
use uuid::Uuid;

use super::AuthError;
use crate::store::{PruneReport, TokenStore};

/// Cache size past which stale entries are swept on insert.
const SWEEP_THRESHOLD: usize = 4096;

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    revoked: bool,
    checked_at: Instant,
}

#[derive(Debug)]
pub struct RevocationCache {
    ttl: Duration,
    entries: Mutex<HashMap<Uuid, CacheEntry>>,
}

impl RevocationCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, jti: &Uuid) -> Option<bool> {
        let entries = self.entries.lock();
        entries
            .get(jti)
            .filter(|entry| entry.checked_at.elapsed() < self.ttl)
            .map(|entry| entry.revoked)
    }

    pub fn put(&self, jti: Uuid, revoked: bool) {
        if self.ttl.is_zero() {
            return;
        }
        let mut entries = self.entries.lock();
        if entries.len() >= SWEEP_THRESHOLD {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.checked_at.elapsed() < ttl);
        }
        entries.insert(
            jti,
            CacheEntry {
                revoked,
                checked_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct RevocationSet {
    store: Arc<dyn TokenStore>,
    cache: Arc<RevocationCache>,
}

impl RevocationSet {
    pub fn new(store: Arc<dyn TokenStore>, cache_ttl: Duration) -> Self {
        Self {
            store,
            cache: Arc::new(RevocationCache::new(cache_ttl)),
        }
    }

    pub async fn contains(&self, jti: Uuid) -> Result<bool, AuthError> {
        if let Some(revoked) = self.cache.get(&jti) {
            return Ok(revoked);
        }
        let revoked = self.store.is_access_token_revoked(jti).await?;
        self.cache.put(jti, revoked);
        Ok(revoked)
    }

    /// Add `jti` until `expires_at`, after which pruning may drop it.
    pub async fn insert(
        &self,
        jti: Uuid,
        expires_at: OffsetDateTime,
        reason: &str,
    ) -> Result<(), AuthError> {
        self.store.revoke_access_token(jti, expires_at, reason).await?;
        self.cache.put(jti, true);
        tracing::info!(jti = %jti, reason, "access token revoked");
        Ok(())
    }

    pub async fn prune(&self, now: OffsetDateTime) -> Result<PruneReport, AuthError> {
        Ok(self.store.prune_expired(now).await?)
    }

    pub fn cache(&self) -> &RevocationCache {
        &self.cache
    }
}
