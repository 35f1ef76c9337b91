//! Bounded execution of password hashing.
//!
//! Each Argon2id call holds tens of megabytes for its whole run. Jobs wait
//! on a semaphore before they are handed to tokio's blocking threads, so a
//! login flood queues up instead of growing memory without bound.

use std::sync::Arc;

use common::crypto::{CryptoError, KdfParams, StoredHash};
use tokio::sync::Semaphore;
use zeroize::Zeroizing;

#[derive(Debug, Clone)]
pub struct KdfPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl KdfPool {
    pub fn new(max_concurrent: usize) -> Self {
        let size = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a permit is free.
    pub async fn run<F, T>(&self, job: F) -> Result<T, KdfPoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| KdfPoolError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|e| KdfPoolError::WorkerFailed(e.to_string()))
    }

    /// Hash a new credential.
    pub async fn hash(
        &self,
        password: Zeroizing<String>,
        pepper: Option<Zeroizing<Vec<u8>>>,
        params: KdfParams,
    ) -> Result<StoredHash, KdfPoolError> {
        let hash = self
            .run(move || {
                StoredHash::create(
                    password.as_bytes(),
                    pepper.as_ref().map(|p| p.as_slice()),
                    &params,
                )
            })
            .await??;
        Ok(hash)
    }

    /// Verify a password against a stored hash.
    pub async fn verify(
        &self,
        stored: StoredHash,
        password: Zeroizing<String>,
        pepper: Option<Zeroizing<Vec<u8>>>,
    ) -> Result<bool, KdfPoolError> {
        let ok = self
            .run(move || stored.verify(password.as_bytes(), pepper.as_ref().map(|p| p.as_slice())))
            .await??;
        Ok(ok)
    }

    /// Stop handing out permits. Queued and future jobs fail with [`KdfPoolError::Closed`].
    pub fn close(&self) {
        self.permits.close();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum KdfPoolError {
    #[error("kdf pool is closed")]
    Closed,
    #[error("kdf worker failed: {0}")]
    WorkerFailed(String),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}
