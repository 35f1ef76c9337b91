//! Persistence seams for the trust engine and the share gate.
//!
//! The engines only ever talk to these traits. [`MemoryStore`] backs tests
//! and throwaway instances; [`crate::Database`] is the SQLite implementation.

mod memory;

use std::fmt::Debug;

use async_trait::async_trait;
use common::crypto::{Salt, StoredHash};
use time::OffsetDateTime;
use uuid::Uuid;

pub use memory::MemoryStore;

use crate::share::ShareRecord;

/// A registered user and their server-side credential hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: Uuid,
    pub username: String,
    /// `Argon2id(password || pepper, salt)` with its salt and parameters
    pub password_hash: StoredHash,
    /// salt the client derives its master key with; never used server side
    pub kdf_salt: Salt,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A server-side refresh token. Only the hash of the raw value is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// lowercase hex SHA-256 of the raw token
    pub token_hash: String,
    pub expires_at: OffsetDateTime,
    pub revoked: bool,
    pub created_at: OffsetDateTime,
    pub revoked_at: Option<OffsetDateTime>,
    pub revoked_reason: Option<RefreshRevocation>,
}

/// Why a refresh token stopped being usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshRevocation {
    /// Exchanged for a new pair. Seeing it again means it was copied.
    Rotated,
    Logout,
    /// Swept up when a rotated token of the same user was replayed.
    Replay,
}

impl RefreshRevocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshRevocation::Rotated => "rotated",
            RefreshRevocation::Logout => "logout",
            RefreshRevocation::Replay => "replay",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "rotated" => Some(RefreshRevocation::Rotated),
            "logout" => Some(RefreshRevocation::Logout),
            "replay" => Some(RefreshRevocation::Replay),
            _ => None,
        }
    }
}

/// Rows removed by one pruning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub revoked_access_tokens: u64,
    pub refresh_tokens: u64,
}

#[async_trait]
pub trait CredentialStore: Send + Sync + Debug {
    /// Insert a new credential. A taken username is [`StoreError::Conflict`].
    async fn insert_credential(&self, credential: &Credential) -> Result<(), StoreError>;

    async fn credential_by_username(&self, username: &str)
        -> Result<Option<Credential>, StoreError>;

    async fn credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError>;

    /// Replace the password hash, e.g. after a parameter upgrade.
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &StoredHash,
        updated_at: OffsetDateTime,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TokenStore: Send + Sync + Debug {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    async fn refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Mark one refresh token revoked.
    ///
    /// Returns `true` only for the call that flipped it, so two racing
    /// exchanges of the same token cannot both succeed.
    async fn revoke_refresh_token(
        &self,
        id: Uuid,
        at: OffsetDateTime,
        reason: RefreshRevocation,
    ) -> Result<bool, StoreError>;

    /// Revoke every live refresh token of a user. Returns how many flipped.
    async fn revoke_user_refresh_tokens(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        reason: RefreshRevocation,
    ) -> Result<u64, StoreError>;

    /// Add an access token id to the revocation set until `expires_at`.
    async fn revoke_access_token(
        &self,
        jti: Uuid,
        expires_at: OffsetDateTime,
        reason: &str,
    ) -> Result<(), StoreError>;

    async fn is_access_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError>;

    /// Drop revocation entries and refresh tokens whose expiry is before `now`.
    async fn prune_expired(&self, now: OffsetDateTime) -> Result<PruneReport, StoreError>;
}

#[async_trait]
pub trait ShareStore: Send + Sync + Debug {
    async fn insert_share(&self, share: &ShareRecord) -> Result<(), StoreError>;

    async fn share(&self, id: Uuid) -> Result<Option<ShareRecord>, StoreError>;

    async fn shares_by_owner(&self, owner_id: Uuid) -> Result<Vec<ShareRecord>, StoreError>;

    /// Compare-and-increment the view counter.
    ///
    /// Succeeds only if the share is still active and its counter still reads
    /// `expected_views`; otherwise nothing changes and `false` is returned.
    async fn consume_view(
        &self,
        id: Uuid,
        expected_views: i64,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Soft-delete: clear `is_active`. Returns `false` if it was already clear.
    async fn deactivate_share(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
