use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use common::crypto::StoredHash;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    Credential, CredentialStore, PruneReport, RefreshRevocation, RefreshTokenRecord, ShareStore,
    StoreError, TokenStore,
};
use crate::share::ShareRecord;

/// In-memory store using HashMaps
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    credentials: HashMap<Uuid, Credential>,
    /// username -> credential id
    usernames: HashMap<String, Uuid>,
    refresh_tokens: HashMap<Uuid, RefreshTokenRecord>,
    /// jti -> expiry of the revoked access token
    revoked_access_tokens: HashMap<Uuid, OffsetDateTime>,
    shares: HashMap<Uuid, ShareRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>, StoreError> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.usernames.contains_key(&credential.username) {
            return Err(StoreError::Conflict(format!(
                "username {} already exists",
                credential.username
            )));
        }
        inner
            .usernames
            .insert(credential.username.clone(), credential.id);
        inner.credentials.insert(credential.id, credential.clone());
        Ok(())
    }

    async fn credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        let inner = self.read()?;
        Ok(inner
            .usernames
            .get(username)
            .and_then(|id| inner.credentials.get(id))
            .cloned())
    }

    async fn credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        Ok(self.read()?.credentials.get(&id).cloned())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &StoredHash,
        updated_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        let credential = inner
            .credentials
            .get_mut(&id)
            .ok_or_else(|| StoreError::Conflict(format!("no credential {}", id)))?;
        credential.password_hash = password_hash.clone();
        credential.updated_at = updated_at;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        self.write()?.refresh_tokens.insert(record.id, record.clone());
        Ok(())
    }

    async fn refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        Ok(self
            .read()?
            .refresh_tokens
            .values()
            .find(|record| record.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_refresh_token(
        &self,
        id: Uuid,
        at: OffsetDateTime,
        reason: RefreshRevocation,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.refresh_tokens.get_mut(&id) {
            Some(record) if !record.revoked => {
                record.revoked = true;
                record.revoked_at = Some(at);
                record.revoked_reason = Some(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_user_refresh_tokens(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        reason: RefreshRevocation,
    ) -> Result<u64, StoreError> {
        let mut inner = self.write()?;
        let mut flipped = 0;
        for record in inner
            .refresh_tokens
            .values_mut()
            .filter(|record| record.user_id == user_id && !record.revoked)
        {
            record.revoked = true;
            record.revoked_at = Some(at);
            record.revoked_reason = Some(reason);
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn revoke_access_token(
        &self,
        jti: Uuid,
        expires_at: OffsetDateTime,
        _reason: &str,
    ) -> Result<(), StoreError> {
        self.write()?.revoked_access_tokens.insert(jti, expires_at);
        Ok(())
    }

    async fn is_access_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        Ok(self.read()?.revoked_access_tokens.contains_key(&jti))
    }

    async fn prune_expired(&self, now: OffsetDateTime) -> Result<PruneReport, StoreError> {
        let mut inner = self.write()?;

        let before = inner.revoked_access_tokens.len();
        inner
            .revoked_access_tokens
            .retain(|_, expires_at| *expires_at >= now);
        let revoked_access_tokens = (before - inner.revoked_access_tokens.len()) as u64;

        let before = inner.refresh_tokens.len();
        inner
            .refresh_tokens
            .retain(|_, record| record.expires_at >= now);
        let refresh_tokens = (before - inner.refresh_tokens.len()) as u64;

        Ok(PruneReport {
            revoked_access_tokens,
            refresh_tokens,
        })
    }
}

#[async_trait]
impl ShareStore for MemoryStore {
    async fn insert_share(&self, share: &ShareRecord) -> Result<(), StoreError> {
        let mut inner = self.write()?;
        if inner.shares.contains_key(&share.id) {
            return Err(StoreError::Conflict(format!("share {} already exists", share.id)));
        }
        inner.shares.insert(share.id, share.clone());
        Ok(())
    }

    async fn share(&self, id: Uuid) -> Result<Option<ShareRecord>, StoreError> {
        Ok(self.read()?.shares.get(&id).cloned())
    }

    async fn shares_by_owner(&self, owner_id: Uuid) -> Result<Vec<ShareRecord>, StoreError> {
        let mut shares: Vec<ShareRecord> = self
            .read()?
            .shares
            .values()
            .filter(|share| share.owner_id == owner_id)
            .cloned()
            .collect();
        shares.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(shares)
    }

    async fn consume_view(
        &self,
        id: Uuid,
        expected_views: i64,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.shares.get_mut(&id) {
            Some(share) if share.is_active && share.current_views == expected_views => {
                share.current_views += 1;
                share.last_accessed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate_share(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.write()?;
        match inner.shares.get_mut(&id) {
            Some(share) if share.is_active => {
                share.is_active = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use common::crypto::{Envelope, KdfParams, Salt};
    use time::Duration;

    fn at(secs: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(secs).unwrap()
    }

    fn credential(username: &str) -> Credential {
        Credential {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: StoredHash::unmatchable(&KdfParams::default()),
            kdf_salt: Salt::from([3u8; 16]),
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[tokio::test]
    async fn test_usernames_are_unique() {
        let store = MemoryStore::new();
        store.insert_credential(&credential("alice")).await.unwrap();
        assert!(matches!(
            store.insert_credential(&credential("alice")).await,
            Err(StoreError::Conflict(_))
        ));
        assert!(store
            .credential_by_username("alice")
            .await
            .unwrap()
            .is_some());
        assert!(store.credential_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_refresh_revoke_flips_once() {
        let store = MemoryStore::new();
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token_hash: "ab".repeat(32),
            expires_at: at(100),
            revoked: false,
            created_at: at(0),
            revoked_at: None,
            revoked_reason: None,
        };
        store.insert_refresh_token(&record).await.unwrap();

        assert!(store
            .revoke_refresh_token(record.id, at(1), RefreshRevocation::Rotated)
            .await
            .unwrap());
        assert!(!store
            .revoke_refresh_token(record.id, at(2), RefreshRevocation::Logout)
            .await
            .unwrap());
        let stored = store
            .refresh_token_by_hash(&record.token_hash)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.revoked);
        assert_eq!(stored.revoked_at, Some(at(1)));
        assert_eq!(stored.revoked_reason, Some(RefreshRevocation::Rotated));
    }

    #[tokio::test]
    async fn test_prune_drops_only_expired() {
        let store = MemoryStore::new();
        let live = Uuid::new_v4();
        let dead = Uuid::new_v4();
        store.revoke_access_token(live, at(200), "logout").await.unwrap();
        store.revoke_access_token(dead, at(50), "logout").await.unwrap();

        let report = store.prune_expired(at(100)).await.unwrap();
        assert_eq!(report.revoked_access_tokens, 1);
        assert!(store.is_access_token_revoked(live).await.unwrap());
        assert!(!store.is_access_token_revoked(dead).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_view_is_compare_and_swap() {
        let store = MemoryStore::new();
        let share = ShareRecord {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            envelope: Envelope::from_bytes(vec![1u8; 28]),
            key: None,
            expires_at: Some(at(0) + Duration::hours(1)),
            max_views: Some(1),
            current_views: 0,
            access_hash: None,
            is_active: true,
            created_at: at(0),
            last_accessed_at: None,
        };
        store.insert_share(&share).await.unwrap();

        assert!(store.consume_view(share.id, 0, at(5)).await.unwrap());
        assert!(!store.consume_view(share.id, 0, at(6)).await.unwrap());

        let stored = store.share(share.id).await.unwrap().unwrap();
        assert_eq!(stored.current_views, 1);
        assert_eq!(stored.last_accessed_at, Some(at(5)));

        assert!(store.deactivate_share(share.id).await.unwrap());
        assert!(!store.deactivate_share(share.id).await.unwrap());
        assert!(!store.consume_view(share.id, 1, at(7)).await.unwrap());
    }
}
