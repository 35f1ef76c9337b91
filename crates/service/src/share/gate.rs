use std::sync::Arc;

use common::crypto::{AccessHash, Envelope, SecretShare, NONCE_SIZE, TAG_SIZE};
use time::OffsetDateTime;
use uuid::Uuid;

use super::record::{evaluate, DenyReason, ShareRecord};
use super::ShareError;
use crate::clock::{Clock, SharedClock};
use crate::store::ShareStore;

/// Give up on a share after this many lost compare-and-increment races.
const MAX_CONSUME_ATTEMPTS: usize = 32;

/// What an owner hands the gate to create a share.
#[derive(Debug, Clone)]
pub struct NewShare {
    pub envelope: Envelope,
    pub key: Option<SecretShare>,
    pub expires_at: Option<OffsetDateTime>,
    pub max_views: Option<i64>,
    pub access_hash: Option<AccessHash>,
}

/// What a viewer gets back after passing the gate.
#[derive(Debug, Clone)]
pub struct SharedContent {
    pub share_id: Uuid,
    pub envelope: Envelope,
    pub key: Option<SecretShare>,
    pub views_remaining: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ShareGate {
    store: Arc<dyn ShareStore>,
    clock: SharedClock,
}

impl ShareGate {
    pub fn new(store: Arc<dyn ShareStore>, clock: SharedClock) -> Self {
        Self { store, clock }
    }

    pub async fn create(&self, owner_id: Uuid, new: NewShare) -> Result<ShareRecord, ShareError> {
        let now = self.clock.now();

        if new.envelope.len() < NONCE_SIZE + TAG_SIZE {
            return Err(ShareError::Validation(
                "envelope is shorter than nonce and tag".into(),
            ));
        }
        if let Some(max_views) = new.max_views {
            if max_views < 1 {
                return Err(ShareError::Validation("max_views must be at least 1".into()));
            }
        }
        let expires_at = new.expires_at.map(truncate);
        if let Some(expires_at) = expires_at {
            if expires_at <= now {
                return Err(ShareError::Validation("expires_at must be in the future".into()));
            }
        }

        let share = ShareRecord {
            id: Uuid::new_v4(),
            owner_id,
            envelope: new.envelope,
            key: new.key,
            expires_at,
            max_views: new.max_views,
            current_views: 0,
            access_hash: new.access_hash,
            is_active: true,
            created_at: truncate(now),
            last_accessed_at: None,
        };
        self.store.insert_share(&share).await?;

        tracing::info!(
            share_id = %share.id,
            owner_id = %owner_id,
            max_views = ?share.max_views,
            has_password = share.has_password(),
            "share created"
        );
        Ok(share)
    }

    /// Run the gate and consume one view.
    ///
    /// The view is taken with a compare-and-increment on the counter the gate
    /// just evaluated. Losing the race re-reads the share and evaluates again,
    /// so a share at its last view admits exactly one of any number of racers.
    pub async fn access(
        &self,
        share_id: Uuid,
        provided: Option<&AccessHash>,
    ) -> Result<SharedContent, ShareError> {
        for _ in 0..MAX_CONSUME_ATTEMPTS {
            let now = self.clock.now();
            let found = self.store.share(share_id).await?;
            let share = match evaluate(found.as_ref(), provided, now) {
                Ok(share) => share,
                Err(reason) => {
                    tracing::info!(share_id = %share_id, reason = ?reason, "share denied");
                    return Err(ShareError::Denied(reason));
                }
            };

            if self
                .store
                .consume_view(share.id, share.current_views, truncate(now))
                .await?
            {
                let views_remaining = share
                    .max_views
                    .map(|max_views| (max_views - share.current_views - 1).max(0));
                tracing::debug!(share_id = %share_id, views_remaining = ?views_remaining, "share viewed");
                return Ok(SharedContent {
                    share_id: share.id,
                    envelope: share.envelope.clone(),
                    key: share.key.clone(),
                    views_remaining,
                });
            }
            tracing::debug!(share_id = %share_id, "lost view race, re-evaluating");
        }

        tracing::warn!(share_id = %share_id, "share under sustained contention");
        Err(ShareError::Contention)
    }

    /// Owner-only transition to revoked. Revoking twice is not an error.
    pub async fn revoke(&self, share_id: Uuid, caller: Uuid) -> Result<(), ShareError> {
        let share = self
            .store
            .share(share_id)
            .await?
            .ok_or(ShareError::Denied(DenyReason::NotFound))?;
        if share.owner_id != caller {
            tracing::warn!(share_id = %share_id, caller = %caller, "revoke by non-owner refused");
            return Err(ShareError::NotOwner);
        }

        if self.store.deactivate_share(share_id).await? {
            tracing::info!(share_id = %share_id, "share revoked");
        }
        Ok(())
    }

    pub async fn list(&self, owner_id: Uuid) -> Result<Vec<ShareRecord>, ShareError> {
        Ok(self.store.shares_by_owner(owner_id).await?)
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }
}

/// Rows keep whole seconds.
fn truncate(t: OffsetDateTime) -> OffsetDateTime {
    t.replace_nanosecond(0).unwrap_or(t)
}

#[cfg(test)]
mod test {
    use super::*;

    use common::crypto::Secret;
    use time::Duration;

    use crate::clock::ManualClock;
    use crate::share::ShareState;
    use crate::store::MemoryStore;

    fn gate(clock: &ManualClock) -> ShareGate {
        ShareGate::new(Arc::new(MemoryStore::new()), Arc::new(clock.clone()))
    }

    fn new_share() -> NewShare {
        let key = Secret::generate().unwrap();
        NewShare {
            envelope: key.seal(b"meet at noon").unwrap(),
            key: None,
            expires_at: None,
            max_views: None,
            access_hash: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let gate = gate(&clock);
        let owner = Uuid::new_v4();

        let mut share = new_share();
        share.max_views = Some(0);
        assert!(matches!(gate.create(owner, share).await, Err(ShareError::Validation(_))));

        let mut share = new_share();
        share.expires_at = Some(clock.now());
        assert!(matches!(gate.create(owner, share).await, Err(ShareError::Validation(_))));

        let mut share = new_share();
        share.envelope = Envelope::from_bytes(vec![0u8; 27]);
        assert!(matches!(gate.create(owner, share).await, Err(ShareError::Validation(_))));

        // rounds down to now once stored at whole seconds
        let mut share = new_share();
        share.expires_at = Some(clock.now() + Duration::milliseconds(500));
        assert!(matches!(gate.create(owner, share).await, Err(ShareError::Validation(_))));

        let created = gate.create(owner, new_share()).await.unwrap();
        assert_eq!(created.current_views, 0);
        assert_eq!(created.state(clock.now()), ShareState::Active);
    }

    #[tokio::test]
    async fn test_single_view_share() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let gate = gate(&clock);
        let mut share = new_share();
        share.max_views = Some(1);
        let share = gate.create(Uuid::new_v4(), share).await.unwrap();

        let content = gate.access(share.id, None).await.unwrap();
        assert_eq!(content.envelope, share.envelope);
        assert_eq!(content.views_remaining, Some(0));

        assert!(matches!(
            gate.access(share.id, None).await,
            Err(ShareError::Denied(DenyReason::Exhausted))
        ));
    }

    #[tokio::test]
    async fn test_share_expires() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let gate = gate(&clock);
        let mut share = new_share();
        share.expires_at = Some(clock.now() + Duration::hours(1));
        let share = gate.create(Uuid::new_v4(), share).await.unwrap();

        assert!(gate.access(share.id, None).await.is_ok());
        clock.advance(Duration::hours(1));
        assert!(matches!(
            gate.access(share.id, None).await,
            Err(ShareError::Denied(DenyReason::Expired))
        ));
    }

    #[tokio::test]
    async fn test_only_owner_revokes() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let gate = gate(&clock);
        let owner = Uuid::new_v4();
        let share = gate.create(owner, new_share()).await.unwrap();

        assert!(matches!(
            gate.revoke(share.id, Uuid::new_v4()).await,
            Err(ShareError::NotOwner)
        ));
        assert!(gate.access(share.id, None).await.is_ok());

        gate.revoke(share.id, owner).await.unwrap();
        gate.revoke(share.id, owner).await.unwrap();
        assert!(matches!(
            gate.access(share.id, None).await,
            Err(ShareError::Denied(DenyReason::Revoked))
        ));
        assert!(matches!(
            gate.revoke(Uuid::new_v4(), owner).await,
            Err(ShareError::Denied(DenyReason::NotFound))
        ));

        let listed = gate.list(owner).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].is_active);
    }
}
