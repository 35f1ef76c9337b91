use async_trait::async_trait;
use common::crypto::{AccessHash, Envelope, SecretShare};
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{DBool, DTimestamp, DUuid};
use super::Database;
use crate::share::ShareRecord;
use crate::store::{ShareStore, StoreError};

const SHARE_COLUMNS: &str = "id, owner_id, content_enc, wrapped_key, expires_at, max_views, \
    current_views, has_password, access_hash, is_active, created_at, last_accessed_at";

#[derive(Debug, sqlx::FromRow)]
struct ShareRow {
    id: DUuid,
    owner_id: DUuid,
    content_enc: Vec<u8>,
    wrapped_key: Option<String>,
    expires_at: Option<DTimestamp>,
    max_views: Option<i64>,
    current_views: i64,
    has_password: DBool,
    access_hash: Option<String>,
    is_active: DBool,
    created_at: DTimestamp,
    last_accessed_at: Option<DTimestamp>,
}

impl TryFrom<ShareRow> for ShareRecord {
    type Error = StoreError;

    fn try_from(row: ShareRow) -> Result<Self, Self::Error> {
        let id: Uuid = row.id.into();
        let key = row
            .wrapped_key
            .as_deref()
            .map(SecretShare::from_base64)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("wrapped key of share {}: {}", id, e)))?;
        let access_hash = row
            .access_hash
            .as_deref()
            .map(AccessHash::from_hex)
            .transpose()
            .map_err(|e| StoreError::Corrupt(format!("access hash of share {}: {}", id, e)))?;

        let has_password: bool = row.has_password.into();
        if has_password != access_hash.is_some() {
            return Err(StoreError::Corrupt(format!(
                "share {} password flag disagrees with its access hash",
                id
            )));
        }

        Ok(ShareRecord {
            id,
            owner_id: row.owner_id.into(),
            envelope: Envelope::from_bytes(row.content_enc),
            key,
            expires_at: row.expires_at.map(Into::into),
            max_views: row.max_views,
            current_views: row.current_views,
            access_hash,
            is_active: row.is_active.into(),
            created_at: row.created_at.into(),
            last_accessed_at: row.last_accessed_at.map(Into::into),
        })
    }
}

#[async_trait]
impl ShareStore for Database {
    async fn insert_share(&self, share: &ShareRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shared_links
                (id, owner_id, content_enc, wrapped_key, expires_at, max_views, current_views,
                 has_password, access_hash, is_active, created_at, last_accessed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(DUuid::from(share.id))
        .bind(DUuid::from(share.owner_id))
        .bind(share.envelope.as_bytes())
        .bind(share.key.as_ref().map(SecretShare::to_base64))
        .bind(share.expires_at.map(DTimestamp::from))
        .bind(share.max_views)
        .bind(share.current_views)
        .bind(DBool::from(share.has_password()))
        .bind(share.access_hash.as_ref().map(AccessHash::to_hex))
        .bind(DBool::from(share.is_active))
        .bind(DTimestamp::from(share.created_at))
        .bind(share.last_accessed_at.map(DTimestamp::from))
        .execute(&**self)
        .await?;
        Ok(())
    }

    async fn share(&self, id: Uuid) -> Result<Option<ShareRecord>, StoreError> {
        let query = format!("SELECT {} FROM shared_links WHERE id = ?", SHARE_COLUMNS);
        sqlx::query_as::<_, ShareRow>(&query)
            .bind(DUuid::from(id))
            .fetch_optional(&**self)
            .await?
            .map(ShareRecord::try_from)
            .transpose()
    }

    async fn shares_by_owner(&self, owner_id: Uuid) -> Result<Vec<ShareRecord>, StoreError> {
        let query = format!(
            "SELECT {} FROM shared_links WHERE owner_id = ? ORDER BY created_at DESC",
            SHARE_COLUMNS
        );
        sqlx::query_as::<_, ShareRow>(&query)
            .bind(DUuid::from(owner_id))
            .fetch_all(&**self)
            .await?
            .into_iter()
            .map(ShareRecord::try_from)
            .collect()
    }

    async fn consume_view(
        &self,
        id: Uuid,
        expected_views: i64,
        at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE shared_links
            SET current_views = current_views + 1, last_accessed_at = ?
            WHERE id = ?
                AND is_active = 1
                AND current_views = ?
                AND (max_views IS NULL OR current_views < max_views)
            "#,
        )
        .bind(DTimestamp::from(at))
        .bind(DUuid::from(id))
        .bind(expected_views)
        .execute(&**self)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn deactivate_share(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE shared_links SET is_active = 0 WHERE id = ? AND is_active = 1
            "#,
        )
        .bind(DUuid::from(id))
        .execute(&**self)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}
