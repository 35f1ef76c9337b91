use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{DBool, DTimestamp, DUuid};
use super::Database;
use crate::store::{PruneReport, RefreshRevocation, RefreshTokenRecord, StoreError, TokenStore};

#[derive(Debug, sqlx::FromRow)]
struct RefreshTokenRow {
    id: DUuid,
    user_id: DUuid,
    token_hash: String,
    expires_at: DTimestamp,
    is_revoked: DBool,
    created_at: DTimestamp,
    revoked_at: Option<DTimestamp>,
    revoked_reason: Option<String>,
}

impl TryFrom<RefreshTokenRow> for RefreshTokenRecord {
    type Error = StoreError;

    fn try_from(row: RefreshTokenRow) -> Result<Self, Self::Error> {
        let revoked_reason = match row.revoked_reason.as_deref() {
            None => None,
            Some(reason) => Some(RefreshRevocation::parse(reason).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown refresh revocation reason {:?}", reason))
            })?),
        };
        Ok(RefreshTokenRecord {
            id: row.id.into(),
            user_id: row.user_id.into(),
            token_hash: row.token_hash,
            expires_at: row.expires_at.into(),
            revoked: row.is_revoked.into(),
            created_at: row.created_at.into(),
            revoked_at: row.revoked_at.map(Into::into),
            revoked_reason,
        })
    }
}

#[async_trait]
impl TokenStore for Database {
    async fn insert_refresh_token(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, token_hash, expires_at, is_revoked, created_at, revoked_at,
                 revoked_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(DUuid::from(record.id))
        .bind(DUuid::from(record.user_id))
        .bind(record.token_hash.as_str())
        .bind(DTimestamp::from(record.expires_at))
        .bind(DBool::from(record.revoked))
        .bind(DTimestamp::from(record.created_at))
        .bind(record.revoked_at.map(DTimestamp::from))
        .bind(record.revoked_reason.map(|reason| reason.as_str()))
        .execute(&**self)
        .await?;
        Ok(())
    }

    async fn refresh_token_by_hash(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            r#"
            SELECT id, user_id, token_hash, expires_at, is_revoked, created_at, revoked_at,
                revoked_reason
            FROM refresh_tokens
            WHERE token_hash = ?
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&**self)
        .await?;
        row.map(RefreshTokenRecord::try_from).transpose()
    }

    async fn revoke_refresh_token(
        &self,
        id: Uuid,
        at: OffsetDateTime,
        reason: RefreshRevocation,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = 1, revoked_at = ?, revoked_reason = ?
            WHERE id = ? AND is_revoked = 0
            "#,
        )
        .bind(DTimestamp::from(at))
        .bind(reason.as_str())
        .bind(DUuid::from(id))
        .execute(&**self)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn revoke_user_refresh_tokens(
        &self,
        user_id: Uuid,
        at: OffsetDateTime,
        reason: RefreshRevocation,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = 1, revoked_at = ?, revoked_reason = ?
            WHERE user_id = ? AND is_revoked = 0
            "#,
        )
        .bind(DTimestamp::from(at))
        .bind(reason.as_str())
        .bind(DUuid::from(user_id))
        .execute(&**self)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_access_token(
        &self,
        jti: Uuid,
        expires_at: OffsetDateTime,
        reason: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO token_blacklist (jti, expires_at, blacklisted_at, reason)
            VALUES (?, ?, CAST(strftime('%s', 'now') AS INTEGER), ?)
            ON CONFLICT(jti) DO UPDATE SET expires_at = excluded.expires_at
            "#,
        )
        .bind(DUuid::from(jti))
        .bind(DTimestamp::from(expires_at))
        .bind(reason)
        .execute(&**self)
        .await?;
        Ok(())
    }

    async fn is_access_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM token_blacklist WHERE jti = ?
            "#,
        )
        .bind(DUuid::from(jti))
        .fetch_optional(&**self)
        .await?;
        Ok(row.is_some())
    }

    async fn prune_expired(&self, now: OffsetDateTime) -> Result<PruneReport, StoreError> {
        let mut tx = self.begin().await?;

        let revoked_access_tokens = sqlx::query(
            r#"
            DELETE FROM token_blacklist WHERE expires_at < ?
            "#,
        )
        .bind(DTimestamp::from(now))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let refresh_tokens = sqlx::query(
            r#"
            DELETE FROM refresh_tokens WHERE expires_at < ?
            "#,
        )
        .bind(DTimestamp::from(now))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;

        Ok(PruneReport {
            revoked_access_tokens,
            refresh_tokens,
        })
    }
}
