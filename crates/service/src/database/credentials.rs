use async_trait::async_trait;
use common::crypto::{Salt, StoredHash};
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::{DTimestamp, DUuid};
use super::Database;
use crate::store::{Credential, CredentialStore, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: DUuid,
    username: String,
    password_hash: String,
    kdf_salt: String,
    created_at: DTimestamp,
    updated_at: DTimestamp,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = StoreError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let id: Uuid = row.id.into();
        let password_hash = StoredHash::decode(&row.password_hash)
            .map_err(|e| StoreError::Corrupt(format!("password hash of user {}: {}", id, e)))?;
        let kdf_salt = Salt::from_base64(&row.kdf_salt)
            .map_err(|e| StoreError::Corrupt(format!("kdf salt of user {}: {}", id, e)))?;

        Ok(Credential {
            id,
            username: row.username,
            password_hash,
            kdf_salt,
            created_at: row.created_at.into(),
            updated_at: row.updated_at.into(),
        })
    }
}

#[async_trait]
impl CredentialStore for Database {
    async fn insert_credential(&self, credential: &Credential) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, kdf_salt, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(DUuid::from(credential.id))
        .bind(credential.username.as_str())
        .bind(credential.password_hash.encode())
        .bind(credential.kdf_salt.to_base64())
        .bind(DTimestamp::from(credential.created_at))
        .bind(DTimestamp::from(credential.updated_at))
        .execute(&**self)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(StoreError::Conflict(
                format!("username {} already exists", credential.username),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn credential_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Credential>, StoreError> {
        sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, username, password_hash, kdf_salt, created_at, updated_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&**self)
        .await?
        .map(Credential::try_from)
        .transpose()
    }

    async fn credential_by_id(&self, id: Uuid) -> Result<Option<Credential>, StoreError> {
        sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, username, password_hash, kdf_salt, created_at, updated_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(DUuid::from(id))
        .fetch_optional(&**self)
        .await?
        .map(Credential::try_from)
        .transpose()
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &StoredHash,
        updated_at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(password_hash.encode())
        .bind(DTimestamp::from(updated_at))
        .bind(DUuid::from(id))
        .execute(&**self)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("no credential {}", id)));
        }
        Ok(())
    }
}
