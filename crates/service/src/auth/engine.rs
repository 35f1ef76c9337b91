use std::sync::Arc;

use common::crypto::{Salt, StoredHash};
use time::OffsetDateTime;
use uuid::Uuid;
use zeroize::Zeroizing;

use super::claims::{Claims, TokenSigner};
use super::policy::CredentialPolicy;
use super::refresh::RefreshToken;
use super::revocation::RevocationSet;
use super::AuthError;
use crate::clock::Clock;
use crate::config::RefreshPolicy;
use crate::context::TrustContext;
use crate::kdf_pool::KdfPool;
use crate::store::{
    Credential, CredentialStore, PruneReport, RefreshRevocation, RefreshTokenRecord, StoreError,
    TokenStore,
};

pub const TOKEN_TYPE: &str = "Bearer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredUser {
    pub id: Uuid,
    pub username: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: RefreshToken,
    /// access token lifetime in seconds
    pub expires_in: i64,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user_id: Uuid,
    pub username: String,
    pub tokens: TokenPair,
    /// salt the client derives its master key with
    pub kdf_salt: Salt,
}

/// Issues, validates and revokes credentials.
#[derive(Debug, Clone)]
pub struct AuthEngine {
    ctx: Arc<TrustContext>,
    credentials: Arc<dyn CredentialStore>,
    tokens: Arc<dyn TokenStore>,
    kdf: KdfPool,
    signer: TokenSigner,
    revocations: RevocationSet,
    policy: CredentialPolicy,
}

impl AuthEngine {
    pub fn new(
        ctx: Arc<TrustContext>,
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
        kdf: KdfPool,
    ) -> Result<Self, AuthError> {
        let signer = TokenSigner::new(ctx.signing_secret());
        let revocations = RevocationSet::new(tokens.clone(), ctx.revocation_cache_ttl());
        Ok(Self {
            ctx,
            credentials,
            tokens,
            kdf,
            signer,
            revocations,
            policy: CredentialPolicy::new()?,
        })
    }

    pub fn context(&self) -> &TrustContext {
        &self.ctx
    }

    pub fn revocations(&self) -> &RevocationSet {
        &self.revocations
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<RegisteredUser, AuthError> {
        self.policy.check_username(username)?;
        self.policy.check_password(password)?;

        if self
            .credentials
            .credential_by_username(username)
            .await?
            .is_some()
        {
            return Err(AuthError::UsernameTaken);
        }

        let password_hash = self
            .kdf
            .hash(
                Zeroizing::new(password.to_string()),
                self.pepper(),
                *self.ctx.kdf_params(),
            )
            .await?;
        let now = self.now();
        let credential = Credential {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            kdf_salt: Salt::generate()?,
            created_at: now,
            updated_at: now,
        };

        match self.credentials.insert_credential(&credential).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(AuthError::UsernameTaken),
            Err(e) => return Err(e.into()),
        }

        tracing::info!(user_id = %credential.id, "user registered");
        Ok(RegisteredUser {
            id: credential.id,
            username: credential.username,
            created_at: credential.created_at,
        })
    }

    /// Verify a password and issue a token pair.
    ///
    /// An unknown username still costs one full derivation, so response time
    /// does not reveal which usernames exist.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let credential = self.credentials.credential_by_username(username).await?;
        let stored = match &credential {
            Some(credential) => credential.password_hash.clone(),
            None => StoredHash::unmatchable(self.ctx.kdf_params()),
        };
        let verified = self
            .kdf
            .verify(stored, Zeroizing::new(password.to_string()), self.pepper())
            .await?;

        let credential = match (verified, credential) {
            (true, Some(credential)) => credential,
            (_, Some(credential)) => {
                tracing::info!(user_id = %credential.id, "login failed");
                return Err(AuthError::Unauthorized);
            }
            (_, None) => {
                tracing::debug!("login failed for unknown username");
                return Err(AuthError::Unauthorized);
            }
        };

        if credential.password_hash.needs_rehash(self.ctx.kdf_params()) {
            self.rehash(&credential, password).await;
        }

        let tokens = self.issue(credential.id, &credential.username).await?;
        tracing::info!(user_id = %credential.id, "login succeeded");
        Ok(LoginOutcome {
            user_id: credential.id,
            username: credential.username,
            tokens,
            kdf_salt: credential.kdf_salt,
        })
    }

    /// Check signature, expiry and revocation. Every failure is [`AuthError::Unauthorized`].
    pub async fn validate(&self, access_token: &str) -> Result<Claims, AuthError> {
        let claims = self.signer.verify(access_token)?;
        if claims.is_expired_at(self.ctx.clock().unix()) {
            tracing::debug!(jti = %claims.jti, "token expired");
            return Err(AuthError::Unauthorized);
        }
        if self.revocations.contains(claims.jti).await? {
            tracing::debug!(jti = %claims.jti, "token revoked");
            return Err(AuthError::Unauthorized);
        }
        Ok(claims)
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// Under [`RefreshPolicy::Rotate`] the presented token is consumed and a
    /// new one issued; presenting a token that was already rotated revokes
    /// every refresh token of that user. Tokens ended by logout are only
    /// refused.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let token = RefreshToken::parse(refresh_token)?;
        let record = self
            .tokens
            .refresh_token_by_hash(&token.hash())
            .await?
            .ok_or_else(|| {
                tracing::debug!("unknown refresh token");
                AuthError::Unauthorized
            })?;
        if !token.matches_hash(&record.token_hash) {
            return Err(AuthError::Unauthorized);
        }

        let now = self.now();
        let policy = self.ctx.refresh_policy();
        if record.revoked {
            if policy == RefreshPolicy::Rotate
                && record.revoked_reason == Some(RefreshRevocation::Rotated)
            {
                let revoked = self
                    .tokens
                    .revoke_user_refresh_tokens(record.user_id, now, RefreshRevocation::Replay)
                    .await?;
                tracing::warn!(
                    user_id = %record.user_id,
                    revoked,
                    "consumed refresh token presented again, revoking all refresh tokens"
                );
            }
            return Err(AuthError::Unauthorized);
        }
        if now >= record.expires_at {
            tracing::debug!(token_id = %record.id, "refresh token expired");
            return Err(AuthError::Unauthorized);
        }

        let credential = self
            .credentials
            .credential_by_id(record.user_id)
            .await?
            .ok_or(AuthError::Unauthorized)?;

        match policy {
            RefreshPolicy::Rotate => {
                if !self
                    .tokens
                    .revoke_refresh_token(record.id, now, RefreshRevocation::Rotated)
                    .await?
                {
                    tracing::warn!(user_id = %record.user_id, "refresh token consumed concurrently");
                    return Err(AuthError::Unauthorized);
                }
                let tokens = self.issue(credential.id, &credential.username).await?;
                tracing::info!(user_id = %credential.id, "refresh token rotated");
                Ok(tokens)
            }
            RefreshPolicy::ReuseUntilRevoked => {
                let (access_token, claims) = self.mint_access(credential.id, &credential.username)?;
                Ok(TokenPair {
                    access_token,
                    refresh_token: token,
                    expires_in: claims.exp - claims.iat,
                    expires_at: unix_time(claims.exp)?,
                })
            }
        }
    }

    /// Revoke the presented access token and end its refresh session.
    ///
    /// The access token must still pass [`AuthEngine::validate`]; an expired
    /// or already revoked token carries no authority to end sessions.
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<(), AuthError> {
        let refresh_token = refresh_token.map(RefreshToken::parse).transpose()?;
        let claims = self.validate(access_token).await?;
        self.end_session(&claims, refresh_token.as_ref()).await
    }

    /// Logout for a caller whose token was already validated.
    ///
    /// With `refresh_token` only that token is revoked; without it every
    /// refresh token of the user is.
    pub async fn end_session(
        &self,
        claims: &Claims,
        refresh_token: Option<&RefreshToken>,
    ) -> Result<(), AuthError> {
        let now = self.now();
        let record = match refresh_token {
            Some(token) => self.tokens.refresh_token_by_hash(&token.hash()).await?,
            None => None,
        };

        self.revocations
            .insert(claims.jti, unix_time(claims.exp)?, "logout")
            .await?;

        match (refresh_token, record) {
            (Some(_), Some(record)) if record.user_id == claims.sub => {
                self.tokens
                    .revoke_refresh_token(record.id, now, RefreshRevocation::Logout)
                    .await?;
            }
            (Some(_), Some(_)) => {
                tracing::warn!(user_id = %claims.sub, "logout presented another user's refresh token");
            }
            (Some(_), None) => {}
            (None, _) => {
                self.tokens
                    .revoke_user_refresh_tokens(claims.sub, now, RefreshRevocation::Logout)
                    .await?;
            }
        }

        tracing::info!(user_id = %claims.sub, "logged out");
        Ok(())
    }

    /// Drop revocation entries and refresh tokens that have expired on their own.
    pub async fn prune(&self) -> Result<PruneReport, AuthError> {
        self.revocations.prune(self.now()).await
    }

    async fn issue(&self, user_id: Uuid, username: &str) -> Result<TokenPair, AuthError> {
        let (access_token, claims) = self.mint_access(user_id, username)?;

        let refresh_token = RefreshToken::generate()?;
        let now = unix_time(claims.iat)?;
        let record = RefreshTokenRecord {
            id: Uuid::new_v4(),
            user_id,
            token_hash: refresh_token.hash(),
            expires_at: now + self.ctx.refresh_token_ttl(),
            revoked: false,
            created_at: now,
            revoked_at: None,
            revoked_reason: None,
        };
        self.tokens.insert_refresh_token(&record).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: claims.exp - claims.iat,
            expires_at: unix_time(claims.exp)?,
        })
    }

    fn mint_access(&self, user_id: Uuid, username: &str) -> Result<(String, Claims), AuthError> {
        let iat = self.ctx.clock().unix();
        let claims = Claims {
            sub: user_id,
            jti: Uuid::new_v4(),
            iat,
            exp: iat + self.ctx.access_token_ttl().whole_seconds(),
            username: username.to_string(),
        };
        let token = self.signer.sign(&claims)?;
        Ok((token, claims))
    }

    /// Re-derive a credential hash under the current parameters.
    ///
    /// Login has already succeeded at this point, so failures are logged and
    /// the old hash stays in place.
    async fn rehash(&self, credential: &Credential, password: &str) {
        let params = *self.ctx.kdf_params();
        let result = self
            .kdf
            .hash(Zeroizing::new(password.to_string()), self.pepper(), params)
            .await;
        match result {
            Ok(hash) => {
                match self
                    .credentials
                    .update_password_hash(credential.id, &hash, self.now())
                    .await
                {
                    Ok(()) => tracing::info!(
                        user_id = %credential.id,
                        from = %credential.password_hash.params(),
                        to = %params,
                        "credential rehashed"
                    ),
                    Err(e) => tracing::warn!(user_id = %credential.id, "failed to store rehashed credential: {}", e),
                }
            }
            Err(e) => tracing::warn!(user_id = %credential.id, "failed to rehash credential: {}", e),
        }
    }

    fn pepper(&self) -> Option<Zeroizing<Vec<u8>>> {
        self.ctx.pepper().map(|p| Zeroizing::new(p.to_vec()))
    }

    fn now(&self) -> OffsetDateTime {
        let now = self.ctx.clock().now();
        now.replace_nanosecond(0).unwrap_or(now)
    }
}

fn unix_time(secs: i64) -> Result<OffsetDateTime, AuthError> {
    OffsetDateTime::from_unix_timestamp(secs)
        .map_err(|e| AuthError::Internal(format!("timestamp out of range: {}", e)))
}

#[cfg(test)]
mod test {
    use super::*;

    use common::crypto::KdfParams;
    use time::Duration;

    use crate::clock::ManualClock;
    use crate::config::{Pepper, SigningSecret};
    use crate::store::MemoryStore;

    const PASSWORD: &str = "Corr3ct#horse";

    fn engine_with(clock: &ManualClock, policy: RefreshPolicy) -> (AuthEngine, MemoryStore) {
        let store = MemoryStore::new();
        let ctx = TrustContext::new(
            SigningSecret::new(vec![9u8; 32]).unwrap(),
            Arc::new(clock.clone()),
        )
        .with_pepper(Pepper::new(b"server pepper".to_vec()))
        .with_refresh_policy(policy);
        let engine = AuthEngine::new(
            Arc::new(ctx),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            KdfPool::new(2),
        )
        .unwrap();
        (engine, store)
    }

    fn engine(clock: &ManualClock) -> AuthEngine {
        engine_with(clock, RefreshPolicy::Rotate).0
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);

        let user = engine.register("alice", PASSWORD).await.unwrap();
        let outcome = engine.login("alice", PASSWORD).await.unwrap();

        assert_eq!(outcome.user_id, user.id);
        assert_eq!(outcome.tokens.expires_in, 15 * 60);
        let claims = engine.validate(&outcome.tokens.access_token).await.unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.iat, 1_700_000_000);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_input_and_duplicates() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);

        assert!(matches!(
            engine.register("a", PASSWORD).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            engine.register("alice", "weak").await,
            Err(AuthError::Validation(_))
        ));
        engine.register("alice", PASSWORD).await.unwrap();
        assert!(matches!(
            engine.register("alice", PASSWORD).await,
            Err(AuthError::UsernameTaken)
        ));
    }

    #[tokio::test]
    async fn test_login_failures_are_uniform() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();

        assert!(matches!(
            engine.login("alice", "Wr0ng#horse").await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            engine.login("mallory", PASSWORD).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_expiry_boundary_to_the_second() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let token = engine.login("alice", PASSWORD).await.unwrap().tokens.access_token;

        clock.advance(Duration::minutes(15) - Duration::seconds(1));
        assert!(engine.validate(&token).await.is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(
            engine.validate(&token).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_revokes_immediately() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let outcome = engine.login("alice", PASSWORD).await.unwrap();
        let token = outcome.tokens.access_token;

        assert!(engine.validate(&token).await.is_ok());
        engine.logout(&token, None).await.unwrap();
        assert!(matches!(
            engine.validate(&token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            engine.refresh(outcome.tokens.refresh_token.as_str()).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_logout_needs_a_live_token() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let old = engine.login("alice", PASSWORD).await.unwrap().tokens;
        engine.logout(&old.access_token, None).await.unwrap();

        clock.advance(Duration::hours(2));
        let fresh = engine.login("alice", PASSWORD).await.unwrap().tokens;

        // revoked and expired by now
        assert!(matches!(
            engine.logout(&old.access_token, None).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(engine.refresh(fresh.refresh_token.as_str()).await.is_ok());

        // expired but never revoked
        let stale = engine.login("alice", PASSWORD).await.unwrap().tokens;
        clock.advance(Duration::minutes(15));
        assert!(matches!(
            engine.logout(&stale.access_token, None).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(engine.refresh(stale.refresh_token.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_after_logout_keeps_other_sessions() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let laptop = engine.login("alice", PASSWORD).await.unwrap().tokens;
        let phone = engine.login("alice", PASSWORD).await.unwrap().tokens;

        engine
            .logout(&laptop.access_token, Some(laptop.refresh_token.as_str()))
            .await
            .unwrap();
        assert!(matches!(
            engine.refresh(laptop.refresh_token.as_str()).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(engine.refresh(phone.refresh_token.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_with_malformed_refresh_token_changes_nothing() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let tokens = engine.login("alice", PASSWORD).await.unwrap().tokens;

        assert!(matches!(
            engine.logout(&tokens.access_token, Some("not-a-token")).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(engine.validate(&tokens.access_token).await.is_ok());
        assert!(engine.refresh(tokens.refresh_token.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_rotates() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let first = engine.login("alice", PASSWORD).await.unwrap().tokens;

        clock.advance(Duration::minutes(20));
        assert!(engine.validate(&first.access_token).await.is_err());

        let second = engine.refresh(first.refresh_token.as_str()).await.unwrap();
        assert_ne!(second.refresh_token, first.refresh_token);
        assert!(engine.validate(&second.access_token).await.is_ok());

        // the consumed token is dead, and replaying it burns the new one too
        assert!(matches!(
            engine.refresh(first.refresh_token.as_str()).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            engine.refresh(second.refresh_token.as_str()).await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_refresh_reuse_policy_keeps_token() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let (engine, _) = engine_with(&clock, RefreshPolicy::ReuseUntilRevoked);
        engine.register("alice", PASSWORD).await.unwrap();
        let first = engine.login("alice", PASSWORD).await.unwrap().tokens;

        let a = engine.refresh(first.refresh_token.as_str()).await.unwrap();
        let b = engine.refresh(first.refresh_token.as_str()).await.unwrap();
        assert_eq!(a.refresh_token, first.refresh_token);
        assert_eq!(b.refresh_token, first.refresh_token);
        assert_ne!(a.access_token, b.access_token);
    }

    #[tokio::test]
    async fn test_refresh_token_expires() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let tokens = engine.login("alice", PASSWORD).await.unwrap().tokens;

        clock.advance(Duration::days(7));
        assert!(matches!(
            engine.refresh(tokens.refresh_token.as_str()).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            engine.refresh("garbage").await,
            Err(AuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_prune_after_expiry() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let engine = engine(&clock);
        engine.register("alice", PASSWORD).await.unwrap();
        let tokens = engine.login("alice", PASSWORD).await.unwrap().tokens;
        engine.logout(&tokens.access_token, None).await.unwrap();

        let report = engine.prune().await.unwrap();
        assert_eq!(report.revoked_access_tokens, 0);

        clock.advance(Duration::days(8));
        let report = engine.prune().await.unwrap();
        assert_eq!(report.revoked_access_tokens, 1);
        assert_eq!(report.refresh_tokens, 1);
    }

    #[tokio::test]
    async fn test_weak_hash_upgraded_on_login() {
        let clock = ManualClock::at_unix(1_700_000_000);
        let store = MemoryStore::new();
        let stronger = KdfParams {
            iterations: 2,
            ..KdfParams::default()
        };
        let ctx = TrustContext::new(
            SigningSecret::new(vec![9u8; 32]).unwrap(),
            Arc::new(clock.clone()),
        )
        .with_kdf_params(stronger);
        let engine = AuthEngine::new(
            Arc::new(ctx),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            KdfPool::new(2),
        )
        .unwrap();

        // hashed before the parameter bump
        let credential = Credential {
            id: Uuid::new_v4(),
            username: "legacy".into(),
            password_hash: StoredHash::create(PASSWORD.as_bytes(), None, &KdfParams::default())
                .unwrap(),
            kdf_salt: Salt::generate().unwrap(),
            created_at: clock.now(),
            updated_at: clock.now(),
        };
        store.insert_credential(&credential).await.unwrap();

        engine.login("legacy", PASSWORD).await.unwrap();
        let stored = store.credential_by_id(credential.id).await.unwrap().unwrap();
        assert_eq!(stored.password_hash.params(), &stronger);
        assert_ne!(stored.password_hash.salt(), credential.password_hash.salt());
        assert!(engine.login("legacy", PASSWORD).await.is_ok());
    }
}
