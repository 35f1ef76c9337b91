use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AuthError;
use crate::config::SigningSecret;

/// Every field an access token carries. All are required and all are signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// user id
    pub sub: Uuid,
    /// token id, the key of the revocation set
    pub jti: Uuid,
    /// issued at, unix seconds
    pub iat: i64,
    /// expires at, unix seconds
    pub exp: i64,
    pub username: String,
}

impl Claims {
    /// Valid strictly before `exp`.
    pub fn is_expired_at(&self, now_unix: i64) -> bool {
        now_unix >= self.exp
    }
}

/// HS256 compact JWS signing and signature checks.
///
/// Expiry is not checked here: the engine compares `exp` against its own
/// clock so the boundary is exact and testable.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &Algorithm::HS256)
            .finish()
    }
}

impl TokenSigner {
    pub fn new(secret: &SigningSecret) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret.bytes()),
            decoding: DecodingKey::from_secret(secret.bytes()),
            validation,
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Check the signature and decode the claims. Any failure is [`AuthError::Unauthorized`].
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("token rejected: {}", e);
                AuthError::Unauthorized
            })
    }
}
