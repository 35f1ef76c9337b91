//! Token/session trust engine.
//!
//! Access tokens are HS256 compact JWS over a fixed [`Claims`] struct and
//! are either valid, expired or revoked. Refresh tokens are random values
//! whose SHA-256 is the only thing stored. Every rejection of a presented
//! credential surfaces as [`AuthError::Unauthorized`] no matter which check
//! failed; the detail goes to `debug` logs.

mod claims;
mod engine;
mod policy;
mod refresh;
mod revocation;

pub use claims::{Claims, TokenSigner};
pub use engine::{AuthEngine, LoginOutcome, RegisteredUser, TokenPair, TOKEN_TYPE};
pub use policy::CredentialPolicy;
pub use refresh::RefreshToken;
pub use revocation::{RevocationCache, RevocationSet};

use common::crypto::CryptoError;

use crate::kdf_pool::KdfPoolError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Bad credentials, or a token that is malformed, forged, expired or revoked.
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("username already exists")]
    UsernameTaken,
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<KdfPoolError> for AuthError {
    fn from(err: KdfPoolError) -> Self {
        match err {
            KdfPoolError::Crypto(e) => AuthError::Crypto(e),
            other => AuthError::Internal(other.to_string()),
        }
    }
}
