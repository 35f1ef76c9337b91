use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::crypto::random;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::AuthError;

/// Raw refresh token size in bytes, before encoding.
pub const REFRESH_TOKEN_BYTES: usize = 32;

/// A raw refresh token as handed to the client.
///
/// The server keeps only [`RefreshToken::hash`].
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshToken(Zeroizing<String>);

impl fmt::Debug for RefreshToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshToken(<redacted>)")
    }
}

impl RefreshToken {
    pub fn generate() -> Result<Self, AuthError> {
        let raw = Zeroizing::new(random::array::<REFRESH_TOKEN_BYTES>()?);
        Ok(Self(Zeroizing::new(URL_SAFE_NO_PAD.encode(raw.as_slice()))))
    }

    /// Wrap a token presented by a client. Shape is checked, nothing else.
    pub fn parse(token: &str) -> Result<Self, AuthError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|_| AuthError::Unauthorized)?;
        if decoded.len() != REFRESH_TOKEN_BYTES {
            return Err(AuthError::Unauthorized);
        }
        Ok(Self(Zeroizing::new(token.trim().to_string())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of the encoded token.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }

    /// Compare this token's hash to a stored one in constant time.
    pub fn matches_hash(&self, stored: &str) -> bool {
        bool::from(self.hash().as_bytes().ct_eq(stored.as_bytes()))
    }
}
