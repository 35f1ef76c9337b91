//! Access hashes for password-protected share links.
//!
//! The viewer's client hashes the link password and sends only the hash. The
//! server stores the owner's hash and compares the two in constant time; it
//! never sees the password itself.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::error::CryptoError;

pub const ACCESS_HASH_SIZE: usize = 32;

const ACCESS_LABEL: &[u8] = b"sealnote-share-access-v1";

/// `SHA-256(label || password)`, hex encoded on the wire.
#[derive(Clone, Copy, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AccessHash([u8; ACCESS_HASH_SIZE]);

impl fmt::Debug for AccessHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessHash(..)")
    }
}

impl PartialEq for AccessHash {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for AccessHash {}

impl AccessHash {
    pub fn from_password(password: &str) -> Result<Self, CryptoError> {
        if password.is_empty() {
            return Err(CryptoError::validation("share password must not be empty"));
        }
        let mut hasher = Sha256::new();
        hasher.update(ACCESS_LABEL);
        hasher.update(password.as_bytes());
        Ok(Self(hasher.finalize().into()))
    }

    /// Constant-time comparison
    pub fn matches(&self, other: &AccessHash) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let mut buff = [0u8; ACCESS_HASH_SIZE];
        hex::decode_to_slice(encoded.trim(), &mut buff)
            .map_err(|_| CryptoError::validation("access hash must be 64 hex characters"))?;
        Ok(Self(buff))
    }
}

impl From<AccessHash> for String {
    fn from(hash: AccessHash) -> Self {
        hash.to_hex()
    }
}

impl TryFrom<String> for AccessHash {
    type Error = CryptoError;
    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        AccessHash::from_hex(&encoded)
    }
}
