//! Content keys wrapped for a single recipient
//!
//! A [`SecretShare`] is how a note's content key reaches anyone other than
//! its owner. There is one share per (content, recipient) pair, and only the
//! holder of the matching private material can recover the key.
//!
//! # Variants
//!
//! - **RSA-OAEP**: the content key encrypted to the recipient's RSA public key.
//! - **DH**: the sender's DH public value plus an AES-GCM [`Envelope`] of the
//!   content key under the session key both sides derive from the exchange.
//!
//! # Wire Format
//!
//! ```text
//! RSA: [ 0x01 ][ oaep ciphertext: modulus bytes ]
//! DH:  [ 0x02 ][ len: u16 BE ][ sender public: len bytes ][ envelope ]
//! ```
//!
//! Shares travel as standard base64 of the binary form.
//!
//! # Examples
//!
//! ```ignore
//! let content_key = Secret::generate()?;
//!
//! // to an RSA recipient
//! let share = SecretShare::wrap_rsa(&content_key, &bob_rsa.public())?;
//! assert_eq!(share.recover_rsa(&bob_rsa)?, content_key);
//!
//! // to a DH recipient, from a throwaway sender key pair
//! let share = SecretShare::wrap_dh(&content_key, bob_dh.public(), &params)?;
//! assert_eq!(share.recover_dh(&bob_dh, &params)?, content_key);
//! ```

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::dh::{DhKeyPair, DhParams, DhPublicKey};
use super::error::CryptoError;
use super::key_wrap::{WrapPrivateKey, WrapPublicKey};
use super::secret::{Envelope, Secret};

const TAG_RSA_OAEP: u8 = 0x01;
const TAG_DH: u8 = 0x02;

/// A wrapped content key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SecretShare {
    /// Raw RSA-OAEP(SHA-256) ciphertext
    RsaOaep(Vec<u8>),
    /// Content key sealed under a DH session key
    Dh {
        sender: DhPublicKey,
        envelope: Envelope,
    },
}

impl fmt::Debug for SecretShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecretShare::RsaOaep(wrapped) => write!(f, "SecretShare::RsaOaep({} bytes)", wrapped.len()),
            SecretShare::Dh { sender, envelope } => f
                .debug_struct("SecretShare::Dh")
                .field("sender", sender)
                .field("envelope_len", &envelope.len())
                .finish(),
        }
    }
}

impl SecretShare {
    /// Wrap `secret` to an RSA public key.
    pub fn wrap_rsa(secret: &Secret, recipient: &WrapPublicKey) -> Result<Self, CryptoError> {
        Ok(SecretShare::RsaOaep(recipient.wrap(secret)?))
    }

    /// Wrap `secret` to a DH public value using a fresh single-use sender pair.
    ///
    /// The sender exponent is dropped before returning, so only the
    /// recipient can ever recover the key.
    pub fn wrap_dh(
        secret: &Secret,
        recipient: &DhPublicKey,
        params: &DhParams,
    ) -> Result<Self, CryptoError> {
        let sender = DhKeyPair::generate(params)?;
        Self::wrap_dh_from(secret, &sender, recipient, params)
    }

    /// Wrap `secret` from a known sender key pair.
    ///
    /// Use this when the recipient has verified the sender's fingerprint.
    pub fn wrap_dh_from(
        secret: &Secret,
        sender: &DhKeyPair,
        recipient: &DhPublicKey,
        params: &DhParams,
    ) -> Result<Self, CryptoError> {
        let session_key = sender.agree(recipient, params)?.session_key()?;
        let envelope = session_key.seal(secret.bytes())?;
        Ok(SecretShare::Dh {
            sender: sender.public().clone(),
            envelope,
        })
    }

    /// Recover the content key with an RSA private key.
    pub fn recover_rsa(&self, key: &WrapPrivateKey) -> Result<Secret, CryptoError> {
        match self {
            SecretShare::RsaOaep(wrapped) => key.unwrap(wrapped),
            SecretShare::Dh { .. } => Err(CryptoError::validation(
                "share was wrapped with dh, not rsa",
            )),
        }
    }

    /// Recover the content key with the recipient's DH key pair.
    pub fn recover_dh(&self, recipient: &DhKeyPair, params: &DhParams) -> Result<Secret, CryptoError> {
        match self {
            SecretShare::Dh { sender, envelope } => {
                let session_key = recipient.agree(sender, params)?.session_key()?;
                let plain = zeroize::Zeroizing::new(session_key.open(envelope)?);
                Secret::from_slice(&plain).map_err(|_| CryptoError::Authentication)
            }
            SecretShare::RsaOaep(_) => Err(CryptoError::validation(
                "share was wrapped with rsa, not dh",
            )),
        }
    }

    /// Short name of the wrapping scheme, for logs and listings
    pub fn kind(&self) -> &'static str {
        match self {
            SecretShare::RsaOaep(_) => "rsa-oaep",
            SecretShare::Dh { .. } => "dh",
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            SecretShare::RsaOaep(wrapped) => {
                let mut out = Vec::with_capacity(1 + wrapped.len());
                out.push(TAG_RSA_OAEP);
                out.extend_from_slice(wrapped);
                out
            }
            SecretShare::Dh { sender, envelope } => {
                let public = sender.to_bytes();
                let mut out = Vec::with_capacity(3 + public.len() + envelope.len());
                out.push(TAG_DH);
                // public values are at most the modulus length, far below u16::MAX
                out.extend_from_slice(&(public.len() as u16).to_be_bytes());
                out.extend_from_slice(&public);
                out.extend_from_slice(envelope.as_bytes());
                out
            }
        }
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, CryptoError> {
        let (tag, rest) = data
            .split_first()
            .ok_or_else(|| CryptoError::validation("empty share"))?;
        match *tag {
            TAG_RSA_OAEP => {
                if rest.is_empty() {
                    return Err(CryptoError::validation("empty rsa share"));
                }
                Ok(SecretShare::RsaOaep(rest.to_vec()))
            }
            TAG_DH => {
                if rest.len() < 2 {
                    return Err(CryptoError::validation("truncated dh share"));
                }
                let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
                let rest = &rest[2..];
                if rest.len() < len {
                    return Err(CryptoError::validation("truncated dh share"));
                }
                let (public, envelope) = rest.split_at(len);
                Ok(SecretShare::Dh {
                    sender: DhPublicKey::from_bytes(public)?,
                    envelope: Envelope::from_bytes(envelope.to_vec()),
                })
            }
            other => Err(CryptoError::validation(format!(
                "unknown share tag 0x{:02x}",
                other
            ))),
        }
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::validation("share is not valid base64"))?;
        Self::from_bytes(&data)
    }
}

impl From<SecretShare> for String {
    fn from(share: SecretShare) -> Self {
        share.to_base64()
    }
}

impl TryFrom<String> for SecretShare {
    type Error = CryptoError;
    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        SecretShare::from_base64(&encoded)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::dh::generate_params;

    #[test]
    fn test_dh_share_recover() {
        let params = generate_params();
        let bob = DhKeyPair::generate(&params).unwrap();
        let content_key = Secret::generate().unwrap();

        let share = SecretShare::wrap_dh(&content_key, bob.public(), &params).unwrap();
        assert_eq!(share.kind(), "dh");
        assert_eq!(share.recover_dh(&bob, &params).unwrap(), content_key);
    }

    #[test]
    fn test_dh_share_wrong_recipient() {
        let params = generate_params();
        let bob = DhKeyPair::generate(&params).unwrap();
        let eve = DhKeyPair::generate(&params).unwrap();
        let content_key = Secret::generate().unwrap();

        let share = SecretShare::wrap_dh(&content_key, bob.public(), &params).unwrap();
        assert_eq!(
            share.recover_dh(&eve, &params),
            Err(CryptoError::Authentication)
        );
    }

    #[test]
    fn test_dh_share_from_known_sender() {
        let params = generate_params();
        let alice = DhKeyPair::generate(&params).unwrap();
        let bob = DhKeyPair::generate(&params).unwrap();
        let content_key = Secret::generate().unwrap();

        let share = SecretShare::wrap_dh_from(&content_key, &alice, bob.public(), &params).unwrap();
        match &share {
            SecretShare::Dh { sender, .. } => assert_eq!(sender, alice.public()),
            other => panic!("unexpected share {:?}", other),
        }
        assert_eq!(share.recover_dh(&bob, &params).unwrap(), content_key);
    }

    #[test]
    fn test_binary_and_base64_forms() {
        let params = generate_params();
        let bob = DhKeyPair::generate(&params).unwrap();
        let content_key = Secret::generate().unwrap();
        let share = SecretShare::wrap_dh(&content_key, bob.public(), &params).unwrap();

        let bytes = share.to_bytes();
        assert_eq!(bytes[0], TAG_DH);
        assert_eq!(SecretShare::from_bytes(&bytes).unwrap(), share);

        let json = serde_json::to_string(&share).unwrap();
        let recovered: SecretShare = serde_json::from_str(&json).unwrap();
        assert_eq!(recovered.recover_dh(&bob, &params).unwrap(), content_key);
    }

    #[test]
    fn test_malformed_shares_rejected() {
        assert!(SecretShare::from_bytes(&[]).is_err());
        assert!(SecretShare::from_bytes(&[TAG_RSA_OAEP]).is_err());
        assert!(SecretShare::from_bytes(&[TAG_DH, 0x00]).is_err());
        assert!(SecretShare::from_bytes(&[TAG_DH, 0x01, 0x00]).is_err());
        assert!(SecretShare::from_bytes(&[0x7f, 1, 2, 3]).is_err());
        assert!(SecretShare::from_base64("***").is_err());
    }

    #[test]
    fn test_scheme_mismatch_is_validation() {
        let share = SecretShare::RsaOaep(vec![0u8; 256]);
        let params = generate_params();
        let bob = DhKeyPair::generate(&params).unwrap();
        assert!(matches!(
            share.recover_dh(&bob, &params),
            Err(CryptoError::Validation(_))
        ));
    }
}
