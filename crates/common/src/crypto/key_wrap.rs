//! Asymmetric wrapping of content keys with RSA-OAEP (SHA-256)
//!
//! A wrapped key is the raw OAEP ciphertext of a 32-byte [`Secret`], exactly
//! one modulus long (256 bytes for a 2048-bit key). Unwrapping fails with a
//! single opaque [`CryptoError::Authentication`] whether the padding was
//! malformed, the hash check failed, or the key was simply the wrong one.
//!
//! Keys travel as PEM (SPKI for public keys, PKCS#8 for private keys) or DER.
//! PKCS#1 (`RSA PUBLIC KEY` / `RSA PRIVATE KEY`) input is accepted as well.

use std::fmt;

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::error::CryptoError;
use super::random::GuardedRng;
use super::secret::{Secret, SECRET_SIZE};

/// Smallest modulus accepted for new or imported keys
pub const MIN_KEY_BITS: usize = 2048;
/// Modulus size used by [`WrapPrivateKey::generate`] by default
pub const DEFAULT_KEY_BITS: usize = 2048;

const PEM_PREFIX: &[u8] = b"-----BEGIN";

fn looks_like_pem(input: &[u8]) -> bool {
    let start = input
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(input.len());
    input[start..].starts_with(PEM_PREFIX)
}

/// A recipient's RSA public key.
#[derive(Clone, PartialEq, Eq)]
pub struct WrapPublicKey(RsaPublicKey);

impl fmt::Debug for WrapPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrapPublicKey(rsa-{})", self.0.size() * 8)
    }
}

impl WrapPublicKey {
    /// Parse PEM or DER, whichever `input` looks like.
    pub fn parse(input: &[u8]) -> Result<Self, CryptoError> {
        if looks_like_pem(input) {
            let pem = std::str::from_utf8(input)
                .map_err(|_| CryptoError::validation("public key PEM is not utf-8"))?;
            Self::from_pem(pem)
        } else {
            Self::from_der(input)
        }
    }

    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::validation(format!("invalid public key PEM: {}", e)))?;
        Self::checked(key)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = RsaPublicKey::from_public_key_der(der)
            .or_else(|_| RsaPublicKey::from_pkcs1_der(der))
            .map_err(|e| CryptoError::validation(format!("invalid public key DER: {}", e)))?;
        Self::checked(key)
    }

    pub fn to_pem(&self) -> Result<String, CryptoError> {
        self.0
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::validation(format!("public key encoding failed: {}", e)))
    }

    pub fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        self.0
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| CryptoError::validation(format!("public key encoding failed: {}", e)))
    }

    /// Modulus size in bytes; also the length of every wrapped key.
    pub fn size(&self) -> usize {
        self.0.size()
    }

    /// Wrap `content_key` for the holder of the matching private key.
    pub fn wrap(&self, content_key: &Secret) -> Result<Vec<u8>, CryptoError> {
        let mut rng = GuardedRng::new();
        let wrapped = self
            .0
            .encrypt(&mut rng, Oaep::new::<Sha256>(), content_key.bytes())
            .map_err(|e| CryptoError::validation(format!("key wrap failed: {}", e)))?;
        rng.finish()?;
        Ok(wrapped)
    }

    fn checked(key: RsaPublicKey) -> Result<Self, CryptoError> {
        let bits = key.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::validation(format!(
                "rsa key of {} bits below minimum {}",
                bits, MIN_KEY_BITS
            )));
        }
        Ok(Self(key))
    }
}

/// An RSA private key able to unwrap content keys.
#[derive(Clone)]
pub struct WrapPrivateKey(RsaPrivateKey);

impl fmt::Debug for WrapPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WrapPrivateKey").field(&"[REDACTED]").finish()
    }
}

impl WrapPrivateKey {
    /// Generate a fresh key pair with a modulus of `bits` bits.
    pub fn generate(bits: usize) -> Result<Self, CryptoError> {
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::validation(format!(
                "rsa key of {} bits below minimum {}",
                bits, MIN_KEY_BITS
            )));
        }
        let mut rng = GuardedRng::new();
        let key = RsaPrivateKey::new(&mut rng, bits)
            .map_err(|e| CryptoError::validation(format!("rsa key generation failed: {}", e)))?;
        rng.finish()?;
        Ok(Self(key))
    }

    pub fn public(&self) -> WrapPublicKey {
        WrapPublicKey(self.0.to_public_key())
    }

    pub fn parse(input: &[u8]) -> Result<Self, CryptoError> {
        if looks_like_pem(input) {
            let pem = std::str::from_utf8(input)
                .map_err(|_| CryptoError::validation("private key PEM is not utf-8"))?;
            Self::from_pem(pem)
        } else {
            Self::from_der(input)
        }
    }

    pub fn from_pem(pem: &str) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|_| CryptoError::validation("invalid private key PEM"))?;
        Self::checked(key)
    }

    pub fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        let key = RsaPrivateKey::from_pkcs8_der(der)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(der))
            .map_err(|_| CryptoError::validation("invalid private key DER"))?;
        Self::checked(key)
    }

    /// PKCS#8 PEM. The returned buffer is zeroized on drop.
    pub fn to_pem(&self) -> Result<Zeroizing<String>, CryptoError> {
        self.0
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|_| CryptoError::validation("private key encoding failed"))
    }

    /// Recover the content key from `wrapped`.
    ///
    /// # Errors
    ///
    /// A wrong-length input is a [`CryptoError::Validation`]. Everything else
    /// is [`CryptoError::Authentication`].
    pub fn unwrap(&self, wrapped: &[u8]) -> Result<Secret, CryptoError> {
        let expected = self.0.size();
        if wrapped.len() != expected {
            return Err(CryptoError::validation(format!(
                "wrapped key must be {} bytes, got {}",
                expected,
                wrapped.len()
            )));
        }

        let plain = Zeroizing::new(self.0.decrypt(Oaep::new::<Sha256>(), wrapped).map_err(
            |e| {
                tracing::debug!("oaep unwrap failed: {}", e);
                CryptoError::Authentication
            },
        )?);

        if plain.len() != SECRET_SIZE {
            tracing::debug!(len = plain.len(), "unwrapped key has unexpected length");
            return Err(CryptoError::Authentication);
        }
        Secret::from_slice(&plain)
    }

    fn checked(key: RsaPrivateKey) -> Result<Self, CryptoError> {
        let bits = key.size() * 8;
        if bits < MIN_KEY_BITS {
            return Err(CryptoError::validation(format!(
                "rsa key of {} bits below minimum {}",
                bits, MIN_KEY_BITS
            )));
        }
        Ok(Self(key))
    }
}
