//! Content encryption using AES-256-GCM
//!
//! Every note (and every share payload) is sealed under its own random 256-bit
//! [`Secret`]. The sealed form is an [`Envelope`]:
//!
//! ```text
//! [ nonce: 12 bytes ][ ciphertext: n bytes ][ tag: 16 bytes ]
//! ```
//!
//! The nonce is drawn fresh from the system CSPRNG for every seal and
//! prepended, so [`Secret::open`] needs no external metadata. Opening fails
//! closed: a truncated envelope, a flipped bit or the wrong key all surface
//! as the same [`CryptoError::Authentication`], and no partial plaintext is
//! ever returned.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit, Nonce};
use aes_gcm::Aes256Gcm;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::CryptoError;
use super::random;

/// Size of a symmetric content key in bytes
pub const SECRET_SIZE: usize = 32;
/// Size of the AES-GCM nonce in bytes
pub const NONCE_SIZE: usize = 12;
/// Size of the AES-GCM authentication tag in bytes
pub const TAG_SIZE: usize = 16;

/// A 256-bit symmetric key used to seal and open envelopes.
///
/// The engine never stores keys; a `Secret` lives exactly as long as its
/// owner keeps it, and its bytes are overwritten with zeros on drop.
///
/// # Examples
///
/// ```ignore
/// let secret = Secret::generate()?;
/// let envelope = secret.seal(b"sensitive data")?;
/// let plaintext = secret.open(&envelope)?;
/// assert_eq!(plaintext, b"sensitive data");
/// ```
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; SECRET_SIZE]);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"[REDACTED]").finish()
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for Secret {}

impl From<[u8; SECRET_SIZE]> for Secret {
    fn from(bytes: [u8; SECRET_SIZE]) -> Self {
        Secret(bytes)
    }
}

impl Secret {
    /// Generate a new random content key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Entropy`] if the system random source fails.
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Self(random::array()?))
    }

    /// Create a secret from a byte slice
    ///
    /// # Errors
    ///
    /// Returns a validation error if the slice is not exactly `SECRET_SIZE` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        if data.len() != SECRET_SIZE {
            return Err(CryptoError::validation(format!(
                "invalid secret size, expected {}, got {}",
                SECRET_SIZE,
                data.len()
            )));
        }
        let mut buff = [0; SECRET_SIZE];
        buff.copy_from_slice(data);
        Ok(buff.into())
    }

    /// Get a reference to the secret key bytes
    pub fn bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Seal `plaintext` into an [`Envelope`].
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Entropy`] if a nonce cannot be drawn.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Envelope, CryptoError> {
        let cipher = self.cipher()?;

        let nonce_bytes: [u8; NONCE_SIZE] = random::array()?;
        let nonce = Nonce::<Aes256Gcm>::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| {
            // only reachable for plaintexts beyond the GCM length limit
            CryptoError::validation("plaintext too large to seal")
        })?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(Envelope(out))
    }

    /// Open an [`Envelope`] sealed under this key.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Authentication`] for any failure: truncated
    /// input, tag mismatch, tampering or the wrong key.
    pub fn open(&self, envelope: &Envelope) -> Result<Vec<u8>, CryptoError> {
        let data = envelope.as_bytes();
        if data.len() < NONCE_SIZE + TAG_SIZE {
            tracing::debug!(len = data.len(), "envelope shorter than nonce and tag");
            return Err(CryptoError::Authentication);
        }

        let cipher = self.cipher()?;
        let nonce = Nonce::<Aes256Gcm>::from_slice(&data[..NONCE_SIZE]);
        cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| CryptoError::Authentication)
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(self.bytes())
            .map_err(|_| CryptoError::validation("invalid AES-256 key length"))
    }
}

/// The sealed form of a payload: `nonce || ciphertext || tag`.
///
/// Immutable once produced. Travels as standard base64 in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Envelope(Vec<u8>);

impl Envelope {
    /// Wrap raw envelope bytes, e.g. read back from storage.
    ///
    /// No shape check happens here; [`Secret::open`] rejects malformed
    /// envelopes uniformly.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Envelope(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The nonce prefix, if the envelope is long enough to carry one.
    pub fn nonce(&self) -> Option<&[u8]> {
        self.0.get(..NONCE_SIZE)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        STANDARD
            .decode(encoded.trim())
            .map(Envelope)
            .map_err(|_| CryptoError::validation("envelope is not valid base64"))
    }
}

impl From<Envelope> for String {
    fn from(envelope: Envelope) -> Self {
        envelope.to_base64()
    }
}

impl TryFrom<String> for Envelope {
    type Error = CryptoError;

    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        Envelope::from_base64(&encoded)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_secret_seal_open() {
        let secret = Secret::generate().unwrap();
        let data = b"hello world, this is a test message for encryption";

        let envelope = secret.seal(data).unwrap();
        let opened = secret.open(&envelope).unwrap();

        assert_eq!(data.as_slice(), opened.as_slice());
    }

    #[test]
    fn test_envelope_layout() {
        let secret = Secret::generate().unwrap();
        let data = b"twelve bytes";

        let envelope = secret.seal(data).unwrap();
        assert_eq!(envelope.len(), NONCE_SIZE + data.len() + TAG_SIZE);
        assert_eq!(envelope.nonce().unwrap().len(), NONCE_SIZE);
    }

    #[test]
    fn test_fresh_nonce_per_seal() {
        let secret = Secret::generate().unwrap();
        let a = secret.seal(b"same plaintext").unwrap();
        let b = secret.seal(b"same plaintext").unwrap();
        assert_ne!(a.nonce(), b.nonce());
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let k1 = Secret::generate().unwrap();
        let k2 = Secret::generate().unwrap();
        let envelope = k1.seal(b"for k1 only").unwrap();
        assert_eq!(k2.open(&envelope), Err(CryptoError::Authentication));
    }

    #[test]
    fn test_every_bit_flip_fails() {
        let secret = Secret::generate().unwrap();
        let envelope = secret.seal(b"integrity").unwrap();
        let bytes = envelope.as_bytes().to_vec();

        // flip one bit at a time through ciphertext and tag
        for i in NONCE_SIZE..bytes.len() {
            for bit in [0x01u8, 0x80] {
                let mut tampered = bytes.clone();
                tampered[i] ^= bit;
                let result = secret.open(&Envelope::from_bytes(tampered));
                assert_eq!(result, Err(CryptoError::Authentication), "byte {}", i);
            }
        }
    }

    #[test]
    fn test_nonce_tamper_fails() {
        let secret = Secret::generate().unwrap();
        let mut bytes = secret.seal(b"integrity").unwrap().into_bytes();
        bytes[0] ^= 0x01;
        assert!(secret.open(&Envelope::from_bytes(bytes)).is_err());
    }

    #[test]
    fn test_truncated_input_fails_uniformly() {
        let secret = Secret::generate().unwrap();
        for len in [0, 1, NONCE_SIZE - 1, NONCE_SIZE, NONCE_SIZE + TAG_SIZE - 1] {
            let result = secret.open(&Envelope::from_bytes(vec![0u8; len]));
            assert_eq!(result, Err(CryptoError::Authentication), "len {}", len);
        }
    }

    #[test]
    fn test_empty_plaintext() {
        let secret = Secret::generate().unwrap();
        let envelope = secret.seal(b"").unwrap();
        assert_eq!(envelope.len(), NONCE_SIZE + TAG_SIZE);
        assert!(secret.open(&envelope).unwrap().is_empty());
    }

    #[test]
    fn test_secret_size_validation() {
        let too_short = [1u8; 16];
        let too_long = [1u8; 64];

        assert!(Secret::from_slice(&too_short).is_err());
        assert!(Secret::from_slice(&too_long).is_err());

        let just_right = [1u8; SECRET_SIZE];
        assert!(Secret::from_slice(&just_right).is_ok());
    }

    #[test]
    fn test_secret_debug_redacts() {
        let secret = Secret::from([0xAB; SECRET_SIZE]);
        let debug = format!("{:?}", secret);
        assert!(debug.contains("REDACTED"));
        assert!(!debug.to_lowercase().contains("abab"));
    }

    #[test]
    fn test_envelope_serde_json_roundtrip() {
        let secret = Secret::generate().unwrap();
        let envelope = secret.seal(b"over the wire").unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.starts_with('"'));
        let recovered: Envelope = serde_json::from_str(&json).unwrap();

        assert_eq!(secret.open(&recovered).unwrap(), b"over the wire");
    }

    #[test]
    fn test_envelope_rejects_bad_base64() {
        assert!(matches!(
            Envelope::from_base64("not base64!!"),
            Err(CryptoError::Validation(_))
        ));
    }
}
