//! Password-based key derivation using Argon2id
//!
//! One derivation function serves two callers:
//!
//! - the server, which stores a [`StoredHash`] of `password || pepper` per credential
//! - the client, which derives its note master key from the password and the
//!   `kdf_salt` handed back at login
//!
//! Parameters are never implicit. Every [`StoredHash`] carries the scheme
//! version and the `m`, `t`, `p` it was made with, so hashes produced before a
//! parameter bump keep verifying, and [`StoredHash::needs_rehash`] tells the
//! caller when to rotate.

use std::fmt;
use std::str::FromStr;

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::error::CryptoError;
use super::random;
use super::secret::Secret;

/// Length of a credential salt in bytes
pub const SALT_SIZE: usize = 16;
/// Length of a derived key in bytes
pub const KEY_SIZE: usize = 32;

/// Memory cost floor, in KiB (64 MiB)
pub const MIN_MEMORY_KIB: u32 = 64 * 1024;
/// Iteration floor
pub const MIN_ITERATIONS: u32 = 1;
/// Lane floor
pub const MIN_PARALLELISM: u32 = 4;

/// Version tag written into every stored hash
pub const SCHEME_VERSION: u32 = 1;
const SCHEME_ID: &str = "sealnote-argon2id";

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// memory cost in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: MIN_MEMORY_KIB,
            iterations: MIN_ITERATIONS,
            parallelism: MIN_PARALLELISM,
        }
    }
}

impl fmt::Display for KdfParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "m={},t={},p={}",
            self.memory_kib, self.iterations, self.parallelism
        )
    }
}

impl KdfParams {
    /// Build parameters for new derivations.
    ///
    /// # Errors
    ///
    /// Rejects anything below the 64 MiB / 1 iteration / 4 lane floor.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, CryptoError> {
        let params = Self {
            memory_kib,
            iterations,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check these parameters against the floor.
    pub fn validate(&self) -> Result<(), CryptoError> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(CryptoError::validation(format!(
                "kdf memory cost {} KiB below minimum {} KiB",
                self.memory_kib, MIN_MEMORY_KIB
            )));
        }
        if self.iterations < MIN_ITERATIONS {
            return Err(CryptoError::validation("kdf iterations below minimum"));
        }
        if self.parallelism < MIN_PARALLELISM {
            return Err(CryptoError::validation(format!(
                "kdf parallelism {} below minimum {}",
                self.parallelism, MIN_PARALLELISM
            )));
        }
        self.argon2().map(|_| ())
    }

    /// True if any cost is lower than the matching cost in `other`.
    pub fn weaker_than(&self, other: &KdfParams) -> bool {
        self.memory_kib < other.memory_kib
            || self.iterations < other.iterations
            || self.parallelism < other.parallelism
    }

    fn argon2(&self) -> Result<Argon2<'static>, CryptoError> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(KEY_SIZE),
        )
        .map_err(|e| CryptoError::validation(format!("invalid argon2 parameters: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }
}

/// A 16-byte random salt. Generated once per credential, never derived.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Salt([u8; SALT_SIZE]);

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_base64())
    }
}

impl From<[u8; SALT_SIZE]> for Salt {
    fn from(bytes: [u8; SALT_SIZE]) -> Self {
        Salt(bytes)
    }
}

impl Salt {
    pub fn generate() -> Result<Self, CryptoError> {
        Ok(Salt(random::array()?))
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SALT_SIZE] = data.try_into().map_err(|_| {
            CryptoError::validation(format!(
                "invalid salt size, expected {}, got {}",
                SALT_SIZE,
                data.len()
            ))
        })?;
        Ok(Salt(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self, CryptoError> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::validation("salt is not valid base64"))?;
        Self::from_slice(&data)
    }
}

impl From<Salt> for String {
    fn from(salt: Salt) -> Self {
        salt.to_base64()
    }
}

impl TryFrom<String> for Salt {
    type Error = CryptoError;
    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        Salt::from_base64(&encoded)
    }
}

/// 32 bytes of Argon2id output. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; KEY_SIZE]);

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DerivedKey").field(&"[REDACTED]").finish()
    }
}

impl PartialEq for DerivedKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for DerivedKey {}

impl DerivedKey {
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Use the derived key directly as an AEAD key.
    pub fn to_secret(&self) -> Secret {
        Secret::from(self.0)
    }

    fn from_slice(data: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; KEY_SIZE] = data
            .try_into()
            .map_err(|_| CryptoError::validation("derived key has wrong length"))?;
        Ok(DerivedKey(bytes))
    }
}

/// Derive a key from `password || pepper` and `salt`.
///
/// Deterministic for identical inputs. The concatenated input lives in a
/// zeroizing buffer for the duration of the call.
///
/// # Errors
///
/// Returns a validation error for an empty password or unusable parameters.
pub fn derive(
    password: &[u8],
    salt: &Salt,
    pepper: Option<&[u8]>,
    params: &KdfParams,
) -> Result<DerivedKey, CryptoError> {
    if password.is_empty() {
        return Err(CryptoError::validation("password must not be empty"));
    }

    let pepper = pepper.unwrap_or_default();
    let mut input = Zeroizing::new(Vec::with_capacity(password.len() + pepper.len()));
    input.extend_from_slice(password);
    input.extend_from_slice(pepper);

    let mut out = [0u8; KEY_SIZE];
    params
        .argon2()?
        .hash_password_into(&input, salt.bytes(), &mut out)
        .map_err(|e| CryptoError::validation(format!("argon2 derivation failed: {}", e)))?;

    let key = DerivedKey(out);
    out.zeroize();
    Ok(key)
}

/// A credential hash with everything needed to verify it later.
///
/// Text form:
///
/// ```text
/// $sealnote-argon2id$v=1$m=65536,t=1,p=4$<salt>$<hash>
/// ```
///
/// with salt and hash in unpadded standard base64.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredHash {
    version: u32,
    params: KdfParams,
    salt: Salt,
    hash: DerivedKey,
}

impl StoredHash {
    /// Hash a new credential under a fresh random salt.
    pub fn create(
        password: &[u8],
        pepper: Option<&[u8]>,
        params: &KdfParams,
    ) -> Result<Self, CryptoError> {
        params.validate()?;
        let salt = Salt::generate()?;
        let hash = derive(password, &salt, pepper, params)?;
        Ok(Self {
            version: SCHEME_VERSION,
            params: *params,
            salt,
            hash,
        })
    }

    /// Re-derive with the stored salt and parameters and compare in constant time.
    pub fn verify(&self, password: &[u8], pepper: Option<&[u8]>) -> Result<bool, CryptoError> {
        if password.is_empty() {
            return Ok(false);
        }
        let candidate = derive(password, &self.salt, pepper, &self.params)?;
        Ok(bool::from(
            candidate.as_bytes().ct_eq(self.hash.as_bytes()),
        ))
    }

    /// A hash no password verifies against, for running a full derivation
    /// when the credential being checked does not exist.
    pub fn unmatchable(params: &KdfParams) -> Self {
        Self {
            version: SCHEME_VERSION,
            params: *params,
            salt: Salt::from([0u8; SALT_SIZE]),
            hash: DerivedKey([0u8; KEY_SIZE]),
        }
    }

    /// True if this hash was made under an older scheme or weaker parameters.
    pub fn needs_rehash(&self, current: &KdfParams) -> bool {
        self.version != SCHEME_VERSION || self.params.weaker_than(current)
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        encoded.parse()
    }
}

impl fmt::Display for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "${}$v={}${}${}${}",
            SCHEME_ID,
            self.version,
            self.params,
            STANDARD_NO_PAD.encode(self.salt.bytes()),
            STANDARD_NO_PAD.encode(self.hash.as_bytes()),
        )
    }
}

impl FromStr for StoredHash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CryptoError::validation("malformed stored hash");

        let mut parts = s.split('$');
        if parts.next() != Some("") || parts.next() != Some(SCHEME_ID) {
            return Err(malformed());
        }

        let version = parts
            .next()
            .and_then(|v| v.strip_prefix("v="))
            .and_then(|v| v.parse::<u32>().ok())
            .ok_or_else(malformed)?;
        if version == 0 || version > SCHEME_VERSION {
            return Err(CryptoError::validation(format!(
                "unsupported hash scheme version {}",
                version
            )));
        }

        let params = parse_params(parts.next().ok_or_else(malformed)?).ok_or_else(malformed)?;
        // stored parameters may predate the current floor; they only need to be runnable
        params.argon2()?;

        let salt = STANDARD_NO_PAD
            .decode(parts.next().ok_or_else(malformed)?)
            .map_err(|_| malformed())?;
        let hash = STANDARD_NO_PAD
            .decode(parts.next().ok_or_else(malformed)?)
            .map_err(|_| malformed())?;
        if parts.next().is_some() {
            return Err(malformed());
        }

        Ok(Self {
            version,
            params,
            salt: Salt::from_slice(&salt)?,
            hash: DerivedKey::from_slice(&hash)?,
        })
    }
}

fn parse_params(s: &str) -> Option<KdfParams> {
    let mut memory_kib = None;
    let mut iterations = None;
    let mut parallelism = None;
    for pair in s.split(',') {
        let (key, value) = pair.split_once('=')?;
        let value = value.parse::<u32>().ok()?;
        match key {
            "m" => memory_kib = Some(value),
            "t" => iterations = Some(value),
            "p" => parallelism = Some(value),
            _ => return None,
        }
    }
    Some(KdfParams {
        memory_kib: memory_kib?,
        iterations: iterations?,
        parallelism: parallelism?,
    })
}
