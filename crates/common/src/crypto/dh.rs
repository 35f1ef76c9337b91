//! Finite-field Diffie-Hellman key exchange over RFC 3526 group 14
//!
//! Two parties who have never met each hold a [`DhKeyPair`] over the same
//! public [`DhParams`], swap public values, and arrive at the same
//! [`SharedSecret`]. The shared secret is never used directly: it is fed
//! through HKDF-SHA256 (no salt, fixed info label) to produce a 32-byte
//! session [`Secret`] for the AEAD engine, and then dropped.
//!
//! Nothing in the exchange authenticates the peer. Both sides must compare
//! [`fingerprint`]s of the public values out of band before trusting the
//! session key.

use std::fmt;
use std::str::FromStr;

use hkdf::Hkdf;
use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, Zeroizing};

use super::error::CryptoError;
use super::random;
use super::secret::Secret;

/// HKDF info label for session keys
pub const SESSION_KEY_INFO: &[u8] = b"E2EE-Session-Key";
/// Number of hash bytes shown in a fingerprint
pub const FINGERPRINT_BYTES: usize = 16;

const SAMPLE_ATTEMPTS: usize = 64;

/// 2048-bit MODP prime from RFC 3526, section 3. Generator 2.
const GROUP14_PRIME: [u8; 256] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe4, 0x5b, 0x3d,
    0xc2, 0x00, 0x7c, 0xb8, 0xa1, 0x63, 0xbf, 0x05, 0x98, 0xda, 0x48, 0x36,
    0x1c, 0x55, 0xd3, 0x9a, 0x69, 0x16, 0x3f, 0xa8, 0xfd, 0x24, 0xcf, 0x5f,
    0x83, 0x65, 0x5d, 0x23, 0xdc, 0xa3, 0xad, 0x96, 0x1c, 0x62, 0xf3, 0x56,
    0x20, 0x85, 0x52, 0xbb, 0x9e, 0xd5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6d,
    0x67, 0x0c, 0x35, 0x4e, 0x4a, 0xbc, 0x98, 0x04, 0xf1, 0x74, 0x6c, 0x08,
    0xca, 0x18, 0x21, 0x7c, 0x32, 0x90, 0x5e, 0x46, 0x2e, 0x36, 0xce, 0x3b,
    0xe3, 0x9e, 0x77, 0x2c, 0x18, 0x0e, 0x86, 0x03, 0x9b, 0x27, 0x83, 0xa2,
    0xec, 0x07, 0xa2, 0x8f, 0xb5, 0xc5, 0x5d, 0xf0, 0x6f, 0x4c, 0x52, 0xc9,
    0xde, 0x2b, 0xcb, 0xf6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7c,
    0xea, 0x95, 0x6a, 0xe5, 0x15, 0xd2, 0x26, 0x18, 0x98, 0xfa, 0x05, 0x10,
    0x15, 0x72, 0x8e, 0x5a, 0x8a, 0xac, 0xaa, 0x68, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff,
];

/// Public group parameters `(p, g)` shared by every party.
#[derive(Clone, PartialEq, Eq)]
pub struct DhParams {
    p: BigUint,
    g: BigUint,
}

impl fmt::Debug for DhParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DhParams")
            .field("bits", &self.p.bits())
            .field("g", &self.g)
            .finish()
    }
}

impl Default for DhParams {
    fn default() -> Self {
        Self::group14()
    }
}

impl DhParams {
    /// The RFC 3526 2048-bit safe-prime group with generator 2.
    pub fn group14() -> Self {
        Self {
            p: BigUint::from_bytes_be(&GROUP14_PRIME),
            g: BigUint::from(2u32),
        }
    }

    pub fn p(&self) -> &BigUint {
        &self.p
    }

    pub fn g(&self) -> &BigUint {
        &self.g
    }

    /// Length of the modulus in bytes
    pub fn modulus_len(&self) -> usize {
        self.p.bits().div_ceil(8) as usize
    }

    /// `p - 1`, the exclusive upper bound for acceptable public values
    fn p_minus_one(&self) -> BigUint {
        &self.p - 1u32
    }

    /// Check `1 < value < p - 1`.
    fn check_public(&self, value: &BigUint) -> Result<(), CryptoError> {
        if *value <= BigUint::one() {
            return Err(CryptoError::validation(
                "dh public value must be greater than 1",
            ));
        }
        if *value >= self.p_minus_one() {
            return Err(CryptoError::validation(
                "dh public value must be less than p-1",
            ));
        }
        Ok(())
    }

    /// Draw an exponent uniformly from `[1, p-2]` by rejection sampling.
    fn sample_exponent(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let max = &self.p - 2u32;
        let bits = max.bits();
        let len = bits.div_ceil(8) as usize;
        let top_mask = match bits % 8 {
            0 => 0xff,
            r => (1u8 << r) - 1,
        };

        let mut buff = Zeroizing::new(vec![0u8; len]);
        for _ in 0..SAMPLE_ATTEMPTS {
            random::fill(&mut buff)?;
            buff[0] &= top_mask;

            let mut candidate = BigUint::from_bytes_be(&buff);
            let in_range = candidate >= BigUint::one() && candidate <= max;
            candidate.set_zero();
            if in_range {
                return Ok(buff);
            }
        }
        // with this prime a rejection is a ~2^-64 event; many in a row means a broken source
        tracing::error!("dh exponent sampling exhausted its attempts");
        Err(CryptoError::Entropy)
    }
}

/// Return the well-known group parameters.
///
/// Parameters are fixed and public; nothing is generated per exchange.
pub fn generate_params() -> DhParams {
    DhParams::group14()
}

/// A public value `g^x mod p`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DhPublicKey(BigUint);

impl fmt::Debug for DhPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DhPublicKey({})", fingerprint(self))
    }
}

impl fmt::Display for DhPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl DhPublicKey {
    /// Build from big-endian bytes. Range is checked when the value is used.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.is_empty() {
            return Err(CryptoError::validation("empty dh public value"));
        }
        Ok(Self(BigUint::from_bytes_be(bytes)))
    }

    /// Minimal big-endian bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_bytes_be()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|_| CryptoError::validation("dh public value is not valid hex"))?;
        Self::from_bytes(&bytes)
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }

    /// Check this value lies strictly between 1 and `p - 1`.
    pub fn validate(&self, params: &DhParams) -> Result<(), CryptoError> {
        params.check_public(&self.0)
    }
}

impl From<DhPublicKey> for String {
    fn from(key: DhPublicKey) -> Self {
        key.to_hex()
    }
}

impl TryFrom<String> for DhPublicKey {
    type Error = CryptoError;
    fn try_from(encoded: String) -> Result<Self, Self::Error> {
        Self::from_hex(&encoded)
    }
}

impl FromStr for DhPublicKey {
    type Err = CryptoError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// A private exponent, kept as big-endian bytes that are zeroized on drop.
///
/// Big-integer temporaries built during exponentiation are not wiped.
#[derive(Clone)]
pub struct DhPrivateKey(Zeroizing<Vec<u8>>);

impl fmt::Debug for DhPrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DhPrivateKey").field(&"[REDACTED]").finish()
    }
}

impl DhPrivateKey {
    /// Import an exponent, checking it lies in `[1, p-2]`.
    pub fn from_bytes(bytes: &[u8], params: &DhParams) -> Result<Self, CryptoError> {
        let mut x = BigUint::from_bytes_be(bytes);
        let max = &params.p - 2u32;
        let ok = x >= BigUint::one() && x <= max;
        x.set_zero();
        if !ok {
            return Err(CryptoError::validation("dh private exponent out of range"));
        }
        Ok(Self(Zeroizing::new(bytes.to_vec())))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    fn exponent(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }
}

/// One party's state for a single exchange.
#[derive(Clone, Debug)]
pub struct DhKeyPair {
    private: DhPrivateKey,
    public: DhPublicKey,
}

impl DhKeyPair {
    /// Draw a private exponent from `[1, p-2]` and compute `g^x mod p`.
    pub fn generate(params: &DhParams) -> Result<Self, CryptoError> {
        let private = DhPrivateKey(params.sample_exponent()?);
        Ok(Self::from_private(private, params))
    }

    pub fn from_private(private: DhPrivateKey, params: &DhParams) -> Self {
        let mut x = private.exponent();
        let public = DhPublicKey(params.g.modpow(&x, &params.p));
        x.set_zero();
        Self { private, public }
    }

    pub fn public(&self) -> &DhPublicKey {
        &self.public
    }

    pub fn private(&self) -> &DhPrivateKey {
        &self.private
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public)
    }

    /// Shorthand for [`compute_shared_secret`] with this pair's exponent.
    pub fn agree(&self, peer: &DhPublicKey, params: &DhParams) -> Result<SharedSecret, CryptoError> {
        compute_shared_secret(peer, &self.private, params)
    }
}

/// The raw agreed value, as minimal big-endian bytes.
///
/// Never persisted, never logged. Zeroized on drop.
pub struct SharedSecret(Zeroizing<Vec<u8>>);

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SharedSecret").field(&"[REDACTED]").finish()
    }
}

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// See [`derive_session_key`].
    pub fn session_key(&self) -> Result<Secret, CryptoError> {
        derive_session_key(self)
    }
}

/// Compute `peer^x mod p` after rejecting degenerate peer values.
///
/// # Errors
///
/// [`CryptoError::Validation`] if `peer <= 1` or `peer >= p - 1`.
pub fn compute_shared_secret(
    peer: &DhPublicKey,
    mine: &DhPrivateKey,
    params: &DhParams,
) -> Result<SharedSecret, CryptoError> {
    params.check_public(&peer.0)?;

    let mut x = mine.exponent();
    let mut s = peer.0.modpow(&x, &params.p);
    x.set_zero();

    let bytes = Zeroizing::new(s.to_bytes_be());
    let degenerate = s.is_one();
    s.set_zero();
    if degenerate {
        return Err(CryptoError::validation("dh shared secret is degenerate"));
    }
    Ok(SharedSecret(bytes))
}

/// Expand a shared secret into a 32-byte session key.
///
/// HKDF-SHA256, no salt, info [`SESSION_KEY_INFO`].
pub fn derive_session_key(secret: &SharedSecret) -> Result<Secret, CryptoError> {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut okm = [0u8; 32];
    hk.expand(SESSION_KEY_INFO, &mut okm)
        .map_err(|_| CryptoError::validation("hkdf output length invalid"))?;
    let key = Secret::from(okm);
    okm.zeroize();
    Ok(key)
}

/// Human-comparable digest of a public value.
///
/// First 16 bytes of `SHA-256(public)`, upper-case hex, colon separated.
pub fn fingerprint(public: &DhPublicKey) -> String {
    let digest = Sha256::digest(public.to_bytes());
    digest[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_group14_shape() {
        let params = generate_params();
        assert_eq!(params.p().bits(), 2048);
        assert_eq!(params.modulus_len(), 256);
        assert_eq!(params.g(), &BigUint::from(2u32));
        // safe prime: g^((p-1)/2) == 1 for a quadratic residue generator
        let q = (params.p() - 1u32) >> 1;
        assert!(params.g().modpow(&q, params.p()).is_one());
    }

    #[test]
    fn test_both_parties_derive_same_session_key() {
        let params = generate_params();
        let alice = DhKeyPair::generate(&params).unwrap();
        let bob = DhKeyPair::generate(&params).unwrap();

        let k_ab = compute_shared_secret(bob.public(), alice.private(), &params)
            .unwrap()
            .session_key()
            .unwrap();
        let k_ba = compute_shared_secret(alice.public(), bob.private(), &params)
            .unwrap()
            .session_key()
            .unwrap();

        assert_eq!(k_ab, k_ba);
    }

    #[test]
    fn test_rejects_degenerate_peer_values() {
        let params = generate_params();
        let me = DhKeyPair::generate(&params).unwrap();

        let zero = DhPublicKey(BigUint::from(0u32));
        let one = DhPublicKey(BigUint::one());
        let p_minus_one = DhPublicKey(params.p() - 1u32);
        let p = DhPublicKey(params.p().clone());

        for peer in [zero, one, p_minus_one, p] {
            let result = compute_shared_secret(&peer, me.private(), &params);
            assert!(matches!(result, Err(CryptoError::Validation(_))));
        }
    }

    #[test]
    fn test_accepts_boundary_values() {
        let params = generate_params();
        let me = DhKeyPair::generate(&params).unwrap();

        let two = DhPublicKey(BigUint::from(2u32));
        let p_minus_two = DhPublicKey(params.p() - 2u32);
        assert!(compute_shared_secret(&two, me.private(), &params).is_ok());
        assert!(compute_shared_secret(&p_minus_two, me.private(), &params).is_ok());
    }

    #[test]
    fn test_public_value_in_range() {
        let params = generate_params();
        for _ in 0..4 {
            let pair = DhKeyPair::generate(&params).unwrap();
            assert!(pair.public().validate(&params).is_ok());
        }
    }

    #[test]
    fn test_private_import_range() {
        let params = generate_params();
        assert!(DhPrivateKey::from_bytes(&[0], &params).is_err());
        assert!(DhPrivateKey::from_bytes(&(params.p() - 1u32).to_bytes_be(), &params).is_err());

        let x = DhPrivateKey::from_bytes(&[5], &params).unwrap();
        let pair = DhKeyPair::from_private(x, &params);
        assert_eq!(pair.public().value(), &BigUint::from(32u32));
    }

    #[test]
    fn test_session_key_known_answer() {
        let secret = SharedSecret(Zeroizing::new((1u8..=32).collect()));
        let key = derive_session_key(&secret).unwrap();
        assert_eq!(
            hex::encode(key.bytes()),
            "16de4a728730db90a4a3d3e45d587f5bdf876be793870eebf80a9e5bf2276a38"
        );
    }

    #[test]
    fn test_fingerprint_format() {
        let public = DhPublicKey(BigUint::from(2u32));
        assert_eq!(
            fingerprint(&public),
            "DB:C1:B4:C9:00:FF:E4:8D:57:5B:5D:A5:C6:38:04:01"
        );
    }

    #[test]
    fn test_public_key_hex_roundtrip() {
        let params = generate_params();
        let pair = DhKeyPair::generate(&params).unwrap();
        let hex = pair.public().to_hex();
        let recovered: DhPublicKey = hex.parse().unwrap();
        assert_eq!(&recovered, pair.public());
        assert!(DhPublicKey::from_hex("zz").is_err());
    }

    #[test]
    fn test_session_key_seals_content() {
        let params = generate_params();
        let alice = DhKeyPair::generate(&params).unwrap();
        let bob = DhKeyPair::generate(&params).unwrap();

        let key_a = alice.agree(bob.public(), &params).unwrap().session_key().unwrap();
        let key_b = bob.agree(alice.public(), &params).unwrap().session_key().unwrap();

        let envelope = key_a.seal(b"hello bob").unwrap();
        assert_eq!(key_b.open(&envelope).unwrap(), b"hello bob");
    }
}
