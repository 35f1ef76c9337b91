//! Cryptographic primitives for sealnote
//!
//! This module provides the cryptographic foundation for sealnote's security model:
//!
//! - **Password hashing & master keys**: Argon2id with versioned parameters
//! - **Encryption**: AES-256-GCM for content encryption with per-note secrets
//! - **Key Sharing**: RSA-OAEP key wrapping, or finite-field Diffie-Hellman
//!   feeding an HKDF session key
//!
//! # Security Model
//!
//! ## Credentials
//! The server keeps `Argon2id(password || pepper, salt)` per user, encoded as a
//! [`StoredHash`] that records its own parameters. The client separately derives
//! a master key from the password and a second salt; the server never sees it.
//!
//! ## Content Encryption
//! Every note has its own AES-256-GCM [`Secret`]. Titles and bodies are sealed
//! into [`Envelope`]s (`nonce || ciphertext || tag`) with a fresh random nonce
//! per seal.
//!
//! ## Key Sharing
//! To share a note, its content key is wrapped for the recipient as a
//! [`SecretShare`]:
//! 1. **RSA-OAEP**: encrypt the content key to the recipient's RSA public key, or
//! 2. **DH**: agree on a shared secret over RFC 3526 group 14, expand it with
//!    HKDF-SHA256 into a session key, and seal the content key under it.
//!
//! DH peers must compare [`fingerprint`]s out of band; the exchange itself is
//! unauthenticated.
//!
//! ## Failures
//! Every engine returns [`CryptoError`]. Randomness failures are never
//! retried or papered over, and authentication failures never say why.

pub mod access;
pub mod dh;
mod error;
pub mod kdf;
pub mod key_wrap;
pub mod random;
mod secret;
mod secret_share;

pub use access::AccessHash;
pub use dh::{
    compute_shared_secret, derive_session_key, fingerprint, generate_params, DhKeyPair, DhParams,
    DhPrivateKey, DhPublicKey, SharedSecret,
};
pub use error::CryptoError;
pub use kdf::{derive, DerivedKey, KdfParams, Salt, StoredHash};
pub use key_wrap::{WrapPrivateKey, WrapPublicKey};
pub use secret::{Envelope, Secret, NONCE_SIZE, SECRET_SIZE, TAG_SIZE};
pub use secret_share::SecretShare;
