/**
 * Cryptographic types and operations.
 *  - Password hashing and key derivation
 *  - Authenticated content encryption
 *  - RSA and Diffie-Hellman key sharing
 */
pub mod crypto;
/**
 * Client-side sealing of notes under a
 *  password-derived master key.
 */
pub mod note;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::crypto::{
        AccessHash, CryptoError, DhKeyPair, DhParams, DhPublicKey, Envelope, KdfParams, Salt,
        Secret, SecretShare, StoredHash, WrapPrivateKey, WrapPublicKey,
    };
    pub use crate::note::{MasterKey, Note, SealedNote};
    pub use crate::version::build_info;
}
