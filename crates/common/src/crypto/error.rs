//! Error taxonomy shared by every cryptographic engine.
//!
//! The variants deliberately carry as little as possible: an
//! [`CryptoError::Authentication`] never says *why* a tag or padding check
//! failed, so callers cannot be turned into decryption or padding oracles.
//! Detail, where it exists, goes to server-side `tracing::debug!` records only.

/// Errors produced by the KDF, AEAD, key-wrap and key-exchange engines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    /// The operating system random source could not be read.
    ///
    /// Fatal for the operation in progress: nothing falls back to a weaker
    /// source and nothing retries implicitly.
    #[error("secure random source unavailable")]
    Entropy,
    /// Tag mismatch, truncated envelope, wrong key or failed unwrap.
    #[error("authentication failed")]
    Authentication,
    /// Malformed input shape (wrong length, out-of-range DH value, bad PEM).
    ///
    /// Not a secrecy boundary, so the message may be shown to the caller.
    #[error("validation failed: {0}")]
    Validation(String),
}

impl CryptoError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CryptoError::Validation(msg.into())
    }
}
