//! Access to the operating system CSPRNG.

use rand::{CryptoRng, RngCore};

use super::error::CryptoError;

/// Fill `buf` from the system random source.
///
/// # Errors
///
/// Returns [`CryptoError::Entropy`] if the source is unavailable.
pub fn fill(buf: &mut [u8]) -> Result<(), CryptoError> {
    getrandom::getrandom(buf).map_err(|e| {
        tracing::error!("system random source failed: {}", e);
        CryptoError::Entropy
    })
}

/// Draw a fixed-size array of random bytes.
pub fn array<const N: usize>() -> Result<[u8; N], CryptoError> {
    let mut buff = [0u8; N];
    fill(&mut buff)?;
    Ok(buff)
}

/// An `RngCore` over the system source for APIs that cannot return errors.
///
/// `fill_bytes` has no error channel, so a failure is recorded instead of
/// panicking. Callers must check [`GuardedRng::finish`] and discard whatever
/// was produced with the rng if it reports a failure.
#[derive(Debug, Default)]
pub(crate) struct GuardedRng {
    failed: bool,
}

impl GuardedRng {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn finish(self) -> Result<(), CryptoError> {
        if self.failed {
            Err(CryptoError::Entropy)
        } else {
            Ok(())
        }
    }
}

impl RngCore for GuardedRng {
    fn next_u32(&mut self) -> u32 {
        let mut b = [0u8; 4];
        self.fill_bytes(&mut b);
        u32::from_le_bytes(b)
    }

    fn next_u64(&mut self) -> u64 {
        let mut b = [0u8; 8];
        self.fill_bytes(&mut b);
        u64::from_le_bytes(b)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        if fill(dest).is_err() {
            self.failed = true;
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        getrandom::getrandom(dest).map_err(|e| {
            self.failed = true;
            rand::Error::from(e.code())
        })
    }
}

impl CryptoRng for GuardedRng {}
