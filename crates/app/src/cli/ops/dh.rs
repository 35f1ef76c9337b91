use std::path::PathBuf;

use clap::Args;

use common::crypto::{fingerprint, generate_params, CryptoError, DhKeyPair, DhPublicKey};

use crate::state::write_private;

/// Generate a Diffie-Hellman key pair and show its fingerprint.
///
/// Fingerprints must be compared with the peer over a separate channel before
/// any key is wrapped to them.
#[derive(Args, Debug, Clone)]
pub struct Dh {
    /// Write the private exponent (hex) to this file
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// A peer's public value (hex) to fingerprint for comparison
    #[arg(long)]
    pub peer_public: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DhError {
    #[error("dh failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Dh {
    type Error = DhError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let params = generate_params();

        let mut output = Vec::new();
        if let Some(peer) = &self.peer_public {
            let peer = DhPublicKey::from_hex(peer)?;
            peer.validate(&params)?;
            output.push(format!("Peer fingerprint: {}", fingerprint(&peer)));
        }

        let pair = tokio::task::spawn_blocking(move || DhKeyPair::generate(&params))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;

        output.push(format!("Public value: {}", pair.public().to_hex()));
        output.push(format!("Fingerprint: {}", pair.fingerprint()));

        if let Some(path) = &self.out {
            let private = zeroize::Zeroizing::new(hex::encode(pair.private().as_bytes()));
            write_private(path, private.as_bytes())?;
            output.push(format!("Private exponent written to: {}", path.display()));
        }

        Ok(output.join("\n"))
    }
}
