use std::fs;
use std::path::PathBuf;

use clap::Args;

use common::crypto::{key_wrap::DEFAULT_KEY_BITS, CryptoError, WrapPrivateKey};

use crate::state::write_private;

/// Generate an RSA key pair for receiving wrapped note keys.
#[derive(Args, Debug, Clone)]
pub struct Keygen {
    /// Directory to write the PEM files to
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,

    /// File name stem; writes <name>.pem and <name>.pub.pem
    #[arg(long, default_value = "sealnote")]
    pub name: String,

    /// Modulus size in bits
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    pub bits: usize,

    /// Overwrite existing files
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum KeygenError {
    #[error("refusing to overwrite {0}, pass --force")]
    Exists(PathBuf),
    #[error("key generation failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Keygen {
    type Error = KeygenError;
    type Output = String;

    async fn execute(&self, _ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let private_path = self.out_dir.join(format!("{}.pem", self.name));
        let public_path = self.out_dir.join(format!("{}.pub.pem", self.name));
        for path in [&private_path, &public_path] {
            if path.exists() && !self.force {
                return Err(KeygenError::Exists(path.clone()));
            }
        }

        // RSA generation is slow; keep it off the async workers
        let bits = self.bits;
        let key = tokio::task::spawn_blocking(move || WrapPrivateKey::generate(bits))
            .await
            .map_err(|e| std::io::Error::other(e.to_string()))??;

        fs::create_dir_all(&self.out_dir)?;
        let private_pem = key.to_pem()?;
        write_private(&private_path, private_pem.as_bytes())?;
        fs::write(&public_path, key.public().to_pem()?)?;

        Ok(format!(
            "Generated RSA-{} key pair\n\
             - Private key: {}\n\
             - Public key: {}",
            self.bits,
            private_path.display(),
            public_path.display()
        ))
    }
}
