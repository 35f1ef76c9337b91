use std::net::SocketAddr;

use clap::Args;

use service::process::{spawn_service, ProcessError};
use service::RefreshPolicy;

use crate::state::AppState;

#[derive(Args, Debug, Clone)]
pub struct Daemon {
    /// Override the configured listen address
    #[arg(long)]
    pub listen_addr: Option<SocketAddr>,

    /// Hex token signing secret (overrides secrets.toml)
    #[arg(long, env = "SEALNOTE_SIGNING_SECRET", hide_env_values = true)]
    pub signing_secret: Option<String>,

    /// Hex password hashing pepper (overrides secrets.toml)
    #[arg(long, env = "SEALNOTE_PEPPER", hide_env_values = true)]
    pub pepper: Option<String>,

    /// Override the configured log level
    #[arg(long)]
    pub log_level: Option<String>,

    /// Let refresh tokens be reused until they expire or are revoked
    #[arg(long)]
    pub reuse_refresh_tokens: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("state error: {0}")]
    StateError(#[from] crate::state::StateError),

    #[error("daemon failed: {0}")]
    Failed(#[from] ProcessError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Daemon {
    type Error = DaemonError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let mut state = AppState::load(ctx.config_path.clone())?;
        if let Some(addr) = self.listen_addr {
            state.config.listen_addr = addr;
        }
        if let Some(level) = &self.log_level {
            state.config.log_level = level.clone();
        }
        if self.reuse_refresh_tokens {
            state.config.refresh_policy = RefreshPolicy::ReuseUntilRevoked;
        }

        let (signing_secret, pepper) =
            state.load_secrets(self.signing_secret.as_deref(), self.pepper.as_deref())?;
        let config = state.service_config(signing_secret, pepper)?;

        spawn_service(&config).await?;
        Ok("daemon ended".to_string())
    }
}
