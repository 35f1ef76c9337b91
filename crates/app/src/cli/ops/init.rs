use std::net::SocketAddr;

use clap::Args;

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// API server listen address
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub listen_addr: SocketAddr,

    /// Also write daily rolling log files under the config directory
    #[arg(long)]
    pub log_to_file: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            listen_addr: self.listen_addr,
            log_to_file: self.log_to_file,
            ..AppConfig::default()
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;

        let output = format!(
            "Initialized sealnote directory at: {}\n\
             - Database: {}\n\
             - Config: {}\n\
             - Secrets: {} (signing secret and pepper)\n\
             - API listen address: {}",
            state.dir.display(),
            state.db_path.display(),
            state.config_path.display(),
            state.secrets_path.display(),
            state.config.listen_addr,
        );

        Ok(output)
    }
}
