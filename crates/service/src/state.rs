use std::sync::Arc;

use axum::extract::FromRef;
use url::Url;

use super::auth::{AuthEngine, AuthError};
use super::config::{Config, ConfigError};
use super::context::TrustContext;
use super::database::{Database, DatabaseSetupError};
use super::kdf_pool::KdfPool;
use super::share::ShareGate;

/// Main service state - the database and the engines built on it
#[derive(Clone, Debug)]
pub struct State {
    database: Database,
    auth: AuthEngine,
    shares: ShareGate,
}

impl State {
    pub async fn from_config(config: &Config) -> Result<Self, StateSetupError> {
        config.validate()?;

        // 1. Setup database
        let sqlite_database_url = match config.sqlite_path {
            Some(ref path) => {
                // the file is created on first connect, its directory is not
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        return Err(StateSetupError::DatabasePathDoesNotExist);
                    }
                }
                Url::parse(&format!("sqlite://{}", path.display()))
                    .map_err(|_| StateSetupError::InvalidDatabaseUrl)
            }
            // otherwise just set up an in-memory database
            None => Url::parse("sqlite::memory:").map_err(|_| StateSetupError::InvalidDatabaseUrl),
        }?;
        tracing::info!("Database URL: {}", sqlite_database_url);
        let database = Database::connect(&sqlite_database_url).await?;

        // 2. Setup trust context
        let ctx = TrustContext::from_config(config)?;
        tracing::info!(
            access_token_ttl = ctx.access_token_ttl().whole_seconds(),
            refresh_token_ttl = ctx.refresh_token_ttl().whole_seconds(),
            refresh_policy = %ctx.refresh_policy(),
            "trust context ready"
        );

        Self::new(database, ctx, config.kdf_concurrency)
    }

    /// Wire engines over an already connected database.
    pub fn new(
        database: Database,
        ctx: TrustContext,
        kdf_concurrency: usize,
    ) -> Result<Self, StateSetupError> {
        let clock = ctx.clock().clone();
        let store = Arc::new(database.clone());
        let auth = AuthEngine::new(
            Arc::new(ctx),
            store.clone(),
            store.clone(),
            KdfPool::new(kdf_concurrency),
        )?;
        let shares = ShareGate::new(store, clock);

        Ok(Self {
            database,
            auth,
            shares,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn auth(&self) -> &AuthEngine {
        &self.auth
    }

    pub fn shares(&self) -> &ShareGate {
        &self.shares
    }
}

impl AsRef<Database> for State {
    fn as_ref(&self) -> &Database {
        self.database()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateSetupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Database directory does not exist")]
    DatabasePathDoesNotExist,
    #[error("Database setup error: {0}")]
    DatabaseSetupError(#[from] DatabaseSetupError),
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,
    #[error("Auth engine setup error: {0}")]
    Auth(#[from] AuthError),
}

impl FromRef<State> for Database {
    fn from_ref(state: &State) -> Self {
        state.database.clone()
    }
}
