use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::{fs, io};

use common::crypto::KdfParams;
use serde::{Deserialize, Serialize};
use service::config::ConfigError;
use service::{Pepper, RefreshPolicy, ServiceConfig, SigningSecret};

pub const APP_NAME: &str = "sealnote";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const SECRETS_FILE_NAME: &str = "secrets.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";
pub const LOGS_DIR_NAME: &str = "logs";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listen address for the API server
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Write daily rolling log files under the logs directory
    #[serde(default)]
    pub log_to_file: bool,

    #[serde(default = "default_access_token_ttl_secs")]
    pub access_token_ttl_secs: i64,
    #[serde(default = "default_refresh_token_ttl_secs")]
    pub refresh_token_ttl_secs: i64,
    #[serde(default)]
    pub refresh_policy: RefreshPolicy,
    #[serde(default = "default_revocation_cache_ttl_secs")]
    pub revocation_cache_ttl_secs: u64,
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(default = "default_kdf_concurrency")]
    pub kdf_concurrency: usize,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 3000))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_access_token_ttl_secs() -> i64 {
    15 * 60
}

fn default_refresh_token_ttl_secs() -> i64 {
    7 * 24 * 60 * 60
}

fn default_revocation_cache_ttl_secs() -> u64 {
    5
}

fn default_cleanup_interval_secs() -> u64 {
    60 * 60
}

fn default_kdf_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            log_level: default_log_level(),
            log_to_file: false,
            access_token_ttl_secs: default_access_token_ttl_secs(),
            refresh_token_ttl_secs: default_refresh_token_ttl_secs(),
            refresh_policy: RefreshPolicy::default(),
            revocation_cache_ttl_secs: default_revocation_cache_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            kdf: KdfParams::default(),
            kdf_concurrency: default_kdf_concurrency(),
        }
    }
}

/// Hex-encoded secret material, kept apart from the config.
#[derive(Clone, Serialize, Deserialize)]
struct SecretsFile {
    signing_secret: String,
    #[serde(default)]
    pepper: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the sealnote directory (~/.sealnote)
    pub dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Path to the secrets file
    pub secrets_path: PathBuf,
    /// Path to the log directory
    pub logs_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the sealnote directory path (custom or default ~/.sealnote)
    pub fn dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    fn paths(dir: PathBuf, config: AppConfig) -> Self {
        Self {
            db_path: dir.join(DB_FILE_NAME),
            config_path: dir.join(CONFIG_FILE_NAME),
            secrets_path: dir.join(SECRETS_FILE_NAME),
            logs_path: dir.join(LOGS_DIR_NAME),
            dir,
            config,
        }
    }

    /// Initialize a new sealnote directory with fresh secrets
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let dir = Self::dir(custom_path)?;
        if dir.join(CONFIG_FILE_NAME).exists() {
            return Err(StateError::AlreadyInitialized);
        }
        fs::create_dir_all(&dir)?;

        let state = Self::paths(dir, config.unwrap_or_default());
        fs::create_dir_all(&state.logs_path)?;

        let config_toml = toml::to_string_pretty(&state.config)?;
        fs::write(&state.config_path, config_toml)?;

        let signing_secret = SigningSecret::generate()?;
        let pepper = Pepper::generate()?;
        let secrets = SecretsFile {
            signing_secret: signing_secret.to_hex().to_string(),
            pepper: Some(pepper.to_hex().to_string()),
        };
        write_private(&state.secrets_path, toml::to_string_pretty(&secrets)?.as_bytes())?;

        Ok(state)
    }

    /// Load existing state from the sealnote directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let dir = Self::dir(custom_path)?;
        if !dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }
        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self::paths(dir, config))
    }

    /// Read the signing secret and pepper. Explicit values win over the file.
    pub fn load_secrets(
        &self,
        signing_secret: Option<&str>,
        pepper: Option<&str>,
    ) -> Result<(SigningSecret, Option<Pepper>), StateError> {
        let file = if self.secrets_path.exists() {
            let raw = zeroize::Zeroizing::new(fs::read_to_string(&self.secrets_path)?);
            Some(toml::from_str::<SecretsFile>(&raw)?)
        } else {
            None
        };

        let signing_secret = match (signing_secret, &file) {
            (Some(hex), _) => SigningSecret::from_hex(hex)?,
            (None, Some(file)) => SigningSecret::from_hex(&file.signing_secret)?,
            (None, None) => return Err(StateError::MissingFile(SECRETS_FILE_NAME.to_string())),
        };
        let pepper = match (pepper, file.as_ref().and_then(|f| f.pepper.as_deref())) {
            (Some(hex), _) | (None, Some(hex)) => Some(Pepper::from_hex(hex)?),
            (None, None) => None,
        };

        Ok((signing_secret, pepper))
    }

    /// Assemble the service configuration from the config file and secrets.
    pub fn service_config(
        &self,
        signing_secret: SigningSecret,
        pepper: Option<Pepper>,
    ) -> Result<ServiceConfig, StateError> {
        let log_level = self
            .config
            .log_level
            .parse::<tracing::Level>()
            .map_err(|_| StateError::InvalidConfig(format!("log level {}", self.config.log_level)))?;

        let config = ServiceConfig {
            listen_addr: Some(self.config.listen_addr),
            sqlite_path: Some(self.db_path.clone()),
            signing_secret: Some(signing_secret),
            pepper,
            access_token_ttl: time::Duration::seconds(self.config.access_token_ttl_secs),
            refresh_token_ttl: time::Duration::seconds(self.config.refresh_token_ttl_secs),
            refresh_policy: self.config.refresh_policy,
            revocation_cache_ttl: std::time::Duration::from_secs(
                self.config.revocation_cache_ttl_secs,
            ),
            cleanup_interval: std::time::Duration::from_secs(self.config.cleanup_interval_secs),
            kdf_params: self.config.kdf,
            kdf_concurrency: self.config.kdf_concurrency,
            log_level,
            log_dir: self.config.log_to_file.then(|| self.logs_path.clone()),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Write a file only the owner can read, replacing any existing one.
pub fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents)
    }
    #[cfg(not(unix))]
    {
        fs::write(path, contents)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("sealnote directory not initialized. Run 'sealnote init' first")]
    NotInitialized,

    #[error("sealnote directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home");

        let created = AppState::init(Some(path.clone()), None).unwrap();
        assert!(created.config_path.exists());
        assert!(created.secrets_path.exists());
        assert!(created.logs_path.is_dir());
        assert!(matches!(
            AppState::init(Some(path.clone()), None),
            Err(StateError::AlreadyInitialized)
        ));

        let loaded = AppState::load(Some(path)).unwrap();
        assert_eq!(loaded.config, AppConfig::default());

        let (secret, pepper) = loaded.load_secrets(None, None).unwrap();
        assert_eq!(secret.bytes().len(), 32);
        assert!(pepper.is_some());

        let config = loaded.service_config(secret, pepper).unwrap();
        assert_eq!(config.sqlite_path, Some(loaded.db_path.clone()));
        assert_eq!(config.access_token_ttl, time::Duration::minutes(15));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_explicit_secret_wins() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(Some(dir.path().to_path_buf()), None).unwrap();

        let explicit = "ab".repeat(32);
        let (secret, _) = state.load_secrets(Some(&explicit), None).unwrap();
        assert_eq!(secret.bytes(), vec![0xab; 32].as_slice());

        assert!(matches!(
            state.load_secrets(Some("abcd"), None),
            Err(StateError::Config(ConfigError::SigningSecretTooShort(2)))
        ));
    }

    #[test]
    fn test_load_requires_init() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            AppState::load(Some(dir.path().join("missing"))),
            Err(StateError::NotInitialized)
        ));
    }

    #[test]
    #[cfg(unix)]
    fn test_secrets_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(Some(dir.path().to_path_buf()), None).unwrap();
        let mode = fs::metadata(&state.secrets_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
