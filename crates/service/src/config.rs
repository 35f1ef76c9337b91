use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration as StdDuration;

use common::crypto::{random, CryptoError, KdfParams};
use serde::{Deserialize, Serialize};
use time::Duration;
use zeroize::Zeroizing;

/// Minimum length of the token signing secret, in bytes.
pub const MIN_SIGNING_SECRET_LEN: usize = 32;

/// What happens to a refresh token once it has been exchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshPolicy {
    /// Every exchange invalidates the presented token and issues a new one.
    #[default]
    Rotate,
    /// The presented token stays usable until it expires or is revoked.
    ReuseUntilRevoked,
}

impl fmt::Display for RefreshPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshPolicy::Rotate => write!(f, "rotate"),
            RefreshPolicy::ReuseUntilRevoked => write!(f, "reuse-until-revoked"),
        }
    }
}

/// HMAC key for access tokens. At least [`MIN_SIGNING_SECRET_LEN`] bytes.
#[derive(Clone)]
pub struct SigningSecret(Zeroizing<Vec<u8>>);

impl fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningSecret(<{} bytes>)", self.0.len())
    }
}

impl SigningSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, ConfigError> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.len() < MIN_SIGNING_SECRET_LEN {
            return Err(ConfigError::SigningSecretTooShort(bytes.len()));
        }
        Ok(Self(bytes))
    }

    pub fn generate() -> Result<Self, ConfigError> {
        let bytes: [u8; MIN_SIGNING_SECRET_LEN] = random::array()?;
        Self::new(bytes.to_vec())
    }

    pub fn from_hex(encoded: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| ConfigError::InvalidHex("signing secret"))?;
        Self::new(bytes)
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_slice()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Server-held secret mixed into every credential hash.
#[derive(Clone)]
pub struct Pepper(Zeroizing<Vec<u8>>);

impl fmt::Debug for Pepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pepper(<redacted>)")
    }
}

impl Pepper {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn generate() -> Result<Self, ConfigError> {
        let bytes: [u8; 32] = random::array()?;
        Ok(Self::new(bytes.to_vec()))
    }

    pub fn from_hex(encoded: &str) -> Result<Self, ConfigError> {
        let bytes = hex::decode(encoded.trim()).map_err(|_| ConfigError::InvalidHex("pepper"))?;
        Ok(Self::new(bytes))
    }

    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.0.as_slice()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // http server configuration
    /// address for the API server to listen on.
    ///  if not set then 0.0.0.0:3000 will be used
    pub listen_addr: Option<SocketAddr>,

    // data store configuration
    /// a path to a sqlite database, if not set then an
    ///  in-memory database will be used
    pub sqlite_path: Option<PathBuf>,

    // secrets
    /// token signing secret, required at startup
    pub signing_secret: Option<SigningSecret>,
    pub pepper: Option<Pepper>,

    // token lifecycle
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub refresh_policy: RefreshPolicy,
    /// how long a revocation lookup may be served from memory
    pub revocation_cache_ttl: StdDuration,
    /// how often expired blacklist and refresh rows are pruned
    pub cleanup_interval: StdDuration,

    // credential hashing
    pub kdf_params: KdfParams,
    /// upper bound on concurrent password hashes
    pub kdf_concurrency: usize,

    // misc
    pub log_level: tracing::Level,
    /// directory for daily rolling log files, stdout only if unset
    pub log_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 3000)),
            sqlite_path: None,
            signing_secret: None,
            pepper: None,
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            refresh_policy: RefreshPolicy::Rotate,
            revocation_cache_ttl: StdDuration::from_secs(5),
            cleanup_interval: StdDuration::from_secs(60 * 60),
            kdf_params: KdfParams::default(),
            kdf_concurrency: 4,
            log_level: tracing::Level::INFO,
            log_dir: None,
        }
    }
}

impl Config {
    /// Reject configurations the service must not start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.signing_secret {
            None => return Err(ConfigError::MissingSigningSecret),
            Some(secret) if secret.bytes().len() < MIN_SIGNING_SECRET_LEN => {
                return Err(ConfigError::SigningSecretTooShort(secret.bytes().len()))
            }
            Some(_) => {}
        }
        self.kdf_params.validate()?;
        if self.kdf_concurrency == 0 {
            return Err(ConfigError::Invalid("kdf_concurrency must be at least 1"));
        }
        if self.access_token_ttl <= Duration::ZERO || self.refresh_token_ttl <= Duration::ZERO {
            return Err(ConfigError::Invalid("token lifetimes must be positive"));
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::Invalid("cleanup_interval must be positive"));
        }
        if self.refresh_token_ttl < self.access_token_ttl {
            return Err(ConfigError::Invalid(
                "refresh token lifetime must not be shorter than the access token lifetime",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("a token signing secret is required")]
    MissingSigningSecret,
    #[error("token signing secret must be at least {MIN_SIGNING_SECRET_LEN} bytes, got {0}")]
    SigningSecretTooShort(usize),
    #[error("{0} is not valid hex")]
    InvalidHex(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

#[cfg(test)]
mod test {
    use super::*;

    fn valid_config() -> Config {
        Config {
            signing_secret: Some(SigningSecret::generate().unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config_requires_signing_secret() {
        assert!(matches!(
            Config::default().validate(),
            Err(ConfigError::MissingSigningSecret)
        ));
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_short_signing_secret_rejected() {
        assert!(matches!(
            SigningSecret::new(vec![7u8; 31]),
            Err(ConfigError::SigningSecretTooShort(31))
        ));
        assert!(SigningSecret::new(vec![7u8; 32]).is_ok());
        assert!(matches!(
            SigningSecret::from_hex(&"ab".repeat(16)),
            Err(ConfigError::SigningSecretTooShort(16))
        ));
    }

    #[test]
    fn test_signing_secret_hex_round_trip() {
        let secret = SigningSecret::generate().unwrap();
        let back = SigningSecret::from_hex(&secret.to_hex()).unwrap();
        assert_eq!(secret.bytes(), back.bytes());
        assert!(SigningSecret::from_hex("not hex").is_err());
    }

    #[test]
    fn test_secrets_are_redacted() {
        let secret = SigningSecret::new(vec![0x41; 32]).unwrap();
        let pepper = Pepper::new(b"pepper".to_vec());
        assert!(!format!("{:?}", secret).contains("41"));
        assert!(!format!("{:?}", pepper).contains("pepper"));
    }

    #[test]
    fn test_weak_kdf_params_rejected() {
        let mut config = valid_config();
        config.kdf_params.memory_kib = 1024;
        assert!(matches!(config.validate(), Err(ConfigError::Crypto(_))));
    }

    #[test]
    fn test_lifetimes_validated() {
        let mut config = valid_config();
        config.refresh_token_ttl = Duration::minutes(1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = valid_config();
        config.kdf_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cleanup_interval_rejected() {
        let mut config = valid_config();
        config.cleanup_interval = StdDuration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.cleanup_interval = StdDuration::from_secs(1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_refresh_policy_names() {
        assert_eq!(RefreshPolicy::default(), RefreshPolicy::Rotate);
        assert_eq!(
            serde_json::to_string(&RefreshPolicy::ReuseUntilRevoked).unwrap(),
            "\"reuse-until-revoked\""
        );
        assert_eq!(RefreshPolicy::Rotate.to_string(), "rotate");
    }
}
