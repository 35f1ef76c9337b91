//! The explicit trust context every engine is built from.
//!
//! Secrets and policy live here and nowhere else. Two contexts in one
//! process never share state, so tests can run side by side and a signing
//! secret can be swapped by building a new context.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use common::crypto::KdfParams;
use time::Duration;

use crate::clock::{SharedClock, SystemClock};
use crate::config::{Config, ConfigError, Pepper, RefreshPolicy, SigningSecret};

#[derive(Debug, Clone)]
pub struct TrustContext {
    signing_secret: SigningSecret,
    pepper: Option<Pepper>,
    kdf_params: KdfParams,
    access_token_ttl: Duration,
    refresh_token_ttl: Duration,
    refresh_policy: RefreshPolicy,
    revocation_cache_ttl: StdDuration,
    clock: SharedClock,
}

impl TrustContext {
    /// A context with default lifetimes and parameters around `signing_secret`.
    pub fn new(signing_secret: SigningSecret, clock: SharedClock) -> Self {
        let defaults = Config::default();
        Self {
            signing_secret,
            pepper: None,
            kdf_params: defaults.kdf_params,
            access_token_ttl: defaults.access_token_ttl,
            refresh_token_ttl: defaults.refresh_token_ttl,
            refresh_policy: defaults.refresh_policy,
            revocation_cache_ttl: defaults.revocation_cache_ttl,
            clock,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::from_config_with_clock(config, Arc::new(SystemClock))
    }

    pub fn from_config_with_clock(
        config: &Config,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let signing_secret = config
            .signing_secret
            .clone()
            .ok_or(ConfigError::MissingSigningSecret)?;

        Ok(Self {
            signing_secret,
            pepper: config.pepper.clone(),
            kdf_params: config.kdf_params,
            access_token_ttl: config.access_token_ttl,
            refresh_token_ttl: config.refresh_token_ttl,
            refresh_policy: config.refresh_policy,
            revocation_cache_ttl: config.revocation_cache_ttl,
            clock,
        })
    }

    pub fn with_pepper(mut self, pepper: Pepper) -> Self {
        self.pepper = Some(pepper);
        self
    }

    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.kdf_params = params;
        self
    }

    pub fn with_access_token_ttl(mut self, ttl: Duration) -> Self {
        self.access_token_ttl = ttl;
        self
    }

    pub fn with_refresh_token_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_token_ttl = ttl;
        self
    }

    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    pub fn with_revocation_cache_ttl(mut self, ttl: StdDuration) -> Self {
        self.revocation_cache_ttl = ttl;
        self
    }

    pub fn signing_secret(&self) -> &SigningSecret {
        &self.signing_secret
    }

    pub fn pepper(&self) -> Option<&[u8]> {
        self.pepper.as_ref().map(Pepper::bytes)
    }

    pub fn kdf_params(&self) -> &KdfParams {
        &self.kdf_params
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.access_token_ttl
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        self.refresh_token_ttl
    }

    pub fn refresh_policy(&self) -> RefreshPolicy {
        self.refresh_policy
    }

    pub fn revocation_cache_ttl(&self) -> StdDuration {
        self.revocation_cache_ttl
    }

    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clock::{Clock, ManualClock};

    #[test]
    fn test_from_config_copies_policy() {
        let config = Config {
            signing_secret: Some(SigningSecret::new(vec![1u8; 32]).unwrap()),
            pepper: Some(Pepper::new(b"pep".to_vec())),
            refresh_policy: RefreshPolicy::ReuseUntilRevoked,
            access_token_ttl: Duration::minutes(5),
            ..Default::default()
        };
        let clock = ManualClock::at_unix(42);
        let ctx = TrustContext::from_config_with_clock(&config, Arc::new(clock)).unwrap();

        assert_eq!(ctx.pepper(), Some(&b"pep"[..]));
        assert_eq!(ctx.refresh_policy(), RefreshPolicy::ReuseUntilRevoked);
        assert_eq!(ctx.access_token_ttl(), Duration::minutes(5));
        assert_eq!(ctx.clock().unix(), 42);
    }

    #[test]
    fn test_from_config_rejects_missing_secret() {
        assert!(TrustContext::from_config(&Config::default()).is_err());
    }
}
