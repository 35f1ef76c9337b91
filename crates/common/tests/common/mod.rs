//! Shared fixtures for sharing integration tests
#![allow(dead_code)]

use std::sync::OnceLock;

use ::common::crypto::{key_wrap::DEFAULT_KEY_BITS, Secret, WrapPrivateKey};
use ::common::note::MasterKey;

/// One RSA key per test binary; generation dominates runtime otherwise.
pub fn rsa_recipient() -> &'static WrapPrivateKey {
    static KEY: OnceLock<WrapPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| WrapPrivateKey::generate(DEFAULT_KEY_BITS).unwrap())
}

pub fn random_master() -> MasterKey {
    MasterKey::from(Secret::generate().unwrap())
}
