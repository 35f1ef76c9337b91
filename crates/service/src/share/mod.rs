//! Ephemeral share gate.
//!
//! A share starts active and ends in exactly one of three terminal states:
//! expired, exhausted or revoked. [`ShareGate::access`] evaluates the state
//! and takes a view as one logical step; [`ShareGate::revoke`] is the only
//! transition an owner can trigger.

mod gate;
mod record;

pub use gate::{NewShare, ShareGate, SharedContent};
pub use record::{evaluate, DenyReason, ShareRecord, ShareState};

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("{0}")]
    Denied(DenyReason),
    #[error("only the owner can do that")]
    NotOwner,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("share is busy, try again")]
    Contention,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
