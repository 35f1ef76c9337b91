use std::fmt;

use common::crypto::{AccessHash, Envelope, SecretShare};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A shared note as the server holds it: ciphertext plus the gate's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// the sealed payload; opaque to the server
    pub envelope: Envelope,
    /// content key wrapped for a named recipient. Anonymous links carry the
    ///  key outside the server (e.g. in the link fragment) and leave this unset
    pub key: Option<SecretShare>,
    /// no time limit if unset
    pub expires_at: Option<OffsetDateTime>,
    /// unlimited views if unset
    pub max_views: Option<i64>,
    pub current_views: i64,
    pub access_hash: Option<AccessHash>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
    pub last_accessed_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareState {
    Active,
    Expired,
    Revoked,
    Exhausted,
}

impl fmt::Display for ShareState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ShareState::Active => "active",
            ShareState::Expired => "expired",
            ShareState::Revoked => "revoked",
            ShareState::Exhausted => "exhausted",
        };
        write!(f, "{}", s)
    }
}

/// Why the gate refused a viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotFound,
    Revoked,
    Expired,
    Exhausted,
    /// password missing or wrong; the two are never told apart
    PasswordMismatch,
}

impl DenyReason {
    /// Terminal share states, reported as gone rather than forbidden.
    pub fn is_gone(&self) -> bool {
        matches!(
            self,
            DenyReason::Revoked | DenyReason::Expired | DenyReason::Exhausted
        )
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DenyReason::NotFound => "share not found",
            DenyReason::Revoked => "share has been revoked",
            DenyReason::Expired => "share has expired",
            DenyReason::Exhausted => "share has no views left",
            DenyReason::PasswordMismatch => "share password required",
        };
        write!(f, "{}", s)
    }
}

impl ShareRecord {
    /// Lifecycle state at `now`. Revocation wins over expiry, expiry over exhaustion.
    pub fn state(&self, now: OffsetDateTime) -> ShareState {
        if !self.is_active {
            ShareState::Revoked
        } else if self.is_expired(now) {
            ShareState::Expired
        } else if self.is_exhausted() {
            ShareState::Exhausted
        } else {
            ShareState::Active
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    pub fn is_exhausted(&self) -> bool {
        self.max_views
            .is_some_and(|max_views| self.current_views >= max_views)
    }

    pub fn views_remaining(&self) -> Option<i64> {
        self.max_views
            .map(|max_views| (max_views - self.current_views).max(0))
    }

    pub fn has_password(&self) -> bool {
        self.access_hash.is_some()
    }
}

/// Decide whether a viewer may see `share`.
///
/// Checks run in a fixed order: existence, revocation, expiry, view count,
/// then password. The first failure is the reported reason.
pub fn evaluate<'a>(
    share: Option<&'a ShareRecord>,
    provided: Option<&AccessHash>,
    now: OffsetDateTime,
) -> Result<&'a ShareRecord, DenyReason> {
    let share = share.ok_or(DenyReason::NotFound)?;
    if !share.is_active {
        return Err(DenyReason::Revoked);
    }
    if share.is_expired(now) {
        return Err(DenyReason::Expired);
    }
    if share.is_exhausted() {
        return Err(DenyReason::Exhausted);
    }
    if let Some(required) = &share.access_hash {
        match provided {
            Some(provided) if required.matches(provided) => {}
            _ => return Err(DenyReason::PasswordMismatch),
        }
    }
    Ok(share)
}
