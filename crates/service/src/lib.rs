//! Server side of sealnote.
//!
//! This crate holds the parts of the system that make trust decisions:
//! - Token/session engine (registration, login, refresh, logout, revocation)
//! - Ephemeral share gate (expiry, view limits, access hashes, revocation)
//! - Persistence behind store traits (in-memory and SQLite)
//! - HTTP adapter and process lifecycle for the daemon

pub mod auth;
pub mod clock;
pub mod config;
pub mod context;
pub mod database;
pub mod http;
pub mod kdf_pool;
pub mod maintenance;
pub mod process;
pub mod share;
pub mod state;
pub mod store;

// Re-export key types for convenience
pub use auth::{AuthEngine, AuthError};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{Config as ServiceConfig, Pepper, RefreshPolicy, SigningSecret};
pub use context::TrustContext;
pub use database::{Database, DatabaseSetupError};
pub use share::{ShareError, ShareGate};
pub use state::{State as ServiceState, StateSetupError};
