//! Process lifecycle: logging, the API server, background cleanup and
//! graceful shutdown.

mod utils;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::{http, maintenance, ServiceConfig, ServiceState};

const FINAL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_LISTEN_PORT: u16 = 3000;
const LOG_FILE_PREFIX: &str = "sealnote.log";

#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("failed to install the log subscriber: {0}")]
    Logging(String),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[from] std::io::Error),
    #[error("failed to set up service state: {0}")]
    State(#[from] crate::StateSetupError),
    #[error("failed to shut down within {0} seconds")]
    ShutdownTimeout(u64),
}

fn env_filter(level: tracing::Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy()
}

/// Install the global subscriber: compact stdout, plus a daily rolling file
/// when `log_dir` is set. The returned guards flush the writers on drop.
pub fn init_logging(config: &ServiceConfig) -> Result<Vec<WorkerGuard>, ProcessError> {
    let mut guards = Vec::new();

    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);
    let stdout_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stdout_writer)
        .with_filter(env_filter(config.log_level));

    let file_layer = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
            guards.push(file_guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(file_writer)
                    .with_filter(env_filter(config.log_level)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ProcessError::Logging(e.to_string()))?;

    Ok(guards)
}

/// Run the service until SIGINT or SIGTERM.
pub async fn spawn_service(service_config: &ServiceConfig) -> Result<(), ProcessError> {
    let _guards = init_logging(service_config)?;

    utils::register_panic_logger();
    utils::report_build_info();

    let (graceful_waiter, _shutdown_tx, shutdown_rx) = utils::graceful_shutdown_blocker()?;

    let state = match ServiceState::from_config(service_config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!("error creating server state: {}", e);
            return Err(e.into());
        }
    };

    let mut handles = Vec::new();

    let api_listen_addr = service_config.listen_addr.unwrap_or(SocketAddr::new(
        IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        DEFAULT_LISTEN_PORT,
    ));

    // Start API server
    let api_state = state.clone();
    let api_config = http::Config::new(api_listen_addr, service_config.log_level);
    let api_rx = shutdown_rx.clone();
    let api_handle = tokio::spawn(async move {
        tracing::info!("Starting API server on {}", api_listen_addr);
        if let Err(e) = http::run_api(api_config, api_state, api_rx).await {
            tracing::error!("API server error: {}", e);
        }
    });
    handles.push(api_handle);

    // Prune expired token rows in the background
    let cleanup_handle = maintenance::spawn_cleanup(
        state.auth().clone(),
        service_config.cleanup_interval,
        shutdown_rx.clone(),
    );
    handles.push(cleanup_handle);

    let _ = graceful_waiter.await;

    if timeout(FINAL_SHUTDOWN_TIMEOUT, join_all(handles))
        .await
        .is_err()
    {
        tracing::error!(
            "Failed to shut down within {} seconds",
            FINAL_SHUTDOWN_TIMEOUT.as_secs()
        );
        return Err(ProcessError::ShutdownTimeout(FINAL_SHUTDOWN_TIMEOUT.as_secs()));
    }

    tracing::info!("service stopped");
    Ok(())
}
