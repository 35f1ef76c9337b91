//! Background pruning of token rows that have expired on their own.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::auth::{AuthEngine, AuthError};
use crate::store::PruneReport;

/// Shortest period the cleanup loop runs at.
const MIN_PERIOD: Duration = Duration::from_secs(1);

/// Prune once and log what went.
pub async fn run_once(auth: &AuthEngine) -> Result<PruneReport, AuthError> {
    let report = auth.prune().await?;
    if report.revoked_access_tokens > 0 || report.refresh_tokens > 0 {
        tracing::info!(
            revoked_access_tokens = report.revoked_access_tokens,
            refresh_tokens = report.refresh_tokens,
            "pruned expired token rows"
        );
    }
    Ok(report)
}

/// Prune every `period` until the shutdown channel fires.
///
/// Periods under one second are raised to one second.
pub fn spawn_cleanup(
    auth: AuthEngine,
    period: Duration,
    mut shutdown_rx: watch::Receiver<()>,
) -> JoinHandle<()> {
    let period = period.max(MIN_PERIOD);
    tokio::spawn(async move {
        let mut interval_timer = tokio::time::interval(period);
        interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // skip the immediate first tick
        interval_timer.tick().await;

        tracing::info!(period_secs = period.as_secs(), "token cleanup started");

        loop {
            tokio::select! {
                _ = interval_timer.tick() => {
                    if let Err(e) = run_once(&auth).await {
                        tracing::error!("token cleanup failed: {}", e);
                    }
                }
                _ = shutdown_rx.changed() => {
                    tracing::info!("token cleanup shutting down");
                    break;
                }
            }
        }
    })
}
