//! Periodic housekeeping task.
//!
//! Drives [`FirewallEngine::run_housekeeping`] on a fixed interval and
//! exits promptly when the shutdown token fires.

use super::firewall::FirewallEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default sweep interval.
pub const HOUSEKEEPING_PERIOD: Duration = Duration::from_secs(30);

/// Spawn the housekeeping loop.
pub fn spawn_housekeeping_task(
    engine: Arc<FirewallEngine>,
    shutdown: CancellationToken,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => engine.run_housekeeping().await,
            }
        }
        debug!("housekeeping task stopped");
    })
}
