//! Recurring expiry sweeper.
//!
//! Retires past-dated active slots to `completed` on a configurable interval.
//! The same pass is available on demand through the maintenance endpoint, so
//! this task is only about keeping the store current without manual
//! intervention.

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::SweeperConfig;
use crate::db::handlers::Slots;

pub async fn run_expiry_sweeper(config: SweeperConfig, pool: PgPool, shutdown: CancellationToken) {
    tracing::info!(
        interval = ?config.interval,
        batch_size = config.batch_size,
        "Starting expiry sweeper"
    );

    loop {
        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Expiry sweeper shutting down");
                return;
            }
        }

        let mut conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to acquire connection for expiry sweep");
                continue;
            }
        };

        let mut slots = Slots::new(&mut conn);
        match slots.sweep_expired(config.batch_size).await {
            Ok(0) => {
                tracing::debug!("Expiry sweep found nothing to retire");
            }
            Ok(count) => {
                tracing::info!(count, "Expiry sweep retired past-dated slots");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Expiry sweep failed");
            }
        }
    }
}
