use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::model::today;

/// Background task that transitions confirmed bookings to completed once
/// their check-out date has passed. Runs hourly; the day granularity of the
/// ledger makes anything faster pointless.
pub async fn run_departure_sweeper(engine: Arc<Engine>) {
    let mut interval = tokio::time::interval(Duration::from_secs(3600));
    loop {
        interval.tick().await;
        let cutoff = today();
        for booking_id in engine.collect_departed(cutoff) {
            match engine.complete_booking(booking_id).await {
                Ok(()) => info!("completed departed booking {booking_id}"),
                Err(e) => {
                    // Raced with a cancel or another sweep — fine either way
                    tracing::debug!("sweep skip {booking_id}: {e}");
                }
            }
        }
    }
}

/// Background task that compacts the WAL once enough appends accumulate.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(60));
    loop {
        interval.tick().await;
        if engine.wal_appends_since_compact().await >= threshold {
            match engine.compact_wal().await {
                Ok(()) => info!("WAL compacted"),
                Err(e) => tracing::error!("WAL compaction failed: {e}"),
            }
        }
    }
}
