use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use quay_booking::BookingLifecycle;

/// Periodic reconciliation sweep over overdue holds, defense against lost
/// scheduler callbacks. Runs until the returned handle is aborted.
pub fn spawn_hold_sweeper(lifecycle: Arc<BookingLifecycle>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(tenant_id = %lifecycle.tenant_id(), interval_secs = interval.as_secs(), "hold sweeper started");
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it so a fresh engine does not
        // sweep before anything can be overdue.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match lifecycle.sweep_expired_holds().await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "sweeper released overdue holds"),
                Err(e) => error!(error = %e, "hold sweep failed"),
            }
        }
    })
}
