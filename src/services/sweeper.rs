//! Session expiry sweeper.
//!
//! Reclaims holds from checkout sessions that stopped heartbeating (closed
//! tab, crash, navigation away). The sweeper itself carries no state beyond
//! its interval: each tick asks the reservation engine to release whatever
//! is past TTL plus grace, exactly as an explicit `release` would.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::services::reservations::ReservationService;

/// Spawns the background sweep loop. Errors are logged and the loop keeps
/// going; finding zero expired holds is the common case.
pub fn start_sweeper(
    reservations: Arc<ReservationService>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    info!(interval_secs = interval.as_secs(), "Starting reservation expiry sweeper");

    tokio::spawn(async move {
        loop {
            sleep(interval).await;

            match reservations.sweep_expired(Utc::now()).await {
                Ok(0) => {
                    debug!("Sweep found no expired holds");
                }
                Ok(reclaimed) => {
                    info!(reclaimed, "Sweep reclaimed expired holds");
                }
                Err(e) => {
                    error!("Sweep failed: {}", e);
                }
            }
        }
    })
}
