use super::notification_service::NotificationService;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Periodically hard-delete expired notifications
pub fn spawn_expiry_sweeper(service: NotificationService, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            match service.purge_expired().await {
                Ok(0) => debug!("no expired notifications"),
                Ok(purged) => info!(purged, "expired notifications removed"),
                Err(e) => warn!(error = %e, "notification expiry sweep failed"),
            }
        }
    })
}
