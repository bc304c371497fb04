use std::{sync::Arc, time::Duration};

use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info};

use crate::state::RoomRegistry;

/// Periodically drop registry entries whose room actor already stopped.
///
/// Rooms evict themselves when their actor exits; this loop only catches
/// handles left behind, so it never touches a running room.
pub async fn run(registry: Arc<RoomRegistry>, every: Duration) {
    let mut ticker = interval(every.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let removed = registry.sweep();
        if removed > 0 {
            info!(removed, live = registry.len(), "reaped stopped rooms");
        } else {
            debug!(live = registry.len(), "room sweep found nothing to reap");
        }
    }
}
