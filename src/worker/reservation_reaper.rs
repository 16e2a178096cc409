use tokio::time::{interval, Duration};

use crate::services::inventory::InventoryService;

/// Periodically release reservation groups whose holds have expired. Safe to
/// run alongside request traffic: release is a no-op on groups that were
/// confirmed or released in the meantime.
pub fn spawn_reservation_reaper(inventory: InventoryService, interval_secs: u64) {
    tokio::spawn(async move {
        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            match inventory.release_expired().await {
                Ok(0) => {}
                Ok(released) => log::info!("released {} expired reservation groups", released),
                Err(err) => log::error!("failed to release expired reservations: {}", err),
            }
        }
    });
}
