use tokio::time::{interval, Duration};

use crate::services::invoice::InvoiceService;

/// Periodically re-dispatch invoices stuck in draft past the age threshold
/// and create missing invoices for paid orders.
pub fn spawn_invoice_retrier(
    invoices: InvoiceService,
    interval_secs: u64,
    stuck_age_secs: i64,
) {
    tokio::spawn(async move {
        let mut timer = interval(Duration::from_secs(interval_secs));

        loop {
            timer.tick().await;

            match invoices.retry_stuck(stuck_age_secs).await {
                Ok(0) => {}
                Ok(retried) => log::info!("re-dispatched {} stuck invoices", retried),
                Err(err) => log::error!("stuck-invoice sweep failed: {}", err),
            }
        }
    });
}
