use tokio::sync::mpsc::UnboundedReceiver;

use crate::queue::{TransmitJob, TransmitQueue};
use crate::services::invoice::InvoiceService;

/// Consume transmission jobs. Each job waits out its backoff delay on its
/// own task so a long retry never blocks fresh first attempts.
pub fn spawn_transmitter(
    mut rx: UnboundedReceiver<TransmitJob>,
    queue: TransmitQueue,
    invoices: InvoiceService,
) {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            let queue = queue.clone();
            let invoices = invoices.clone();

            tokio::spawn(async move {
                let delay = queue.delay_for(job.attempt);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }

                match invoices.transmit(job.invoice_id).await {
                    Ok(()) => {
                        log::info!(
                            "invoice {} transmitted (attempt {})",
                            job.invoice_id,
                            job.attempt
                        );
                    }
                    Err(err) => {
                        log::error!(
                            "invoice {} transmission failed (attempt {}): {}",
                            job.invoice_id,
                            job.attempt,
                            err
                        );
                        if !queue.retry(job) {
                            log::warn!(
                                "invoice {} abandoned after {} attempts, left for the sweep",
                                job.invoice_id,
                                job.attempt
                            );
                        }
                    }
                }
            });
        }
    });
}
