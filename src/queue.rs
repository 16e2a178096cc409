use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

/// One transmission attempt for an invoice. `attempt` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitJob {
    pub invoice_id: Uuid,
    pub attempt: u32,
}

/// In-process task queue for invoice transmission. Producers enqueue; the
/// transmitter worker consumes, delaying each retry per the backoff table.
/// Once attempts are exhausted the job is abandoned and left for the
/// stuck-invoice sweep.
#[derive(Clone)]
pub struct TransmitQueue {
    tx: mpsc::UnboundedSender<TransmitJob>,
    max_attempts: u32,
    backoff_secs: Arc<Vec<u64>>,
}

impl TransmitQueue {
    pub fn new(
        max_attempts: u32,
        backoff_secs: Vec<u64>,
    ) -> (Self, mpsc::UnboundedReceiver<TransmitJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                tx,
                max_attempts,
                backoff_secs: Arc::new(backoff_secs),
            },
            rx,
        )
    }

    /// First attempt for an invoice, dispatched without delay.
    pub fn enqueue(&self, invoice_id: Uuid) {
        self.push(TransmitJob {
            invoice_id,
            attempt: 1,
        });
    }

    /// Re-enqueue after a failed attempt. Returns false when the attempt
    /// budget is spent and the job is dropped.
    pub fn retry(&self, job: TransmitJob) -> bool {
        if job.attempt >= self.max_attempts {
            return false;
        }
        self.push(TransmitJob {
            invoice_id: job.invoice_id,
            attempt: job.attempt + 1,
        });
        true
    }

    /// Delay to apply before running `attempt`: the first attempt is
    /// immediate, retries walk the backoff table (last entry repeats).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let index = ((attempt - 2) as usize).min(self.backoff_secs.len().saturating_sub(1));
        Duration::from_secs(self.backoff_secs.get(index).copied().unwrap_or(0))
    }

    fn push(&self, job: TransmitJob) {
        if self.tx.send(job).is_err() {
            log::error!(
                "transmission queue closed, dropping invoice {}",
                job.invoice_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_schedule_follows_table() {
        let (queue, _rx) = TransmitQueue::new(3, vec![60, 300, 600]);

        assert_eq!(queue.delay_for(1), Duration::ZERO);
        assert_eq!(queue.delay_for(2), Duration::from_secs(60));
        assert_eq!(queue.delay_for(3), Duration::from_secs(300));
        assert_eq!(queue.delay_for(4), Duration::from_secs(600));
        assert_eq!(queue.delay_for(9), Duration::from_secs(600));
    }

    #[test]
    fn empty_backoff_table_means_no_delay() {
        let (queue, _rx) = TransmitQueue::new(3, vec![]);

        assert_eq!(queue.delay_for(2), Duration::ZERO);
    }

    #[tokio::test]
    async fn enqueue_and_retry_until_exhausted() {
        let (queue, mut rx) = TransmitQueue::new(3, vec![1, 2]);
        let invoice_id = Uuid::new_v4();

        queue.enqueue(invoice_id);
        let first = rx.recv().await.unwrap();
        assert_eq!(first, TransmitJob { invoice_id, attempt: 1 });

        assert!(queue.retry(first));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.attempt, 2);

        assert!(queue.retry(second));
        let third = rx.recv().await.unwrap();
        assert_eq!(third.attempt, 3);

        // Attempt budget spent: job is dropped, nothing else is queued.
        assert!(!queue.retry(third));
        assert!(rx.try_recv().is_err());
    }
}
