pub mod invoice_retry;
pub mod reservation_reaper;
pub mod transmitter;
