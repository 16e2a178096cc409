pub mod bookings;
pub mod health;
pub mod orders;
pub mod reservations;
pub mod webhooks;
