use actix_web::web;

use crate::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(handlers::health::health)
            .service(handlers::reservations::create_reservation)
            .service(handlers::reservations::release_reservation)
            .service(handlers::orders::create_order)
            .service(handlers::bookings::create_booking)
            .service(handlers::webhooks::stripe_webhook),
    );
}
