use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::error::ServiceError;
use crate::models::CreateBookingRequest;
use crate::services::capacity::CapacityService;

#[post("/bookings")]
pub async fn create_booking(
    capacity: web::Data<CapacityService>,
    req: web::Json<CreateBookingRequest>,
) -> HttpResponse {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return HttpResponse::BadRequest().json(json!({ "error": "a valid email is required" }));
    }

    match capacity
        .reserve_seats(req.session_id, email, req.quantity)
        .await
    {
        Ok(booking) => HttpResponse::Created().json(json!({ "data": booking })),
        Err(err @ ServiceError::Validation(_)) => {
            HttpResponse::BadRequest().json(json!({ "error": err.to_string() }))
        }
        Err(err @ ServiceError::InsufficientCapacity) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": err.to_string() }))
        }
        Err(err @ ServiceError::NotFound(_)) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": err.to_string() }))
        }
        Err(err) => {
            log::error!("failed to create booking: {}", err);
            HttpResponse::InternalServerError().json(json!({ "error": "internal error" }))
        }
    }
}
