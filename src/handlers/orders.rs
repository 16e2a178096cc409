use actix_web::{post, web, HttpResponse};
use serde_json::json;

use crate::error::ServiceError;
use crate::models::CreateOrderRequest;
use crate::services::orders::OrderService;

#[post("/orders")]
pub async fn create_order(
    orders: web::Data<OrderService>,
    req: web::Json<CreateOrderRequest>,
) -> HttpResponse {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return HttpResponse::BadRequest().json(json!({ "error": "a valid email is required" }));
    }

    match orders.create_draft_order(req.reservation_id, email).await {
        Ok(draft) => HttpResponse::Ok().json(draft),
        Err(err @ ServiceError::ReservationInvalidOrExpired) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": err.to_string() }))
        }
        Err(err @ ServiceError::NotFound(_)) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": err.to_string() }))
        }
        Err(ServiceError::Provider(detail)) => {
            log::error!("payment intent creation failed: {}", detail);
            HttpResponse::BadGateway()
                .json(json!({ "error": "payment provider unavailable, order not created" }))
        }
        Err(err) => {
            log::error!("failed to create order: {}", err);
            HttpResponse::InternalServerError().json(json!({ "error": "internal error" }))
        }
    }
}
