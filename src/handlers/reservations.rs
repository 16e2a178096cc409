use actix_web::{delete, post, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::models::CreateReservationRequest;
use crate::services::inventory::InventoryService;

#[post("/reservations")]
pub async fn create_reservation(
    inventory: web::Data<InventoryService>,
    config: web::Data<AppConfig>,
    req: web::Json<CreateReservationRequest>,
) -> HttpResponse {
    match inventory
        .reserve(&req.items, config.reservation_ttl_secs)
        .await
    {
        Ok(receipt) => HttpResponse::Created().json(receipt),
        Err(err @ ServiceError::Validation(_)) => {
            HttpResponse::BadRequest().json(json!({ "error": err.to_string() }))
        }
        Err(err @ ServiceError::InsufficientStock { .. }) => {
            HttpResponse::UnprocessableEntity().json(json!({ "error": err.to_string() }))
        }
        Err(err) => {
            log::error!("failed to create reservation: {}", err);
            HttpResponse::InternalServerError().json(json!({ "error": "internal error" }))
        }
    }
}

#[delete("/reservations/{id}")]
pub async fn release_reservation(
    inventory: web::Data<InventoryService>,
    path: web::Path<Uuid>,
) -> HttpResponse {
    match inventory.release(path.into_inner()).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "message": "Reservation released" })),
        Err(err) => {
            log::error!("failed to release reservation: {}", err);
            HttpResponse::InternalServerError().json(json!({ "error": "internal error" }))
        }
    }
}
