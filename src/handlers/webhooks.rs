use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::json;
use sqlx::PgPool;

use crate::services::invoice::InvoiceService;
use crate::services::stripe::{StripeClient, StripeEvent};
use crate::services::webhook;

#[post("/webhooks/stripe")]
pub async fn stripe_webhook(
    pool: web::Data<PgPool>,
    stripe: web::Data<StripeClient>,
    invoices: web::Data<InvoiceService>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let signature = req
        .headers()
        .get("Stripe-Signature")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if !stripe.verify_webhook_signature(&body, signature) {
        log::error!("stripe webhook signature verification failed");
        return HttpResponse::BadRequest().json(json!({ "error": "Invalid signature" }));
    }

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return HttpResponse::BadRequest().json(json!({ "error": "Invalid payload" })),
    };
    let event: StripeEvent = match serde_json::from_value(raw.clone()) {
        Ok(event) => event,
        Err(_) => return HttpResponse::BadRequest().json(json!({ "error": "Invalid payload" })),
    };

    match webhook::process_event(pool.get_ref(), &event, &raw).await {
        Ok(outcome) => {
            if outcome.already_processed {
                return HttpResponse::Ok().json(json!({ "message": "Event already processed" }));
            }

            if let Some(order_id) = outcome.paid_order_id {
                // Failure here is not fatal to the ack: the stuck-invoice
                // sweep creates missing invoices for paid orders.
                if let Err(err) = invoices.create_for_order(order_id).await {
                    log::error!("invoice creation failed for order {}: {}", order_id, err);
                }
            }

            HttpResponse::Ok().json(json!({ "message": "Received" }))
        }
        Err(err) => {
            log::error!("webhook processing failed: {}", err);
            HttpResponse::InternalServerError()
                .json(json!({ "error": "webhook processing failed" }))
        }
    }
}
