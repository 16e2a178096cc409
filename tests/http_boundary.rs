//! Handler-level tests that exercise the HTTP boundary without a live
//! database: request validation and webhook signature rejection both fail
//! before any query is issued, so a lazy pool never connects.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use storefront_service::config::AppConfig;
use storefront_service::queue::TransmitQueue;
use storefront_service::routes;
use storefront_service::services::capacity::CapacityService;
use storefront_service::services::gst::GstCalculator;
use storefront_service::services::inventory::InventoryService;
use storefront_service::services::invoice::InvoiceService;
use storefront_service::services::invoicenow::InvoiceNowClient;
use storefront_service::services::orders::OrderService;
use storefront_service::services::stripe::StripeClient;

macro_rules! test_app {
    () => {{
        let config = AppConfig::defaults("postgres://localhost/unreachable");
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();
        let stripe = StripeClient::new(&config);
        let invoicenow = InvoiceNowClient::new(&config);
        let (queue, _rx) = TransmitQueue::new(3, vec![0]);

        test::init_service(
            App::new()
                .app_data(web::Data::new(pool.clone()))
                .app_data(web::Data::new(config.clone()))
                .app_data(web::Data::new(stripe.clone()))
                .app_data(web::Data::new(InventoryService::new(pool.clone(), 100)))
                .app_data(web::Data::new(CapacityService::new(pool.clone())))
                .app_data(web::Data::new(OrderService::new(
                    pool.clone(),
                    GstCalculator::default(),
                    stripe,
                    config.currency.clone(),
                )))
                .app_data(web::Data::new(InvoiceService::new(
                    pool, queue, invoicenow, &config,
                )))
                .configure(routes::configure),
        )
        .await
    }};
}

#[actix_web::test]
async fn health_endpoint_responds() {
    let app = test_app!();

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn webhook_rejects_bad_signature() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/stripe")
        .insert_header(("Stripe-Signature", "t=1700000000,v1=deadbeef"))
        .set_payload("{\"id\":\"evt_1\",\"type\":\"payment_intent.succeeded\"}")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_rejects_missing_signature_header() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/webhooks/stripe")
        .set_payload("{}")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn reservation_rejects_empty_items() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/reservations")
        .set_json(json!({ "items": [] }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn reservation_rejects_non_positive_quantity() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/reservations")
        .set_json(json!({ "items": [{ "sku": "heritage-blend", "quantity": 0 }] }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn order_rejects_invalid_email() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/orders")
        .set_json(json!({ "reservation_id": Uuid::new_v4(), "email": "not-an-email" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn booking_rejects_zero_quantity() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/bookings")
        .set_json(json!({
            "session_id": Uuid::new_v4(),
            "email": "buyer@example.com",
            "quantity": 0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn malformed_json_is_a_client_error() {
    let app = test_app!();

    let req = test::TestRequest::post()
        .uri("/api/v1/orders")
        .insert_header(("content-type", "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
