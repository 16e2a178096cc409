use actix_web::{web, App, HttpServer};

use storefront_service::config::AppConfig;
use storefront_service::queue::TransmitQueue;
use storefront_service::services::capacity::CapacityService;
use storefront_service::services::gst::GstCalculator;
use storefront_service::services::inventory::InventoryService;
use storefront_service::services::invoice::InvoiceService;
use storefront_service::services::invoicenow::InvoiceNowClient;
use storefront_service::services::orders::OrderService;
use storefront_service::services::stripe::StripeClient;
use storefront_service::{db, routes, worker};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env();

    let pool = db::get_db_pool(&config.database_url)
        .await
        .expect("postgres");
    if let Err(err) = sqlx::migrate!("./migrations").run(&pool).await {
        eprintln!("migration failed: {:?}", err);
        std::process::exit(1);
    }

    let stripe = StripeClient::new(&config);
    let invoicenow = InvoiceNowClient::new(&config);
    let (queue, queue_rx) = TransmitQueue::new(
        config.transmit_max_attempts,
        config.transmit_backoff_secs.clone(),
    );

    let inventory = InventoryService::new(pool.clone(), config.bootstrap_stock);
    let capacity = CapacityService::new(pool.clone());
    let orders = OrderService::new(
        pool.clone(),
        GstCalculator::default(),
        stripe.clone(),
        config.currency.clone(),
    );
    let invoices = InvoiceService::new(pool.clone(), queue.clone(), invoicenow, &config);

    worker::transmitter::spawn_transmitter(queue_rx, queue.clone(), invoices.clone());
    worker::reservation_reaper::spawn_reservation_reaper(
        inventory.clone(),
        config.reaper_interval_secs,
    );
    worker::invoice_retry::spawn_invoice_retrier(
        invoices.clone(),
        config.invoice_retry_interval_secs,
        config.stuck_invoice_age_secs,
    );

    let bind_addr = config.bind_addr.clone();
    log::info!("storefront service listening on http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(pool.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::new(stripe.clone()))
            .app_data(web::Data::new(inventory.clone()))
            .app_data(web::Data::new(capacity.clone()))
            .app_data(web::Data::new(orders.clone()))
            .app_data(web::Data::new(invoices.clone()))
            .configure(routes::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await
}
