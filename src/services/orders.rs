use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{DraftOrderResponse, InventoryReservation, Product};
use crate::services::gst::GstCalculator;
use crate::services::stripe::StripeClient;

/// Turns an active reservation group into a priced pending order with a
/// payment intent. Prices are re-read from the catalog at order time; the
/// reservation stays active until the webhook confirms payment.
#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    gst: GstCalculator,
    stripe: StripeClient,
    currency: String,
}

impl OrderService {
    pub fn new(pool: PgPool, gst: GstCalculator, stripe: StripeClient, currency: String) -> Self {
        Self {
            pool,
            gst,
            stripe,
            currency,
        }
    }

    pub async fn create_draft_order(
        &self,
        reservation_group_id: Uuid,
        email: &str,
    ) -> Result<DraftOrderResponse, ServiceError> {
        let reservations = sqlx::query_as::<_, InventoryReservation>(
            "SELECT * FROM inventory_reservations \
             WHERE reservation_group_id = $1 AND status = 'active' AND expires_at > NOW() \
             ORDER BY sku",
        )
        .bind(reservation_group_id)
        .fetch_all(&self.pool)
        .await?;

        if reservations.is_empty() {
            return Err(ServiceError::ReservationInvalidOrExpired);
        }

        let mut total_cents: i64 = 0;
        let mut lines: Vec<(Product, i32)> = Vec::with_capacity(reservations.len());

        for reservation in &reservations {
            let product = sqlx::query_as::<_, Product>(
                "SELECT * FROM products WHERE slug = $1 AND is_active = TRUE",
            )
            .bind(&reservation.sku)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("product"))?;

            total_cents += product.price_cents * i64::from(reservation.quantity);
            lines.push((product, reservation.quantity));
        }

        let breakdown = self.gst.calculate_from_inclusive(total_cents);
        let order_id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO orders (id, subtotal_cents, gst_cents, total_cents, gst_rate, email) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(order_id)
        .bind(breakdown.subtotal_cents)
        .bind(breakdown.gst_cents)
        .bind(breakdown.total_cents)
        .bind(breakdown.gst_rate)
        .bind(email)
        .execute(&mut *tx)
        .await?;

        for (product, quantity) in &lines {
            sqlx::query(
                "INSERT INTO order_items (id, order_id, product_id, quantity, price_at_time_cents) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(product.id)
            .bind(quantity)
            .bind(product.price_cents)
            .execute(&mut *tx)
            .await?;
        }

        // An intent failure drops the transaction, so no orphan order or
        // items survive and the reservation can be retried.
        let intent = self
            .stripe
            .create_payment_intent(
                order_id,
                breakdown.total_cents,
                &self.currency,
                reservation_group_id,
            )
            .await?;

        sqlx::query(
            "INSERT INTO payments (id, order_id, payment_intent_id, amount_cents) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(&intent.id)
        .bind(breakdown.total_cents)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(DraftOrderResponse {
            client_secret: intent.client_secret,
            order_id,
        })
    }
}
