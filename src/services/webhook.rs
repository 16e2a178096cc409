use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{Order, OrderStatus, Payment};
use crate::services::inventory::InventoryService;
use crate::services::invoice::allocate_invoice_number;
use crate::services::stripe::{StripeEvent, StripeEventObject};

pub const PAYMENT_SUCCEEDED_EVENT: &str = "payment_intent.succeeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookOutcome {
    pub already_processed: bool,
    /// Set when this event transitioned an order to paid; the caller uses it
    /// to trigger invoice creation exactly once.
    pub paid_order_id: Option<Uuid>,
}

/// Apply one verified provider event. The webhook_events row is the
/// idempotency guard for at-least-once delivery and is inserted in the same
/// transaction as the state change it guards; unknown event types and
/// unmatched payments are recorded and acknowledged, never failed.
pub async fn process_event(
    pool: &PgPool,
    event: &StripeEvent,
    raw_payload: &serde_json::Value,
) -> Result<WebhookOutcome, ServiceError> {
    let already_processed: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM webhook_events WHERE id = $1)")
            .bind(&event.id)
            .fetch_one(pool)
            .await?;

    if already_processed {
        return Ok(WebhookOutcome {
            already_processed: true,
            paid_order_id: None,
        });
    }

    let mut tx = pool.begin().await?;

    let paid_order_id = if event.event_type == PAYMENT_SUCCEEDED_EVENT {
        handle_payment_succeeded(&mut tx, &event.data.object).await?
    } else {
        None
    };

    sqlx::query(
        "INSERT INTO webhook_events (id, payload, processed_at) VALUES ($1, $2, NOW()) \
         ON CONFLICT (id) DO NOTHING",
    )
    .bind(&event.id)
    .bind(raw_payload)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(WebhookOutcome {
        already_processed: false,
        paid_order_id,
    })
}

async fn handle_payment_succeeded(
    tx: &mut Transaction<'_, Postgres>,
    intent: &StripeEventObject,
) -> Result<Option<Uuid>, ServiceError> {
    let payment = sqlx::query_as::<_, Payment>(
        "SELECT * FROM payments WHERE payment_intent_id = $1 FOR UPDATE",
    )
    .bind(&intent.id)
    .fetch_optional(&mut **tx)
    .await?;

    let Some(payment) = payment else {
        log::warn!("payment not found for intent {}", intent.id);
        return Ok(None);
    };

    let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
        .bind(payment.order_id)
        .fetch_one(&mut **tx)
        .await?;

    // Guards the same event's logic running twice concurrently, on top of
    // the webhook_events existence gate.
    if order.status == OrderStatus::Paid {
        return Ok(None);
    }

    let invoice_number = allocate_invoice_number(tx).await?;

    sqlx::query(
        "UPDATE orders SET status = 'paid', invoice_number = $1, updated_at = NOW() \
         WHERE id = $2",
    )
    .bind(&invoice_number)
    .bind(order.id)
    .execute(&mut **tx)
    .await?;

    sqlx::query("UPDATE payments SET status = 'succeeded', updated_at = NOW() WHERE id = $1")
        .bind(payment.id)
        .execute(&mut **tx)
        .await?;

    match intent
        .metadata
        .get("reservation_group_id")
        .map(|value| Uuid::parse_str(value))
    {
        Some(Ok(group_id)) => {
            InventoryService::confirm_in_tx(tx, group_id).await?;
        }
        Some(Err(_)) => {
            log::warn!(
                "intent {} carries an unparseable reservation_group_id",
                intent.id
            );
        }
        None => {
            log::warn!("intent {} carries no reservation_group_id", intent.id);
        }
    }

    Ok(Some(order.id))
}
