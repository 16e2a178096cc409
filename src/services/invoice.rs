use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::ServiceError;
use crate::models::{Invoice, InvoiceStatus, Order};
use crate::queue::TransmitQueue;
use crate::services::invoicenow::InvoiceNowClient;

pub const INVOICE_NUMBER_PREFIX: &str = "KC";

#[derive(Debug, Clone, Serialize)]
pub struct SupplierParty {
    pub uen: String,
    pub gst_reg: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CustomerParty {
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayloadTotals {
    pub subtotal: f64,
    pub gst: f64,
    pub total: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayloadItem {
    pub description: String,
    pub quantity: i32,
    pub price: f64,
}

/// Simplified Peppol BIS Billing 3.0 representation sent to the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct InvoicePayload {
    pub invoice_number: String,
    pub issue_date: String,
    pub supplier: SupplierParty,
    pub customer: CustomerParty,
    pub totals: PayloadTotals,
    pub items: Vec<PayloadItem>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct InvoiceLineRow {
    pub description: String,
    pub quantity: i32,
    pub price_at_time_cents: i64,
}

/// Invoice issuance and transmission. Creation allocates the invoice number
/// and enqueues an asynchronous transmission; every delivery attempt is
/// recorded whether it succeeds or not.
#[derive(Clone)]
pub struct InvoiceService {
    pool: PgPool,
    queue: TransmitQueue,
    client: InvoiceNowClient,
    supplier: SupplierParty,
    currency: String,
}

impl InvoiceService {
    pub fn new(
        pool: PgPool,
        queue: TransmitQueue,
        client: InvoiceNowClient,
        config: &AppConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            client,
            supplier: SupplierParty {
                uen: config.supplier_uen.clone(),
                gst_reg: config.supplier_gst_reg.clone(),
                name: config.supplier_name.clone(),
            },
            currency: config.currency.to_uppercase(),
        }
    }

    /// Create the invoice for an order and enqueue its transmission.
    /// Idempotent per order: an existing invoice is returned untouched. The
    /// order keeps its invoice number when the webhook already allocated one.
    pub async fn create_for_order(&self, order_id: Uuid) -> Result<Invoice, ServiceError> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("order"))?;

        if let Some(existing) =
            sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE order_id = $1")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?
        {
            return Ok(existing);
        }

        if order.invoice_number.is_none() {
            let invoice_number = allocate_invoice_number(&mut tx).await?;
            sqlx::query("UPDATE orders SET invoice_number = $1, updated_at = NOW() WHERE id = $2")
                .bind(&invoice_number)
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }

        let invoice = sqlx::query_as::<_, Invoice>(
            "INSERT INTO invoices (id, order_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.queue.enqueue(invoice.id);
        Ok(invoice)
    }

    /// Deliver one invoice to the gateway, recording the attempt. Errors
    /// propagate so the queue consumer can schedule a retry.
    pub async fn transmit(&self, invoice_id: Uuid) -> Result<(), ServiceError> {
        let invoice = sqlx::query_as::<_, Invoice>("SELECT * FROM invoices WHERE id = $1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(ServiceError::NotFound("invoice"))?;

        if invoice.status == InvoiceStatus::Transmitted {
            return Ok(());
        }

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(invoice.order_id)
            .fetch_one(&self.pool)
            .await?;

        let items = sqlx::query_as::<_, InvoiceLineRow>(
            "SELECT p.name AS description, oi.quantity, oi.price_at_time_cents \
             FROM order_items oi \
             JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = $1 \
             ORDER BY oi.created_at",
        )
        .bind(invoice.order_id)
        .fetch_all(&self.pool)
        .await?;

        let payload = build_payload(&invoice, &order, &items, &self.supplier, &self.currency);

        match self.client.send(&payload).await {
            Ok(transmission_id) => {
                let mut tx = self.pool.begin().await?;

                sqlx::query(
                    "UPDATE invoices \
                     SET status = 'transmitted', provider_transmission_id = $1, updated_at = NOW() \
                     WHERE id = $2",
                )
                .bind(&transmission_id)
                .bind(invoice.id)
                .execute(&mut *tx)
                .await?;

                sqlx::query(
                    "INSERT INTO invoice_transmissions \
                     (id, invoice_id, attempt_at, response_payload, success) \
                     VALUES ($1, $2, NOW(), $3, TRUE)",
                )
                .bind(Uuid::new_v4())
                .bind(invoice.id)
                .bind(serde_json::json!({ "id": transmission_id }))
                .execute(&mut *tx)
                .await?;

                tx.commit().await?;
                Ok(())
            }
            Err(err) => {
                sqlx::query(
                    "INSERT INTO invoice_transmissions \
                     (id, invoice_id, attempt_at, response_payload, success) \
                     VALUES ($1, $2, NOW(), $3, FALSE)",
                )
                .bind(Uuid::new_v4())
                .bind(invoice.id)
                .bind(serde_json::json!({ "error": err.to_string() }))
                .execute(&self.pool)
                .await?;

                Err(err)
            }
        }
    }

    /// Stuck-invoice sweep: re-enqueue drafts older than the age threshold
    /// and create the missing invoice for any paid order that has none.
    /// Returns the number of actions taken.
    pub async fn retry_stuck(&self, stuck_age_secs: i64) -> Result<u64, ServiceError> {
        let stale: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM invoices \
             WHERE status = 'draft' AND created_at < NOW() - make_interval(secs => $1)",
        )
        .bind(stuck_age_secs as f64)
        .fetch_all(&self.pool)
        .await?;

        let mut actions = stale.len() as u64;
        for invoice_id in stale {
            self.queue.enqueue(invoice_id);
        }

        let orphaned: Vec<Uuid> = sqlx::query_scalar(
            "SELECT o.id FROM orders o \
             WHERE o.status = 'paid' \
             AND NOT EXISTS (SELECT 1 FROM invoices i WHERE i.order_id = o.id)",
        )
        .fetch_all(&self.pool)
        .await?;

        for order_id in orphaned {
            match self.create_for_order(order_id).await {
                Ok(_) => actions += 1,
                Err(err) => {
                    log::error!("failed to create invoice for paid order {}: {}", order_id, err)
                }
            }
        }

        Ok(actions)
    }
}

/// Allocate a `KC-YEAR-SEGMENT` number not yet used by any order. The random
/// segment is collision-checked before use and regenerated on collision; the
/// unique index on orders.invoice_number backstops concurrent allocators.
pub async fn allocate_invoice_number(
    tx: &mut Transaction<'_, Postgres>,
) -> Result<String, ServiceError> {
    loop {
        let candidate = candidate_invoice_number();

        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM orders WHERE invoice_number = $1)")
                .bind(&candidate)
                .fetch_one(&mut **tx)
                .await?;

        if !taken {
            return Ok(candidate);
        }
    }
}

fn candidate_invoice_number() -> String {
    format!(
        "{}-{}-{}",
        INVOICE_NUMBER_PREFIX,
        Utc::now().format("%Y"),
        random_segment()
    )
}

fn random_segment() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_ascii_uppercase()
}

pub fn build_payload(
    invoice: &Invoice,
    order: &Order,
    items: &[InvoiceLineRow],
    supplier: &SupplierParty,
    currency: &str,
) -> InvoicePayload {
    InvoicePayload {
        invoice_number: order.invoice_number.clone().unwrap_or_default(),
        issue_date: invoice.created_at.format("%Y-%m-%d").to_string(),
        supplier: supplier.clone(),
        customer: CustomerParty {
            email: order.email.clone(),
        },
        totals: PayloadTotals {
            subtotal: cents_to_dollars(order.subtotal_cents),
            gst: cents_to_dollars(order.gst_cents),
            total: cents_to_dollars(order.total_cents),
            currency: currency.to_string(),
        },
        items: items
            .iter()
            .map(|item| PayloadItem {
                description: item.description.clone(),
                quantity: item.quantity,
                price: cents_to_dollars(item.price_at_time_cents),
            })
            .collect(),
    }
}

fn cents_to_dollars(cents: i64) -> f64 {
    cents as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    #[test]
    fn invoice_number_has_expected_shape() {
        let number = candidate_invoice_number();
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], INVOICE_NUMBER_PREFIX);
        assert_eq!(parts[1].len(), 4);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2].len(), 8);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[test]
    fn random_segments_differ() {
        assert_ne!(random_segment(), random_segment());
    }

    #[test]
    fn payload_mirrors_order_snapshot() {
        let order_id = Uuid::new_v4();
        let issued = Utc.with_ymd_and_hms(2026, 8, 7, 3, 30, 0).unwrap();

        let order = Order {
            id: order_id,
            subtotal_cents: 10000,
            gst_cents: 900,
            total_cents: 10900,
            gst_rate: Decimal::new(900, 2),
            invoice_number: Some("KC-2026-AB12CD34".to_string()),
            status: OrderStatus::Paid,
            email: Some("buyer@example.com".to_string()),
            created_at: issued,
            updated_at: issued,
        };
        let invoice = Invoice {
            id: Uuid::new_v4(),
            order_id,
            provider_transmission_id: None,
            status: InvoiceStatus::Draft,
            created_at: issued,
            updated_at: issued,
        };
        let items = vec![
            InvoiceLineRow {
                description: "Heritage Blend".to_string(),
                quantity: 2,
                price_at_time_cents: 2800,
            },
            InvoiceLineRow {
                description: "Estate Single Origin".to_string(),
                quantity: 1,
                price_at_time_cents: 5300,
            },
        ];
        let supplier = SupplierParty {
            uen: "201812345K".to_string(),
            gst_reg: "M9-0012345-6".to_string(),
            name: "Kopi Collective Roastery Pte. Ltd.".to_string(),
        };

        let payload = build_payload(&invoice, &order, &items, &supplier, "SGD");

        assert_eq!(payload.invoice_number, "KC-2026-AB12CD34");
        assert_eq!(payload.issue_date, "2026-08-07");
        assert_eq!(payload.totals.subtotal, 100.0);
        assert_eq!(payload.totals.gst, 9.0);
        assert_eq!(payload.totals.total, 109.0);
        assert_eq!(payload.totals.currency, "SGD");
        assert_eq!(payload.items.len(), 2);
        assert_eq!(payload.items[0].quantity, 2);
        assert_eq!(payload.items[0].price, 28.0);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["supplier"]["uen"], "201812345K");
        assert_eq!(json["customer"]["email"], "buyer@example.com");
        assert_eq!(json["items"][1]["description"], "Estate Single Origin");
    }
}
