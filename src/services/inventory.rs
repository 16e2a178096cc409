use chrono::{Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{
    Inventory, InventoryReservation, LedgerReason, ReservationItem, ReservationReceipt,
};

/// Reservation engine over the inventory ledger store. Every mutation of
/// stock or reservation rows happens under `SELECT ... FOR UPDATE` inside a
/// transaction; multi-SKU calls take row locks in sorted-SKU order so
/// concurrent multi-item reservations cannot deadlock.
#[derive(Clone)]
pub struct InventoryService {
    pool: PgPool,
    bootstrap_stock: i32,
}

impl InventoryService {
    pub fn new(pool: PgPool, bootstrap_stock: i32) -> Self {
        Self {
            pool,
            bootstrap_stock,
        }
    }

    /// Place holds for every item or none. All lines share one group id and
    /// one expiry; any shortfall aborts the whole transaction.
    pub async fn reserve(
        &self,
        items: &[ReservationItem],
        ttl_secs: i64,
    ) -> Result<ReservationReceipt, ServiceError> {
        if items.is_empty() {
            return Err(ServiceError::Validation("items must not be empty".into()));
        }
        for item in items {
            if item.sku.trim().is_empty() {
                return Err(ServiceError::Validation("sku must not be empty".into()));
            }
            if item.quantity <= 0 {
                return Err(ServiceError::Validation(format!(
                    "quantity must be positive for SKU: {}",
                    item.sku
                )));
            }
        }

        let mut sorted: Vec<&ReservationItem> = items.iter().collect();
        sorted.sort_by(|a, b| a.sku.cmp(&b.sku));

        let group_id = Uuid::new_v4();
        let expires_at = Utc::now() + Duration::seconds(ttl_secs);

        let mut tx = self.pool.begin().await?;

        for item in sorted {
            let inventory = sqlx::query_as::<_, Inventory>(
                "SELECT * FROM inventory WHERE sku = $1 FOR UPDATE",
            )
            .bind(&item.sku)
            .fetch_optional(&mut *tx)
            .await?;

            // Unknown SKUs get a seeded stock record on first reservation. A
            // concurrent creator can win the insert; fall back to locking
            // the row it created.
            let inventory = match inventory {
                Some(inventory) => inventory,
                None => {
                    let inserted = sqlx::query_as::<_, Inventory>(
                        "INSERT INTO inventory (sku, stock_count, reserved_count) \
                         VALUES ($1, $2, 0) ON CONFLICT (sku) DO NOTHING RETURNING *",
                    )
                    .bind(&item.sku)
                    .bind(self.bootstrap_stock)
                    .fetch_optional(&mut *tx)
                    .await?;

                    match inserted {
                        Some(inventory) => inventory,
                        None => {
                            sqlx::query_as::<_, Inventory>(
                                "SELECT * FROM inventory WHERE sku = $1 FOR UPDATE",
                            )
                            .bind(&item.sku)
                            .fetch_one(&mut *tx)
                            .await?
                        }
                    }
                }
            };

            let available = inventory.stock_count - inventory.reserved_count;
            if available < item.quantity {
                return Err(ServiceError::InsufficientStock {
                    sku: item.sku.clone(),
                });
            }

            sqlx::query(
                "UPDATE inventory SET reserved_count = reserved_count + $1, updated_at = NOW() \
                 WHERE sku = $2",
            )
            .bind(item.quantity)
            .bind(&item.sku)
            .execute(&mut *tx)
            .await?;

            let reservation_id = Uuid::new_v4();
            sqlx::query(
                "INSERT INTO inventory_reservations \
                 (id, reservation_group_id, sku, quantity, expires_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(reservation_id)
            .bind(group_id)
            .bind(&item.sku)
            .bind(item.quantity)
            .bind(expires_at)
            .execute(&mut *tx)
            .await?;

            Self::append_ledger(
                &mut tx,
                &item.sku,
                item.quantity,
                LedgerReason::ReservationCreated,
                Some(reservation_id),
            )
            .await?;
        }

        tx.commit().await?;

        Ok(ReservationReceipt {
            reservation_id: group_id,
            expires_at,
        })
    }

    /// Commit a group: deduct physical stock and release the holds. No-op
    /// when the group has no active lines, which makes duplicate webhook
    /// deliveries and webhook/reaper races safe.
    pub async fn confirm(&self, group_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        Self::confirm_in_tx(&mut tx, group_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn confirm_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
    ) -> Result<(), ServiceError> {
        let reservations = Self::lock_active_lines(tx, group_id).await?;

        for reservation in reservations {
            sqlx::query(
                "UPDATE inventory \
                 SET stock_count = stock_count - $1, reserved_count = reserved_count - $1, \
                     updated_at = NOW() \
                 WHERE sku = $2",
            )
            .bind(reservation.quantity)
            .bind(&reservation.sku)
            .execute(&mut **tx)
            .await?;

            sqlx::query(
                "UPDATE inventory_reservations SET status = 'committed', updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(reservation.id)
            .execute(&mut **tx)
            .await?;

            Self::append_ledger(
                tx,
                &reservation.sku,
                -reservation.quantity,
                LedgerReason::ReservationConfirmed,
                Some(reservation.id),
            )
            .await?;
        }

        Ok(())
    }

    /// Release a group's holds without touching physical stock. Used for
    /// explicit cancellation and sweep-driven expiry; no-op when nothing is
    /// active.
    pub async fn release(&self, group_id: Uuid) -> Result<(), ServiceError> {
        let mut tx = self.pool.begin().await?;
        Self::release_in_tx(&mut tx, group_id).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn release_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
    ) -> Result<(), ServiceError> {
        let reservations = Self::lock_active_lines(tx, group_id).await?;

        for reservation in reservations {
            sqlx::query(
                "UPDATE inventory SET reserved_count = reserved_count - $1, updated_at = NOW() \
                 WHERE sku = $2",
            )
            .bind(reservation.quantity)
            .bind(&reservation.sku)
            .execute(&mut **tx)
            .await?;

            sqlx::query(
                "UPDATE inventory_reservations SET status = 'expired', updated_at = NOW() \
                 WHERE id = $1",
            )
            .bind(reservation.id)
            .execute(&mut **tx)
            .await?;

            Self::append_ledger(
                tx,
                &reservation.sku,
                -reservation.quantity,
                LedgerReason::ReservationReleased,
                Some(reservation.id),
            )
            .await?;
        }

        Ok(())
    }

    /// Physical-stock correction under row lock, recorded as an `adjustment`
    /// ledger entry referencing the acting party.
    pub async fn adjust_stock(
        &self,
        sku: &str,
        quantity_change: i32,
        reference_id: Option<Uuid>,
    ) -> Result<Inventory, ServiceError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query_as::<_, Inventory>("SELECT * FROM inventory WHERE sku = $1 FOR UPDATE")
            .bind(sku)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(ServiceError::NotFound("inventory"))?;

        let inventory = sqlx::query_as::<_, Inventory>(
            "UPDATE inventory SET stock_count = stock_count + $1, updated_at = NOW() \
             WHERE sku = $2 RETURNING *",
        )
        .bind(quantity_change)
        .bind(sku)
        .fetch_one(&mut *tx)
        .await?;

        Self::append_ledger(
            &mut tx,
            sku,
            quantity_change,
            LedgerReason::Adjustment,
            reference_id,
        )
        .await?;

        tx.commit().await?;
        Ok(inventory)
    }

    /// Reaper core: release every group that still has an active line past
    /// its expiry. Returns the number of groups released.
    pub async fn release_expired(&self) -> Result<u64, ServiceError> {
        let group_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT reservation_group_id FROM inventory_reservations \
             WHERE status = 'active' AND expires_at < NOW()",
        )
        .fetch_all(&self.pool)
        .await?;

        let count = group_ids.len() as u64;
        for group_id in group_ids {
            self.release(group_id).await?;
        }

        Ok(count)
    }

    async fn lock_active_lines(
        tx: &mut Transaction<'_, Postgres>,
        group_id: Uuid,
    ) -> Result<Vec<InventoryReservation>, ServiceError> {
        let reservations = sqlx::query_as::<_, InventoryReservation>(
            "SELECT * FROM inventory_reservations \
             WHERE reservation_group_id = $1 AND status = 'active' \
             ORDER BY sku FOR UPDATE",
        )
        .bind(group_id)
        .fetch_all(&mut **tx)
        .await?;

        Ok(reservations)
    }

    async fn append_ledger(
        tx: &mut Transaction<'_, Postgres>,
        sku: &str,
        quantity_change: i32,
        reason: LedgerReason,
        reference_id: Option<Uuid>,
    ) -> Result<(), ServiceError> {
        sqlx::query(
            "INSERT INTO inventory_ledger (id, sku, quantity_change, reason, reference_id) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(sku)
        .bind(quantity_change)
        .bind(reason)
        .bind(reference_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}
