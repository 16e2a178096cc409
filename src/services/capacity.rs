use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::models::{Booking, EventSession};

/// Seat allocation for finite-capacity event sessions. Same locking
/// discipline as the reservation engine, simpler state: a booking is
/// confirmed immediately and there is no release path.
#[derive(Clone)]
pub struct CapacityService {
    pool: PgPool,
}

impl CapacityService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn reserve_seats(
        &self,
        session_id: Uuid,
        email: &str,
        quantity: i32,
    ) -> Result<Booking, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::Validation(
                "quantity must be positive".into(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let session = sqlx::query_as::<_, EventSession>(
            "SELECT * FROM event_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ServiceError::NotFound("event session"))?;

        if session.capacity - session.booked_count < quantity {
            return Err(ServiceError::InsufficientCapacity);
        }

        sqlx::query(
            "UPDATE event_sessions SET booked_count = booked_count + $1, updated_at = NOW() \
             WHERE id = $2",
        )
        .bind(quantity)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        let booking = sqlx::query_as::<_, Booking>(
            "INSERT INTO bookings (id, session_id, user_email, quantity) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(session_id)
        .bind(email)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(booking)
    }
}
