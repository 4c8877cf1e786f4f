//! Durable webhook delivery log.
//!
//! One row per distinct upstream event id, keyed by a unique constraint so
//! literally-simultaneous deliveries settle into exactly one first sighting.
//! Status transitions: received → processed | error; repeat deliveries move
//! the row to duplicate without re-running business logic.

use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Received,
    Processed,
    Duplicate,
    Error,
}

impl DeliveryStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            DeliveryStatus::Received => "received",
            DeliveryStatus::Processed => "processed",
            DeliveryStatus::Duplicate => "duplicate",
            DeliveryStatus::Error => "error",
        }
    }
}

#[derive(Debug)]
pub struct RecordedDelivery {
    pub id: Uuid,
    /// False when this event id was already logged; business logic must not run
    pub is_first: bool,
}

/// Record a delivery, insert-first to eliminate the check-then-insert race.
///
/// On a repeat sighting the existing row's request id is refreshed for
/// debugging, but its status is left alone.
pub async fn record_delivery(
    pool: &PgPool,
    event_id: &str,
    event_type: &str,
    request_id: &str,
) -> Result<RecordedDelivery, sqlx::Error> {
    let inserted: Option<(Uuid,)> = sqlx::query_as(
        "INSERT INTO webhook_deliveries (id, stripe_event_id, event_type, status, request_id)
         VALUES ($1, $2, $3, 'received', $4)
         ON CONFLICT (stripe_event_id) DO NOTHING
         RETURNING id",
    )
    .bind(Uuid::new_v4())
    .bind(event_id)
    .bind(event_type)
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    if let Some((id,)) = inserted {
        return Ok(RecordedDelivery { id, is_first: true });
    }

    let (id,): (Uuid,) =
        sqlx::query_as("SELECT id FROM webhook_deliveries WHERE stripe_event_id = $1")
            .bind(event_id)
            .fetch_one(pool)
            .await?;

    if !request_id.is_empty() {
        // Keep the latest request id for debugging; best-effort.
        if let Err(e) =
            sqlx::query("UPDATE webhook_deliveries SET request_id = $1 WHERE id = $2 AND request_id <> $1")
                .bind(request_id)
                .bind(id)
                .execute(pool)
                .await
        {
            tracing::debug!(error = %e, "Failed to refresh delivery request id");
        }
    }

    Ok(RecordedDelivery { id, is_first: false })
}

pub async fn mark_processed(pool: &PgPool, event_id: &str) -> Result<(), sqlx::Error> {
    set_status(pool, event_id, DeliveryStatus::Processed, "").await
}

pub async fn mark_duplicate(pool: &PgPool, event_id: &str) -> Result<(), sqlx::Error> {
    set_status(pool, event_id, DeliveryStatus::Duplicate, "").await
}

pub async fn mark_error(pool: &PgPool, event_id: &str, message: &str) -> Result<(), sqlx::Error> {
    let mut msg = message;
    if msg.len() > 2000 {
        let mut end = 2000;
        while !msg.is_char_boundary(end) {
            end -= 1;
        }
        msg = &msg[..end];
    }
    set_status(pool, event_id, DeliveryStatus::Error, msg).await
}

async fn set_status(
    pool: &PgPool,
    event_id: &str,
    status: DeliveryStatus,
    error_message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE webhook_deliveries
            SET status = $1, error_message = $2, processed_at = now()
            WHERE stripe_event_id = $3",
    )
    .bind(status.as_db())
    .bind(error_message)
    .bind(event_id)
    .execute(pool)
    .await?;
    Ok(())
}
