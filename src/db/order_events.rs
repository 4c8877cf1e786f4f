//! Append-only order audit trail.
//!
//! Rows are written for operator visibility and never consumed
//! programmatically, with one exception: the transfer_created existence
//! check that gates refund/chargeback debits.

use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEventType {
    Paid,
    Canceled,
    Refunded,
    TransferCreated,
    Warning,
}

impl OrderEventType {
    pub fn as_db(&self) -> &'static str {
        match self {
            OrderEventType::Paid => "paid",
            OrderEventType::Canceled => "canceled",
            OrderEventType::Refunded => "refunded",
            OrderEventType::TransferCreated => "transfer_created",
            OrderEventType::Warning => "warning",
        }
    }
}

pub async fn append(
    conn: &mut PgConnection,
    order_id: Uuid,
    event_type: OrderEventType,
    message: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO order_events (id, order_id, event_type, message) VALUES ($1, $2, $3, $4)",
    )
    .bind(Uuid::new_v4())
    .bind(order_id)
    .bind(event_type.as_db())
    .bind(message)
    .execute(conn)
    .await?;
    Ok(())
}

/// Whether payouts were already sent for this order. This flag, not the
/// ledger balance, is what drives the debit-or-warn decision on refunds.
pub async fn transfer_created_exists(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM order_events WHERE order_id = $1 AND event_type = 'transfer_created')",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}
