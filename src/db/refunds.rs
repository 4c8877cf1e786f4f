//! Distinct gateway refunds observed per order.
//!
//! The gateway reports one refund through two event families with distinct
//! event ids, so event-level dedup alone cannot stop a refund from being
//! counted twice. Rows here are keyed by the gateway refund id; the summed
//! amounts are the refunded-to-date figure derived from distinct refunds.

use sqlx::PgConnection;
use uuid::Uuid;

/// Record one gateway refund. Insert-first on the refund id: returns true
/// only on the first sighting, false when the refund was already recorded.
pub async fn record(
    conn: &mut PgConnection,
    order_id: Uuid,
    refund_id: &str,
    amount_cents: i64,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO order_refunds (stripe_refund_id, order_id, amount_cents)
         VALUES ($1, $2, $3)
         ON CONFLICT (stripe_refund_id) DO NOTHING",
    )
    .bind(refund_id)
    .bind(order_id)
    .bind(amount_cents)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Sum of all distinct refunds recorded for an order.
pub async fn total_for_order(conn: &mut PgConnection, order_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM order_refunds WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}
