//! Append-only seller balance ledger.
//!
//! Every row is an immutable signed entry: positive = platform owes seller,
//! negative = seller owes platform. A seller's balance is the plain sum of
//! their entries and may be negative. SALE credits are deduplicated by a
//! partial unique index on (seller_id, order_id) where reason = 'sale';
//! debits are inserted unconditionally and rely on their caller's idempotent
//! decision (the transfer_created flag).

use std::collections::BTreeMap;

use sqlx::PgConnection;
use uuid::Uuid;

use super::orders::OrderItem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Sale,
    Payout,
    Refund,
    Chargeback,
    Adjustment,
}

impl Reason {
    pub fn as_db(&self) -> &'static str {
        match self {
            Reason::Sale => "sale",
            Reason::Payout => "payout",
            Reason::Refund => "refund",
            Reason::Chargeback => "chargeback",
            Reason::Adjustment => "adjustment",
        }
    }
}

/// Sum an order's positive line nets per seller, in a stable order.
pub fn net_totals_by_seller(items: &[OrderItem]) -> BTreeMap<Uuid, i64> {
    let mut totals: BTreeMap<Uuid, i64> = BTreeMap::new();
    for it in items {
        if it.seller_net_cents > 0 {
            *totals.entry(it.seller_id).or_default() += it.seller_net_cents;
        }
    }
    totals
}

/// Ensure one +SALE credit per seller for a paid order.
///
/// Idempotent via the partial unique index; returns how many credits were
/// newly created (0 when they all already existed).
pub async fn credit_sale(
    conn: &mut PgConnection,
    order_id: Uuid,
    items: &[OrderItem],
) -> Result<u64, sqlx::Error> {
    let mut created = 0u64;

    for (seller_id, net_cents) in net_totals_by_seller(items) {
        let result = sqlx::query(
            "INSERT INTO seller_balance_entries (id, seller_id, order_id, amount_cents, reason, note)
             VALUES ($1, $2, $3, $4, 'sale', $5)
             ON CONFLICT (seller_id, order_id) WHERE reason = 'sale' DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(order_id)
        .bind(net_cents)
        .bind(format!("Order paid: credit seller net for order {order_id}"))
        .execute(&mut *conn)
        .await?;
        created += result.rows_affected();
    }

    Ok(created)
}

/// One debit against a seller's balance.
pub struct Debit<'a> {
    pub seller_id: Uuid,
    pub order_id: Option<Uuid>,
    pub order_item_id: Option<Uuid>,
    /// Positive magnitude; stored negated
    pub amount_cents: i64,
    pub reason: Reason,
    pub note: &'a str,
}

/// Insert a debit entry. Always inserts: partial refunds can legitimately
/// debit the same item more than once, so the at-most-once guard lives with
/// the caller's transfer_created check, not here.
pub async fn debit(conn: &mut PgConnection, d: &Debit<'_>) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO seller_balance_entries (id, seller_id, order_id, order_item_id, amount_cents, reason, note)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(Uuid::new_v4())
    .bind(d.seller_id)
    .bind(d.order_id)
    .bind(d.order_item_id)
    .bind(-d.amount_cents)
    .bind(d.reason.as_db())
    .bind(d.note)
    .execute(conn)
    .await?;
    Ok(())
}

/// Signed balance: sum of all entries for a seller.
pub async fn balance(conn: &mut PgConnection, seller_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM seller_balance_entries WHERE seller_id = $1",
    )
    .bind(seller_id)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}

/// Ledger row as exposed by the reporting endpoint
#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub order_id: Option<Uuid>,
    pub order_item_id: Option<Uuid>,
    pub amount_cents: i64,
    pub reason: String,
    pub note: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

pub async fn entries_for_seller(
    conn: &mut PgConnection,
    seller_id: Uuid,
    limit: i64,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as::<_, LedgerEntry>(
        "SELECT id, order_id, order_item_id, amount_cents, reason, note, created_at
            FROM seller_balance_entries
            WHERE seller_id = $1
            ORDER BY created_at DESC
            LIMIT $2",
    )
    .bind(seller_id)
    .bind(limit)
    .fetch_all(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_item(seller_id: Uuid, net: i64) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            seller_id,
            quantity: 1,
            unit_price_cents: net,
            seller_net_cents: net,
        }
    }

    #[test]
    fn net_totals_group_by_seller_and_skip_nonpositive() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let items = vec![
            order_item(a, 4000),
            order_item(a, 2000),
            order_item(b, 4000),
            order_item(b, 0),
            order_item(b, -300),
        ];
        let totals = net_totals_by_seller(&items);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[&a], 6000);
        assert_eq!(totals[&b], 4000);
    }

    #[test]
    fn net_totals_empty_when_nothing_positive() {
        let items = vec![order_item(Uuid::new_v4(), 0)];
        assert!(net_totals_by_seller(&items).is_empty());
    }
}
