//! Order aggregate and its state transitions.
//!
//! Status transitions are monotonic forward: pending → paid → refunded, or
//! pending → canceled. All mutating operations run on a connection that holds
//! the order's row lock (see the webhook dispatcher) and are idempotent.

use chrono::Utc;
use sqlx::PgConnection;
use uuid::Uuid;

use super::order_events::{self, OrderEventType};

/// Order status values as stored in the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
    Refunded,
}

impl OrderStatus {
    pub fn as_db(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Refunded => "refunded",
        }
    }
}

/// Order aggregate root (monetary + gateway snapshot, not the full row)
#[derive(Debug, sqlx::FromRow)]
pub struct Order {
    pub id: Uuid,
    pub status: String,
    pub currency: String,
    pub total_cents: i64,
    pub refunded_total_cents: i64,
    pub stripe_session_id: String,
    pub stripe_payment_intent_id: String,
    pub paid_at: Option<chrono::DateTime<Utc>>,
}

impl Order {
    pub fn is(&self, status: OrderStatus) -> bool {
        self.status == status.as_db()
    }

    pub fn is_terminal(&self) -> bool {
        self.is(OrderStatus::Canceled) || self.is(OrderStatus::Refunded)
    }
}

/// Line item with the frozen per-seller monetary snapshot
#[derive(Debug, sqlx::FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub seller_net_cents: i64,
}

impl OrderItem {
    pub fn line_total_cents(&self) -> i64 {
        self.quantity * self.unit_price_cents
    }
}

/// Shipping details captured from the checkout session
#[derive(Debug, Default)]
pub struct ShippingSnapshot {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingSnapshot {
    /// True when there is an address worth persisting
    pub fn has_address(&self) -> bool {
        !self.line1.is_empty()
            || !self.city.is_empty()
            || !self.postal_code.is_empty()
            || !self.country.is_empty()
    }
}

/// Load an order and take its exclusive row lock for the current transaction.
pub async fn find_for_update(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as::<_, Order>(
        "SELECT id, status, currency, total_cents, refunded_total_cents,
            stripe_session_id, stripe_payment_intent_id, paid_at
            FROM orders WHERE id = $1 FOR UPDATE",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await
}

/// Fallback mapping for events that carry only a payment intent id.
pub async fn find_id_by_payment_intent(
    conn: &mut PgConnection,
    payment_intent_id: &str,
) -> Result<Option<Uuid>, sqlx::Error> {
    let row: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM orders WHERE stripe_payment_intent_id = $1 LIMIT 1")
            .bind(payment_intent_id)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|r| r.0))
}

pub async fn items_for_order(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as::<_, OrderItem>(
        "SELECT id, seller_id, quantity, unit_price_cents, seller_net_cents
            FROM order_items WHERE order_id = $1 ORDER BY created_at, id",
    )
    .bind(order_id)
    .fetch_all(conn)
    .await
}

/// Mark an order paid. Idempotent: re-applying changes nothing and appends no
/// event. Gateway ids are persisted only while still empty.
pub async fn mark_paid(
    conn: &mut PgConnection,
    order: &mut Order,
    payment_intent_id: &str,
    session_id: &str,
) -> Result<bool, sqlx::Error> {
    let payment_intent_id = payment_intent_id.trim();
    let session_id = session_id.trim();

    if !session_id.is_empty() && order.stripe_session_id.is_empty() {
        order.stripe_session_id = session_id.to_string();
    }
    if !payment_intent_id.is_empty() && order.stripe_payment_intent_id.is_empty() {
        order.stripe_payment_intent_id = payment_intent_id.to_string();
    }

    let changed = !order.is(OrderStatus::Paid);
    if changed {
        order.status = OrderStatus::Paid.as_db().to_string();
        if order.paid_at.is_none() {
            order.paid_at = Some(Utc::now());
        }
    }

    sqlx::query(
        "UPDATE orders SET status = $1, paid_at = COALESCE(paid_at, $2),
            stripe_session_id = $3, stripe_payment_intent_id = $4, updated_at = now()
            WHERE id = $5",
    )
    .bind(&order.status)
    .bind(order.paid_at)
    .bind(&order.stripe_session_id)
    .bind(&order.stripe_payment_intent_id)
    .bind(order.id)
    .execute(&mut *conn)
    .await?;

    if changed {
        let msg = if payment_intent_id == "FREE" {
            "Marked paid via FREE checkout".to_string()
        } else if !payment_intent_id.is_empty() {
            format!("Marked paid via payment intent {payment_intent_id}")
        } else {
            String::new()
        };
        order_events::append(conn, order.id, OrderEventType::Paid, &msg).await?;
    }

    Ok(changed)
}

/// Cancel a pending order. No-op once paid or terminal.
pub async fn mark_canceled(
    conn: &mut PgConnection,
    order: &mut Order,
    note: &str,
) -> Result<bool, sqlx::Error> {
    if order.is(OrderStatus::Paid) || order.is_terminal() {
        return Ok(false);
    }

    order.status = OrderStatus::Canceled.as_db().to_string();
    sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
        .bind(&order.status)
        .bind(order.id)
        .execute(&mut *conn)
        .await?;

    let msg = if note.trim().is_empty() {
        "Checkout canceled"
    } else {
        note.trim()
    };
    order_events::append(conn, order.id, OrderEventType::Canceled, msg).await?;
    Ok(true)
}

/// Advance the cumulative refunded total. Monotonic: the stored value only
/// ever moves up, so overlapping refund events cannot rewind it. Returns the
/// new cumulative total.
pub async fn record_refunded_total(
    conn: &mut PgConnection,
    order: &mut Order,
    observed_cumulative_cents: i64,
) -> Result<i64, sqlx::Error> {
    let new_total = order.refunded_total_cents.max(observed_cumulative_cents);
    if new_total != order.refunded_total_cents {
        sqlx::query("UPDATE orders SET refunded_total_cents = $1, updated_at = now() WHERE id = $2")
            .bind(new_total)
            .bind(order.id)
            .execute(conn)
            .await?;
        order.refunded_total_cents = new_total;
    }
    Ok(new_total)
}

/// Flip to refunded only once the cumulative refunded amount covers the order
/// total; below that, log a partial-refund warning and leave status alone.
pub async fn mark_refunded_if_fully_covered(
    conn: &mut PgConnection,
    order: &mut Order,
    refunded_total_cents: i64,
    note: &str,
) -> Result<bool, sqlx::Error> {
    if refunded_total_cents <= 0 {
        return Ok(false);
    }

    if order.total_cents > 0 && refunded_total_cents < order.total_cents {
        let msg = format!(
            "Partial refund observed ({refunded_total_cents}c of {}c). {note}",
            order.total_cents
        );
        order_events::append(conn, order.id, OrderEventType::Warning, &msg).await?;
        return Ok(false);
    }

    force_refunded(conn, order, note).await
}

/// Force status to refunded (chargeback lost, full refund). Idempotent.
pub async fn force_refunded(
    conn: &mut PgConnection,
    order: &mut Order,
    note: &str,
) -> Result<bool, sqlx::Error> {
    if order.is(OrderStatus::Refunded) {
        return Ok(false);
    }

    order.status = OrderStatus::Refunded.as_db().to_string();
    sqlx::query("UPDATE orders SET status = $1, updated_at = now() WHERE id = $2")
        .bind(&order.status)
        .bind(order.id)
        .execute(&mut *conn)
        .await?;

    order_events::append(conn, order.id, OrderEventType::Refunded, note).await?;
    Ok(true)
}

/// Persist the checkout session's shipping details onto the order.
pub async fn set_shipping(
    conn: &mut PgConnection,
    order_id: Uuid,
    snap: &ShippingSnapshot,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE orders SET shipping_name = $1, shipping_phone = $2, shipping_line1 = $3,
            shipping_line2 = $4, shipping_city = $5, shipping_state = $6,
            shipping_postal_code = $7, shipping_country = $8, updated_at = now()
            WHERE id = $9",
    )
    .bind(&snap.name)
    .bind(&snap.phone)
    .bind(&snap.line1)
    .bind(&snap.line2)
    .bind(&snap.city)
    .bind(&snap.state)
    .bind(&snap.postal_code)
    .bind(&snap.country)
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}
