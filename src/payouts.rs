//! Transfer orchestration for paid orders.
//!
//! Runs inside the dispatcher's transaction, after the SALE ledger credits
//! exist. The transfer_created order event is the idempotency flag: once any
//! transfer was recorded for an order, the whole routine is a no-op, and the
//! same flag is what later gates refund/chargeback debits.
//!
//! The gateway call itself executes while the order lock is held; it is
//! idempotent at the gateway (keyed per order and seller), so a retried
//! delivery cannot move money twice.

use uuid::Uuid;

use crate::db::order_events::{self, OrderEventType};
use crate::db::orders::{Order, OrderItem};
use crate::db::{ledger, payout_accounts};
use crate::error::DispatchError;
use crate::state::AppState;
use crate::{notify, stripe};

/// Latest-charge lookup shared across an order's transfers: fetched at most
/// once, and only when a payable seller actually needs a source transaction.
/// A failed lookup is cached too; it is best-effort either way.
struct CachedCharge(Option<Option<String>>);

impl CachedCharge {
    fn new() -> Self {
        Self(None)
    }

    async fn get<F, Fut>(&mut self, fetch: F) -> Option<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Option<String>>,
    {
        if self.0.is_none() {
            self.0 = Some(fetch().await);
        }
        self.0.clone().flatten()
    }
}

/// Create gateway transfers for a paid order and record the matching -PAYOUT
/// ledger entries.
///
/// Per seller: payout = max(0, balance), where the balance already includes
/// this order's +SALE credit. A negative carried balance (prior refunds or
/// chargebacks) reduces the payout and is carried forward; the seller is
/// never overpaid.
pub async fn create_transfers_for_paid_order(
    state: &AppState,
    conn: &mut sqlx::PgConnection,
    order: &Order,
    items: &[OrderItem],
    payment_intent_id: &str,
) -> Result<(), DispatchError> {
    let payment_intent_id = payment_intent_id.trim();
    if payment_intent_id.is_empty() || payment_intent_id == "FREE" {
        return Ok(());
    }

    if order_events::transfer_created_exists(conn, order.id).await? {
        return Ok(());
    }

    // Deferred until the first payable seller: the lookup is an external call
    // made while the order lock is held, and many deliveries skip every seller.
    let mut charge_id = CachedCharge::new();

    let mut gross_by_seller: std::collections::BTreeMap<Uuid, i64> = std::collections::BTreeMap::new();
    for it in items {
        *gross_by_seller.entry(it.seller_id).or_default() += it.line_total_cents();
    }

    for (seller_id, net_cents) in ledger::net_totals_by_seller(items) {
        let gross_cents = gross_by_seller.get(&seller_id).copied().unwrap_or(0);
        if gross_cents <= 0 || net_cents <= 0 {
            continue;
        }

        let account = payout_accounts::find(conn, seller_id).await?;
        let Some(account) = account.filter(|a| a.is_ready()) else {
            order_events::append(
                conn,
                order.id,
                OrderEventType::Warning,
                &format!("transfer skipped seller={seller_id} (not ready)"),
            )
            .await?;
            continue;
        };

        let balance_cents = ledger::balance(conn, seller_id).await?;
        let payout_cents = balance_cents.max(0);

        if payout_cents <= 0 {
            order_events::append(
                conn,
                order.id,
                OrderEventType::Warning,
                &format!("transfer skipped seller={seller_id} (balance={balance_cents})"),
            )
            .await?;
            continue;
        }

        let source_transaction = charge_id
            .get(|| stripe::latest_charge(&state.http, &state.stripe_secret_key, payment_intent_id))
            .await;

        let transfer_id = stripe::create_transfer(
            &state.http,
            &state.stripe_secret_key,
            &stripe::TransferRequest {
                amount_cents: payout_cents,
                currency: &order.currency,
                destination_account: &account.stripe_account_id,
                order_id: order.id,
                seller_id,
                payment_intent_id,
                source_transaction: source_transaction.as_deref(),
            },
        )
        .await?;

        ledger::debit(
            conn,
            &ledger::Debit {
                seller_id,
                order_id: Some(order.id),
                order_item_id: None,
                amount_cents: payout_cents,
                reason: ledger::Reason::Payout,
                note: &format!("Gateway transfer {transfer_id}"),
            },
        )
        .await?;

        order_events::append(
            conn,
            order.id,
            OrderEventType::TransferCreated,
            &format!(
                "transfer={transfer_id} seller={seller_id} gross={gross_cents} \
                 net={net_cents} balance_before={balance_cents} payout={payout_cents}"
            ),
        )
        .await?;

        notify::payout_sent(state, order.id, seller_id, payout_cents, &transfer_id);

        tracing::info!(
            order_id = %order.id,
            seller_id = %seller_id,
            payout_cents,
            transfer_id = %transfer_id,
            "Transfer created"
        );
    }

    Ok(())
}
