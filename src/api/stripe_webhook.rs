//! Stripe webhook handler
//!
//! POST /stripe/webhook — ingests payment-processor events (raw body for
//! signature verification) and converts them into order transitions and
//! ledger entries.
//!
//! Response-code contract (this is what steers upstream retries):
//! - 400: missing or invalid signature; no delivery row
//! - 200: acknowledged — success, duplicate, unmappable event, missing order
//! - 500: transient processing failure only; the delivery row is marked
//!        `error` and the processor is expected to retry

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use crate::db::order_events::{self, OrderEventType};
use crate::db::orders::{self, ShippingSnapshot};
use crate::db::{deliveries, ledger, refunds};
use crate::error::DispatchError;
use crate::refund::{RefundItem, allocate_refund};
use crate::state::AppState;
use crate::{notify, payouts, stripe};

pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    // 1. Authenticity: reject at the boundary, before any durable record
    let sig_header = match headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
    {
        Some(s) => s,
        None => {
            tracing::warn!("Missing Stripe-Signature header");
            return StatusCode::BAD_REQUEST;
        }
    };

    if let Err(e) = stripe::verify_webhook_signature(&body, sig_header, &state.stripe_webhook_secret)
    {
        tracing::warn!(error = e, "Webhook signature verification failed");
        return StatusCode::BAD_REQUEST;
    }

    // Authentic but unparsable payloads cannot be deduplicated or processed;
    // acknowledge them like events without an id.
    let event: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%e, "Failed to parse webhook JSON");
            return StatusCode::OK;
        }
    };

    // 2. Events without id/type cannot be deduplicated or processed; ack and stop
    let event_id = event["id"].as_str().unwrap_or("").trim().to_string();
    let event_type = event["type"].as_str().unwrap_or("").trim().to_string();
    if event_id.is_empty() || event_type.is_empty() {
        tracing::warn!("Webhook event missing id or type");
        return StatusCode::OK;
    }

    let request_id = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    tracing::info!(event_id = %event_id, event_type = %event_type, "Received webhook");

    // 3. Idempotency boundary: first sighting wins, regardless of its outcome.
    //    A retry with the same event id never re-runs business logic.
    let recorded =
        match deliveries::record_delivery(&state.pool, &event_id, &event_type, &request_id).await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(%e, "DB error recording webhook delivery");
                return StatusCode::INTERNAL_SERVER_ERROR;
            }
        };

    if !recorded.is_first {
        tracing::info!(event_id = %event_id, "Duplicate webhook event, skipping");
        if let Err(e) = deliveries::mark_duplicate(&state.pool, &event_id).await {
            tracing::error!(%e, "Failed to mark delivery duplicate");
        }
        return StatusCode::OK;
    }

    let obj = event
        .get("data")
        .and_then(|d| d.get("object"))
        .cloned()
        .unwrap_or(serde_json::Value::Null);

    // 4. Resolve the target order; an unmappable event cannot become mappable
    //    later, so it is acknowledged rather than retried.
    let order_id = match resolve_order_id(&state, &event_type, &event, &obj).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!(%e, event_id = %event_id, "DB error resolving order");
            let _ = deliveries::mark_error(&state.pool, &event_id, &e.to_string()).await;
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    let Some(order_id) = order_id else {
        tracing::warn!(event_id = %event_id, event_type = %event_type, "No order mapping for event");
        if let Err(e) = deliveries::mark_processed(&state.pool, &event_id).await {
            tracing::error!(%e, "Failed to mark delivery processed");
        }
        return StatusCode::OK;
    };

    // 5. Dispatch inside one transaction holding the order's row lock
    match process_event(&state, order_id, &event_id, &event_type, &obj).await {
        Ok(()) => {
            if let Err(e) = deliveries::mark_processed(&state.pool, &event_id).await {
                tracing::error!(%e, "Failed to mark delivery processed");
            }
            StatusCode::OK
        }
        Err(e) => {
            // 6. Rolled back; record the failure and request an upstream retry
            tracing::error!(
                error = %e,
                event_id = %event_id,
                event_type = %event_type,
                order_id = %order_id,
                "Webhook processing failed"
            );
            if let Err(mark_err) =
                deliveries::mark_error(&state.pool, &event_id, &e.to_string()).await
            {
                tracing::error!(%mark_err, "Failed to mark delivery error");
            }
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Order id from event metadata, with a payment-intent fallback for failure
/// events (their payload carries no order metadata).
async fn resolve_order_id(
    state: &AppState,
    event_type: &str,
    event: &serde_json::Value,
    obj: &serde_json::Value,
) -> Result<Option<Uuid>, sqlx::Error> {
    if let Some(id) = order_id_from_event(event) {
        return Ok(Some(id));
    }

    if event_type == "payment_intent.payment_failed" {
        let payment_intent_id = obj["id"].as_str().unwrap_or("").trim();
        if !payment_intent_id.is_empty() {
            let mut conn = state.pool.acquire().await?;
            return orders::find_id_by_payment_intent(&mut conn, payment_intent_id).await;
        }
    }

    Ok(None)
}

/// Run one delivery's business logic inside a transaction that locks the
/// target order. Every `Err` out of here rolls the whole delivery back.
async fn process_event(
    state: &AppState,
    order_id: Uuid,
    event_id: &str,
    event_type: &str,
    obj: &serde_json::Value,
) -> Result<(), DispatchError> {
    let mut tx = state.pool.begin().await?;

    let Some(mut order) = orders::find_for_update(&mut *tx, order_id).await? else {
        // A retry cannot create a missing order; treat as already handled.
        tracing::warn!(order_id = %order_id, event_id = %event_id, "Order not found for event");
        return Ok(());
    };

    match event_type {
        "checkout.session.completed" => {
            handle_checkout_completed(state, &mut *tx, &mut order, obj).await?;
        }
        "checkout.session.expired" => {
            let changed =
                orders::mark_canceled(&mut *tx, &mut order, "Checkout session expired").await?;
            if changed {
                notify::order_canceled(state, order.id, "Checkout session expired");
            }
        }
        "payment_intent.payment_failed" => {
            order_events::append(
                &mut *tx,
                order.id,
                OrderEventType::Warning,
                &format!("Payment failed (event={event_id})"),
            )
            .await?;
            let reason = obj["last_payment_error"]["message"]
                .as_str()
                .unwrap_or("Payment failed");
            notify::payment_failed(state, order.id, reason);
        }
        "charge.refunded" | "refund.created" | "refund.updated" => {
            handle_refund(&mut *tx, &mut order, event_id, event_type, obj).await?;
        }
        "charge.dispute.created" | "charge.dispute.updated" => {
            let status = dispute_status(obj);
            order_events::append(
                &mut *tx,
                order.id,
                OrderEventType::Warning,
                &format!("Dispute event: {event_type} status={status} event={event_id}"),
            )
            .await?;
        }
        "charge.dispute.closed" => {
            handle_dispute_closed(&mut *tx, &mut order, event_id, obj).await?;
        }
        _ => {
            // Forward compatibility: unknown event types are acknowledged
            tracing::debug!(event_type = %event_type, "Unhandled webhook event type");
        }
    }

    tx.commit().await?;
    Ok(())
}

/// checkout.session.completed → paid order, SALE credits, transfers
async fn handle_checkout_completed(
    state: &AppState,
    tx: &mut sqlx::PgConnection,
    order: &mut orders::Order,
    obj: &serde_json::Value,
) -> Result<(), DispatchError> {
    let session_id = obj["id"].as_str().unwrap_or("").trim();
    let payment_intent_id = obj["payment_intent"].as_str().unwrap_or("").trim();

    let changed = orders::mark_paid(tx, order, payment_intent_id, session_id).await?;

    let shipping = extract_shipping(obj);
    if shipping.has_address() {
        orders::set_shipping(tx, order.id, &shipping).await?;
    }

    // SALE credits must exist before the payout math reads the balance
    let items = orders::items_for_order(tx, order.id).await?;
    let created = ledger::credit_sale(tx, order.id, &items).await?;
    if created > 0 {
        tracing::info!(order_id = %order.id, credits = created, "SALE ledger credits created");
    }

    payouts::create_transfers_for_paid_order(state, tx, order, &items, payment_intent_id).await?;

    if changed {
        notify::order_paid(state, order.id);
        tracing::info!(order_id = %order.id, "Order marked paid");
    }

    Ok(())
}

/// Refund observed at the gateway: bookkeep the cumulative total, debit the
/// newly-observed delta if payouts already went out, then gate the status.
///
/// One refund arrives through two event families (the charge's cumulative
/// snapshot and the individual refund object) with distinct event ids.
/// Recording each gateway refund id first and deriving the cumulative from
/// distinct refunds keeps either arrival order from counting a refund twice.
async fn handle_refund(
    tx: &mut sqlx::PgConnection,
    order: &mut orders::Order,
    event_id: &str,
    event_type: &str,
    obj: &serde_json::Value,
) -> Result<(), DispatchError> {
    let amount_cents = refund_amount_cents(event_type, obj);

    for (refund_id, refund_cents) in refund_entries(event_type, obj) {
        refunds::record(tx, order.id, &refund_id, refund_cents).await?;
    }
    let recorded_total = refunds::total_for_order(tx, order.id).await?;

    let observed = observed_cumulative_refund(event_type, amount_cents, recorded_total);

    let previous = order.refunded_total_cents;
    let cumulative = orders::record_refunded_total(tx, order, observed).await?;
    let delta = cumulative - previous;

    let payout_created = order_events::transfer_created_exists(tx, order.id).await?;

    if payout_created && delta > 0 {
        let items = orders::items_for_order(tx, order.id).await?;
        let refund_items: Vec<RefundItem> = items
            .iter()
            .map(|it| RefundItem {
                order_item_id: it.id,
                seller_id: it.seller_id,
                seller_net_cents: it.seller_net_cents,
            })
            .collect();

        let allocations = allocate_refund(&refund_items, delta);
        for a in &allocations {
            ledger::debit(
                tx,
                &ledger::Debit {
                    seller_id: a.seller_id,
                    order_id: Some(order.id),
                    order_item_id: Some(a.order_item_id),
                    amount_cents: a.debit_cents,
                    reason: ledger::Reason::Refund,
                    note: &format!("Gateway refund via {event_type} (event={event_id})"),
                },
            )
            .await?;
        }

        order_events::append(
            tx,
            order.id,
            OrderEventType::Warning,
            &format!(
                "Refund received after payout. Recorded seller debits \
                 (refund={delta}c, event={event_id}, type={event_type})."
            ),
        )
        .await?;
    } else {
        order_events::append(
            tx,
            order.id,
            OrderEventType::Warning,
            &format!(
                "Refund received (refund={amount_cents}c, type={event_type}, event={event_id}). \
                 No seller debits recorded (payout_created={payout_created})."
            ),
        )
        .await?;
    }

    orders::mark_refunded_if_fully_covered(
        tx,
        order,
        cumulative,
        &format!("Gateway refund observed ({event_type}, {cumulative}c, event={event_id})"),
    )
    .await?;

    Ok(())
}

/// charge.dispute.closed: a lost dispute claws back each line's full net and
/// forces the order to refunded; any other outcome is only audited.
async fn handle_dispute_closed(
    tx: &mut sqlx::PgConnection,
    order: &mut orders::Order,
    event_id: &str,
    obj: &serde_json::Value,
) -> Result<(), DispatchError> {
    let status = dispute_status(obj);

    if status != "lost" {
        order_events::append(
            tx,
            order.id,
            OrderEventType::Warning,
            &format!("Dispute closed with status={status} event={event_id}"),
        )
        .await?;
        return Ok(());
    }

    let payout_created = order_events::transfer_created_exists(tx, order.id).await?;

    if payout_created {
        let items = orders::items_for_order(tx, order.id).await?;
        for it in &items {
            if it.seller_net_cents <= 0 {
                continue;
            }
            ledger::debit(
                tx,
                &ledger::Debit {
                    seller_id: it.seller_id,
                    order_id: Some(order.id),
                    order_item_id: Some(it.id),
                    amount_cents: it.seller_net_cents,
                    reason: ledger::Reason::Chargeback,
                    note: &format!("Chargeback lost (event={event_id})"),
                },
            )
            .await?;
        }

        order_events::append(
            tx,
            order.id,
            OrderEventType::Warning,
            "Chargeback lost. Seller debited net (payout already created). \
             Dispute fee may require manual adjustment.",
        )
        .await?;
    } else {
        order_events::append(
            tx,
            order.id,
            OrderEventType::Warning,
            "Chargeback lost before payout. No seller debits recorded (no payout created).",
        )
        .await?;
    }

    orders::force_refunded(tx, order, "Chargeback lost").await?;
    Ok(())
}

/// Order id from metadata.order_id, falling back to client_reference_id
fn order_id_from_event(event: &serde_json::Value) -> Option<Uuid> {
    let obj = event.get("data")?.get("object")?;

    let from_metadata = obj["metadata"]["order_id"].as_str().map(str::trim);
    if let Some(id) = from_metadata.filter(|s| !s.is_empty()) {
        return Uuid::parse_str(id).ok();
    }

    let reference = obj["client_reference_id"].as_str().map(str::trim);
    reference
        .filter(|s| !s.is_empty())
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// The refund amount carried by this event, in cents.
fn refund_amount_cents(event_type: &str, obj: &serde_json::Value) -> i64 {
    let amount = if event_type == "charge.refunded" {
        obj["amount_refunded"].as_i64().or_else(|| obj["amount"].as_i64())
    } else {
        obj["amount"].as_i64()
    };
    amount.unwrap_or(0).max(0)
}

/// Gateway refund ids (with amounts) carried by this event.
///
/// charge.refunded lists its refunds on the charge object; refund events are
/// a single refund object. Both families name the same refund by the same
/// id, which is what makes the recorded set collapse them.
fn refund_entries(event_type: &str, obj: &serde_json::Value) -> Vec<(String, i64)> {
    if event_type == "charge.refunded" {
        obj["refunds"]["data"]
            .as_array()
            .map(|listed| {
                listed
                    .iter()
                    .filter_map(|r| {
                        let id = r["id"].as_str()?.trim();
                        (!id.is_empty())
                            .then(|| (id.to_string(), r["amount"].as_i64().unwrap_or(0).max(0)))
                    })
                    .collect()
            })
            .unwrap_or_default()
    } else {
        obj["id"]
            .as_str()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(|id| vec![(id.to_string(), refund_amount_cents(event_type, obj))])
            .unwrap_or_default()
    }
}

/// Map an event to a cumulative refunded-to-date figure.
///
/// charge.refunded carries an authoritative `amount_refunded`, which can run
/// ahead of the recorded set (its refund list may be absent). Refund events
/// contribute only through the recorded set of distinct refunds, never on
/// top of a total that may already include them. The caller's monotonic
/// stored value absorbs anything that transiently reads lower.
fn observed_cumulative_refund(event_type: &str, amount_cents: i64, recorded_total_cents: i64) -> i64 {
    if event_type == "charge.refunded" {
        amount_cents.max(recorded_total_cents)
    } else {
        recorded_total_cents
    }
}

fn dispute_status(obj: &serde_json::Value) -> String {
    let status = obj["status"].as_str().unwrap_or("").trim().to_lowercase();
    if status.is_empty() {
        "unknown".to_string()
    } else {
        status
    }
}

/// Shipping snapshot from a checkout session object, preferring the
/// dedicated shipping details over the customer's billing details.
fn extract_shipping(obj: &serde_json::Value) -> ShippingSnapshot {
    let shipping = &obj["shipping_details"];
    let customer = &obj["customer_details"];

    let addr = if shipping["address"].is_object() {
        &shipping["address"]
    } else {
        &customer["address"]
    };

    let text = |v: &serde_json::Value| v.as_str().unwrap_or("").to_string();

    ShippingSnapshot {
        name: if shipping["name"].as_str().is_some_and(|s| !s.is_empty()) {
            text(&shipping["name"])
        } else {
            text(&customer["name"])
        },
        phone: text(&customer["phone"]),
        line1: text(&addr["line1"]),
        line2: text(&addr["line2"]),
        city: text(&addr["city"]),
        state: text(&addr["state"]),
        postal_code: text(&addr["postal_code"]),
        country: text(&addr["country"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_prefers_metadata_over_reference() {
        let meta_id = Uuid::new_v4();
        let ref_id = Uuid::new_v4();
        let event = serde_json::json!({
            "data": { "object": {
                "metadata": { "order_id": meta_id.to_string() },
                "client_reference_id": ref_id.to_string(),
            }}
        });
        assert_eq!(order_id_from_event(&event), Some(meta_id));
    }

    #[test]
    fn order_id_falls_back_to_client_reference() {
        let ref_id = Uuid::new_v4();
        let event = serde_json::json!({
            "data": { "object": {
                "metadata": {},
                "client_reference_id": ref_id.to_string(),
            }}
        });
        assert_eq!(order_id_from_event(&event), Some(ref_id));
    }

    #[test]
    fn order_id_missing_or_malformed_is_none() {
        let event = serde_json::json!({ "data": { "object": {} } });
        assert_eq!(order_id_from_event(&event), None);

        let event = serde_json::json!({
            "data": { "object": { "metadata": { "order_id": "not-a-uuid" } } }
        });
        assert_eq!(order_id_from_event(&event), None);

        assert_eq!(order_id_from_event(&serde_json::json!({})), None);
    }

    #[test]
    fn refund_amount_uses_cumulative_field_for_charge_refunded() {
        let obj = serde_json::json!({ "amount_refunded": 4000, "amount": 10000 });
        assert_eq!(refund_amount_cents("charge.refunded", &obj), 4000);
        assert_eq!(refund_amount_cents("refund.created", &obj), 10000);
    }

    #[test]
    fn refund_amount_never_negative() {
        let obj = serde_json::json!({ "amount": -500 });
        assert_eq!(refund_amount_cents("refund.created", &obj), 0);
        assert_eq!(refund_amount_cents("refund.created", &serde_json::json!({})), 0);
    }

    #[test]
    fn cumulative_refund_derives_from_distinct_refunds() {
        // charge.refunded is authoritative and may run ahead of the recorded set
        assert_eq!(observed_cumulative_refund("charge.refunded", 7000, 4000), 7000);
        assert_eq!(observed_cumulative_refund("charge.refunded", 4000, 7000), 7000);
        // refund events contribute only through the recorded distinct refunds
        assert_eq!(observed_cumulative_refund("refund.created", 3000, 7000), 7000);
        assert_eq!(observed_cumulative_refund("refund.updated", 1000, 1000), 1000);
    }

    #[test]
    fn refund_entries_named_by_the_same_id_across_event_families() {
        // the charge's cumulative snapshot lists the refund...
        let charge = serde_json::json!({
            "amount_refunded": 4000,
            "refunds": { "data": [ { "id": "re_1", "amount": 4000 } ] }
        });
        assert_eq!(
            refund_entries("charge.refunded", &charge),
            vec![("re_1".to_string(), 4000)]
        );
        // ...and the individual refund event names the same id, so the
        // recorded set collapses the pair to one refund
        let refund = serde_json::json!({ "id": "re_1", "amount": 4000 });
        assert_eq!(
            refund_entries("refund.created", &refund),
            vec![("re_1".to_string(), 4000)]
        );
    }

    #[test]
    fn refund_entries_skip_missing_ids_and_negative_amounts() {
        let charge = serde_json::json!({
            "refunds": { "data": [
                { "id": "re_1", "amount": -200 },
                { "amount": 300 },
                { "id": "", "amount": 400 },
                { "id": "re_2", "amount": 500 },
            ]}
        });
        assert_eq!(
            refund_entries("charge.refunded", &charge),
            vec![("re_1".to_string(), 0), ("re_2".to_string(), 500)]
        );
        assert!(refund_entries("charge.refunded", &serde_json::json!({})).is_empty());
        assert!(refund_entries("refund.created", &serde_json::json!({ "amount": 100 })).is_empty());
    }

    /// Replays the insert-first semantics of the order_refunds table: an id
    /// is counted on first sighting only.
    struct RecordedRefunds {
        seen: std::collections::BTreeSet<String>,
        total: i64,
    }

    impl RecordedRefunds {
        fn new() -> Self {
            Self {
                seen: std::collections::BTreeSet::new(),
                total: 0,
            }
        }

        fn record_all(&mut self, entries: Vec<(String, i64)>) {
            for (id, amount) in entries {
                if self.seen.insert(id) {
                    self.total += amount;
                }
            }
        }
    }

    #[test]
    fn one_refund_seen_through_both_families_counts_once() {
        // charge.refunded first: 4000c lands in the recorded set and becomes
        // the cumulative; the matching refund.created dedups on re_1, the
        // cumulative stays 4000 and no second delta is debited
        let charge = serde_json::json!({
            "amount_refunded": 4000,
            "refunds": { "data": [ { "id": "re_1", "amount": 4000 } ] }
        });
        let refund = serde_json::json!({ "id": "re_1", "amount": 4000 });

        let mut recorded = RecordedRefunds::new();
        recorded.record_all(refund_entries("charge.refunded", &charge));
        let stored = observed_cumulative_refund("charge.refunded", 4000, recorded.total);
        assert_eq!(stored, 4000);

        recorded.record_all(refund_entries("refund.created", &refund));
        let observed = observed_cumulative_refund("refund.created", 4000, recorded.total);
        assert_eq!(observed, 4000, "same refund counted twice");
        assert_eq!(stored.max(observed) - stored, 0);
    }

    #[test]
    fn one_refund_seen_through_both_families_counts_once_reverse_order() {
        // refund.created first: recorded set gains re_1, cumulative 4000;
        // the later charge.refunded snapshot agrees and adds nothing
        let charge = serde_json::json!({
            "amount_refunded": 4000,
            "refunds": { "data": [ { "id": "re_1", "amount": 4000 } ] }
        });
        let refund = serde_json::json!({ "id": "re_1", "amount": 4000 });

        let mut recorded = RecordedRefunds::new();
        recorded.record_all(refund_entries("refund.created", &refund));
        let stored = observed_cumulative_refund("refund.created", 4000, recorded.total);
        assert_eq!(stored, 4000);

        recorded.record_all(refund_entries("charge.refunded", &charge));
        let observed = observed_cumulative_refund("charge.refunded", 4000, recorded.total);
        assert_eq!(stored.max(observed) - stored, 0, "same refund counted twice");
    }

    #[test]
    fn two_partial_refunds_accumulate_across_families() {
        let mut recorded = RecordedRefunds::new();

        recorded.record_all(refund_entries(
            "refund.created",
            &serde_json::json!({ "id": "re_1", "amount": 2000 }),
        ));
        assert_eq!(
            observed_cumulative_refund("refund.created", 2000, recorded.total),
            2000
        );

        // second refund arrives via the charge snapshot listing both
        recorded.record_all(refund_entries(
            "charge.refunded",
            &serde_json::json!({
                "amount_refunded": 4000,
                "refunds": { "data": [
                    { "id": "re_1", "amount": 2000 },
                    { "id": "re_2", "amount": 2000 },
                ]}
            }),
        ));
        assert_eq!(
            observed_cumulative_refund("charge.refunded", 4000, recorded.total),
            4000
        );
        assert_eq!(recorded.total, 4000);
    }

    #[test]
    fn dispute_status_defaults_to_unknown() {
        assert_eq!(dispute_status(&serde_json::json!({})), "unknown");
        assert_eq!(dispute_status(&serde_json::json!({ "status": "" })), "unknown");
        assert_eq!(dispute_status(&serde_json::json!({ "status": "LOST" })), "lost");
        assert_eq!(
            dispute_status(&serde_json::json!({ "status": "warning_closed" })),
            "warning_closed"
        );
    }

    #[test]
    fn shipping_prefers_shipping_details() {
        let obj = serde_json::json!({
            "shipping_details": {
                "name": "Ada Lovelace",
                "address": {
                    "line1": "1 Analytical Way",
                    "city": "London",
                    "postal_code": "N1 9GU",
                    "country": "GB"
                }
            },
            "customer_details": {
                "name": "Billing Name",
                "phone": "+44 20 0000 0000",
                "address": { "line1": "2 Billing Rd" }
            }
        });
        let snap = extract_shipping(&obj);
        assert_eq!(snap.name, "Ada Lovelace");
        assert_eq!(snap.line1, "1 Analytical Way");
        assert_eq!(snap.phone, "+44 20 0000 0000");
        assert_eq!(snap.country, "GB");
        assert!(snap.has_address());
    }

    #[test]
    fn shipping_falls_back_to_customer_details() {
        let obj = serde_json::json!({
            "customer_details": {
                "name": "Grace Hopper",
                "address": { "line1": "3 Compiler Ct", "city": "Arlington", "country": "US" }
            }
        });
        let snap = extract_shipping(&obj);
        assert_eq!(snap.name, "Grace Hopper");
        assert_eq!(snap.city, "Arlington");
        assert!(snap.has_address());
    }

    #[test]
    fn shipping_empty_session_has_no_address() {
        let snap = extract_shipping(&serde_json::json!({}));
        assert!(!snap.has_address());
    }
}
