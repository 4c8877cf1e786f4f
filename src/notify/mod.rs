//! Notification collaborator client.
//!
//! Fire-and-forget: every send is spawned onto the runtime so it can never
//! extend the order lock or fail a webhook transaction. Delivery failures are
//! logged for operators and otherwise dropped.

use uuid::Uuid;

use crate::state::AppState;

fn spawn_send(state: &AppState, kind: &'static str, body: serde_json::Value) {
    let Some(base_url) = state.notify_base_url.clone() else {
        tracing::debug!(kind = kind, "Notification skipped (NOTIFY_BASE_URL unset)");
        return;
    };
    let client = state.http.clone();

    tokio::spawn(async move {
        let url = format!("{}/api/notifications/{kind}", base_url.trim_end_matches('/'));
        match client.post(&url).json(&body).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => {
                tracing::warn!(kind = kind, status = %resp.status(), "Notification rejected");
            }
            Err(e) => {
                tracing::warn!(kind = kind, error = %e, "Notification delivery failed");
            }
        }
    });
}

/// Buyer confirmation after an order transitions to paid.
pub fn order_paid(state: &AppState, order_id: Uuid) {
    spawn_send(state, "order-paid", serde_json::json!({ "order_id": order_id }));
}

/// Buyer notice after a checkout session expires.
pub fn order_canceled(state: &AppState, order_id: Uuid, note: &str) {
    spawn_send(
        state,
        "order-canceled",
        serde_json::json!({ "order_id": order_id, "note": note }),
    );
}

/// Buyer notice after a failed payment attempt.
pub fn payment_failed(state: &AppState, order_id: Uuid, reason: &str) {
    spawn_send(
        state,
        "payment-failed",
        serde_json::json!({ "order_id": order_id, "reason": reason }),
    );
}

/// Seller notice after a transfer was sent.
pub fn payout_sent(
    state: &AppState,
    order_id: Uuid,
    seller_id: Uuid,
    payout_cents: i64,
    transfer_id: &str,
) {
    spawn_send(
        state,
        "payout-sent",
        serde_json::json!({
            "order_id": order_id,
            "seller_id": seller_id,
            "payout_cents": payout_cents,
            "transfer_id": transfer_id,
        }),
    );
}
