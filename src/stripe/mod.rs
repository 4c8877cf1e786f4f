//! Stripe integration via REST API (no SDK dependency)

use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::error::DispatchError;

/// Maximum accepted age of a signed webhook payload, in seconds.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a Stripe webhook signature header (`t=...,v1=...`, HMAC-SHA256).
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    // Decode hex signature and use constant-time comparison via hmac::verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    // Reject stale events to prevent replay
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// A transfer to one seller's connected account.
pub struct TransferRequest<'a> {
    pub amount_cents: i64,
    pub currency: &'a str,
    pub destination_account: &'a str,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub payment_intent_id: &'a str,
    /// Charge to draw funds from, when known
    pub source_transaction: Option<&'a str>,
}

/// Create a Stripe Transfer to a connected account.
///
/// Idempotent at the gateway: keyed by (order, seller), so a retried delivery
/// that reaches this call again cannot move money twice.
pub async fn create_transfer(
    client: &reqwest::Client,
    secret_key: &str,
    req: &TransferRequest<'_>,
) -> Result<String, DispatchError> {
    let amount = req.amount_cents.to_string();
    let order_id = req.order_id.to_string();
    let seller_id = req.seller_id.to_string();

    let mut form: Vec<(&str, &str)> = vec![
        ("amount", &amount),
        ("currency", req.currency),
        ("destination", req.destination_account),
        ("transfer_group", &order_id),
        ("metadata[order_id]", &order_id),
        ("metadata[seller_id]", &seller_id),
        ("metadata[payment_intent_id]", req.payment_intent_id),
    ];
    if let Some(charge_id) = req.source_transaction {
        form.push(("source_transaction", charge_id));
    }

    let resp: serde_json::Value = client
        .post("https://api.stripe.com/v1/transfers")
        .basic_auth(secret_key, None::<&str>)
        .header(
            "Idempotency-Key",
            format!("transfer:{}:{}:v1", req.order_id, req.seller_id),
        )
        .form(&form)
        .send()
        .await
        .map_err(|e| DispatchError::Gateway(e.to_string()))?
        .json()
        .await
        .map_err(|e| DispatchError::Gateway(e.to_string()))?;

    resp["id"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| DispatchError::Gateway(format!("Stripe create_transfer failed: {resp}")))
}

/// Best-effort lookup of a payment intent's latest charge id.
///
/// Used as `source_transaction` on transfers; a failed lookup is not fatal.
pub async fn latest_charge(
    client: &reqwest::Client,
    secret_key: &str,
    payment_intent_id: &str,
) -> Option<String> {
    let resp: serde_json::Value = client
        .get(format!(
            "https://api.stripe.com/v1/payment_intents/{payment_intent_id}"
        ))
        .basic_auth(secret_key, None::<&str>)
        .send()
        .await
        .ok()?
        .json()
        .await
        .ok()?;

    resp["latest_charge"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(payload: &[u8], secret: &str, ts: i64) -> String {
        let signed = format!("{ts}.{}", std::str::from_utf8(payload).unwrap());
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        format!("t={ts},v1={sig}")
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1","type":"checkout.session.completed"}"#;
        let now = chrono::Utc::now().timestamp();
        let header = sign(payload, "whsec_test", now);
        assert!(verify_webhook_signature(payload, &header, "whsec_test").is_ok());
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = b"{}";
        let now = chrono::Utc::now().timestamp();
        let header = sign(payload, "whsec_a", now);
        assert!(verify_webhook_signature(payload, &header, "whsec_b").is_err());
    }

    #[test]
    fn rejects_tampered_payload() {
        let now = chrono::Utc::now().timestamp();
        let header = sign(b"{\"amount\":100}", "whsec_test", now);
        assert!(verify_webhook_signature(b"{\"amount\":999}", &header, "whsec_test").is_err());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = b"{}";
        let old = chrono::Utc::now().timestamp() - SIGNATURE_TOLERANCE_SECS - 10;
        let header = sign(payload, "whsec_test", old);
        assert_eq!(
            verify_webhook_signature(payload, &header, "whsec_test"),
            Err("Webhook timestamp too old")
        );
    }

    #[test]
    fn rejects_malformed_header() {
        assert!(verify_webhook_signature(b"{}", "", "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "t=123", "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "v1=abcd", "whsec_test").is_err());
        assert!(verify_webhook_signature(b"{}", "t=123,v1=zz", "whsec_test").is_err());
    }
}
