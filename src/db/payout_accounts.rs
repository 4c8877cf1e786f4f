//! Seller gateway payout-account snapshot.
//!
//! Populated by the (external) seller onboarding flow; read here only to
//! decide whether a transfer can be attempted for a seller.

use sqlx::PgConnection;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct PayoutAccount {
    pub seller_id: Uuid,
    pub stripe_account_id: String,
    pub details_submitted: bool,
    pub charges_enabled: bool,
    pub payouts_enabled: bool,
}

impl PayoutAccount {
    /// Seller can receive transfers
    pub fn is_ready(&self) -> bool {
        !self.stripe_account_id.is_empty()
            && self.details_submitted
            && self.charges_enabled
            && self.payouts_enabled
    }
}

pub async fn find(
    conn: &mut PgConnection,
    seller_id: Uuid,
) -> Result<Option<PayoutAccount>, sqlx::Error> {
    sqlx::query_as::<_, PayoutAccount>(
        "SELECT seller_id, stripe_account_id, details_submitted, charges_enabled, payouts_enabled
            FROM seller_payout_accounts WHERE seller_id = $1",
    )
    .bind(seller_id)
    .fetch_optional(conn)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_requires_all_flags() {
        let mut acct = PayoutAccount {
            seller_id: Uuid::new_v4(),
            stripe_account_id: "acct_123".into(),
            details_submitted: true,
            charges_enabled: true,
            payouts_enabled: true,
        };
        assert!(acct.is_ready());

        acct.payouts_enabled = false;
        assert!(!acct.is_ready());

        acct.payouts_enabled = true;
        acct.stripe_account_id.clear();
        assert!(!acct.is_ready());
    }
}
