//! Database access layer

pub mod deliveries;
pub mod ledger;
pub mod order_events;
pub mod orders;
pub mod payout_accounts;
pub mod refunds;
