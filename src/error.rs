//! Error taxonomy for webhook dispatch.
//!
//! Most webhook failure modes are recovered locally and acknowledged with 200
//! (bad mapping, duplicate delivery, missing order) — those are handled as
//! explicit early returns in the dispatcher, not as errors. `DispatchError`
//! covers only the transient failures that must surface as 500 so the
//! upstream processor retries.

/// Transient processing failure during webhook dispatch.
///
/// Raising this rolls back the delivery transaction; the delivery row is
/// marked `error` and the handler returns 500.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Database error inside the dispatch transaction
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    /// Payment gateway call failed (transfer creation)
    #[error("gateway error: {0}")]
    Gateway(String),
}
