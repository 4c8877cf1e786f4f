//! Read-only seller ledger reporting.
//!
//! The balance is a plain sum over the append-only ledger; nothing in the
//! payment core makes decisions off this endpoint.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::db::ledger;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(serde::Deserialize)]
pub struct BalanceQuery {
    pub limit: Option<i64>,
}

#[derive(serde::Serialize)]
pub struct BalanceResponse {
    pub seller_id: Uuid,
    /// Signed: positive = platform owes seller, negative = seller owes platform
    pub balance_cents: i64,
    pub entries: Vec<ledger::LedgerEntry>,
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Query(query): Query<BalanceQuery>,
) -> Result<Json<BalanceResponse>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut conn = state.pool.acquire().await.map_err(|e| {
        tracing::error!(error = %e, "DB error acquiring connection");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let balance_cents = ledger::balance(&mut conn, seller_id).await.map_err(|e| {
        tracing::error!(error = %e, seller_id = %seller_id, "DB error computing balance");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let entries = ledger::entries_for_seller(&mut conn, seller_id, limit)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, seller_id = %seller_id, "DB error loading ledger entries");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(BalanceResponse {
        seller_id,
        balance_cents,
        entries,
    }))
}
