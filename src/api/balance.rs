// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet balance endpoints.

use axum::{extract::State, Json};

use super::{ApiJson, ApiQuery};
use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{
        BalanceResponse, BalanceTransactionRequest, BalanceTransactionResponse, ListQuery,
        WalletTransactionResponse,
    },
    state::AppState,
};

/// Current wallet balance. Users without a wallet have balance 0.
#[utoipa::path(
    get,
    path = "/user/v1/balance",
    tag = "Balance",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 503, description = "Ledger store unavailable", body = ErrorBody)
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<BalanceResponse>, ApiError> {
    Ok(Json(state.balance.get_balance(user.user_id).await?))
}

/// Apply a CREDIT or DEBIT to the caller's wallet.
///
/// The wallet is created on the first CREDIT.
#[utoipa::path(
    post,
    path = "/user/v1/topup",
    tag = "Balance",
    security(("bearer" = [])),
    request_body = BalanceTransactionRequest,
    responses(
        (status = 200, description = "Balance adjusted", body = BalanceTransactionResponse),
        (status = 400, description = "Invalid amount, direction or reference", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 422, description = "Insufficient funds", body = ErrorBody),
        (status = 503, description = "Ledger store unavailable", body = ErrorBody)
    )
)]
pub async fn process_balance_transaction(
    State(state): State<AppState>,
    Auth(user): Auth,
    ApiJson(request): ApiJson<BalanceTransactionRequest>,
) -> Result<Json<BalanceTransactionResponse>, ApiError> {
    Ok(Json(state.balance.process(user.user_id, request).await?))
}

/// Wallet movements, newest first.
#[utoipa::path(
    get,
    path = "/user/v1/balance/history",
    tag = "Balance",
    security(("bearer" = [])),
    params(ListQuery),
    responses(
        (status = 200, description = "Wallet log", body = [WalletTransactionResponse]),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn history(
    State(state): State<AppState>,
    Auth(user): Auth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<WalletTransactionResponse>>, ApiError> {
    Ok(Json(
        state.balance.history(user.user_id, query.limit()).await?,
    ))
}
