// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Top-up, purchase and refund transactions.
//!
//! A transaction is created PENDING and moves the wallet only when it is
//! marked SUCCESS.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::{ApiJson, ApiQuery};
use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{
        CreateTransactionRequest, ListQuery, TransactionResponse, UpdateTransactionStatusRequest,
        UpdateTransactionStatusResponse,
    },
    state::AppState,
};

#[utoipa::path(
    post,
    path = "/user/v1/transactions",
    tag = "Transactions",
    security(("bearer" = [])),
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded as PENDING", body = TransactionResponse),
        (status = 400, description = "Invalid amount, type or reference", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 409, description = "Reference already used", body = ErrorBody)
    )
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Auth(user): Auth,
    ApiJson(request): ApiJson<CreateTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionResponse>), ApiError> {
    let created = state.transactions.initiate(user.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/user/v1/transactions",
    tag = "Transactions",
    security(("bearer" = [])),
    params(ListQuery),
    responses(
        (status = 200, description = "Transactions, newest first", body = [TransactionResponse]),
        (status = 401, description = "Unauthorized", body = ErrorBody)
    )
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Auth(user): Auth,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> Result<Json<Vec<TransactionResponse>>, ApiError> {
    Ok(Json(
        state.transactions.list(user.user_id, query.limit()).await?,
    ))
}

/// Finalize a PENDING transaction.
///
/// SUCCESS settles the wallet in the same commit as the status change.
/// Repeating the recorded status is a no-op.
#[utoipa::path(
    put,
    path = "/user/v1/transactions/status",
    tag = "Transactions",
    security(("bearer" = [])),
    request_body = UpdateTransactionStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = UpdateTransactionStatusResponse),
        (status = 400, description = "Invalid status", body = ErrorBody),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Transaction not found", body = ErrorBody),
        (status = 409, description = "Transaction already finalized with another status", body = ErrorBody),
        (status = 422, description = "Insufficient funds, transaction stays PENDING", body = ErrorBody)
    )
)]
pub async fn update_transaction_status(
    State(state): State<AppState>,
    Auth(user): Auth,
    ApiJson(request): ApiJson<UpdateTransactionStatusRequest>,
) -> Result<Json<UpdateTransactionStatusResponse>, ApiError> {
    Ok(Json(
        state.transactions.update_status(user.user_id, request).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/user/v1/transactions/{reference}",
    tag = "Transactions",
    security(("bearer" = [])),
    params(
        ("reference" = String, Path, description = "Transaction reference")
    ),
    responses(
        (status = 200, description = "Transaction", body = TransactionResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "Transaction not found", body = ErrorBody)
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Auth(user): Auth,
    Path(reference): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    Ok(Json(state.transactions.get(user.user_id, &reference).await?))
}
