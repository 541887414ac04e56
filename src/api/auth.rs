// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Registration, login, token refresh and logout endpoints.

use axum::{extract::State, http::StatusCode, Json};

use super::ApiJson;
use crate::{
    auth::Auth,
    error::{ApiError, ErrorBody},
    models::{
        LoginRequest, LoginResponse, MessageResponse, RefreshRequest, RegisterRequest,
        TokenResponse, UserResponse,
    },
    state::AppState,
};

/// Create an account.
#[utoipa::path(
    post,
    path = "/user/v1/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Missing field, malformed email or date, short password", body = ErrorBody),
        (status = 409, description = "Email, username or phone already registered", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.auth.register(request).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Exchange username and password for a token pair.
#[utoipa::path(
    post,
    path = "/user/v1/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    Ok(Json(state.auth.login(request).await?))
}

/// Rotate a refresh token. The presented token cannot be used again.
#[utoipa::path(
    post,
    path = "/user/v1/refresh",
    tag = "Users",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New token pair", body = TokenResponse),
        (status = 401, description = "Invalid or expired refresh token", body = ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RefreshRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(state.auth.refresh(request).await?))
}

/// End all sessions of the caller.
#[utoipa::path(
    post,
    path = "/user/v1/logout",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "No active session", body = ErrorBody),
        (status = 503, description = "Session store or cache unavailable", body = ErrorBody)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.logout(user.user_id).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

/// Profile of the caller.
#[utoipa::path(
    get,
    path = "/user/v1/me",
    tag = "Users",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorBody),
        (status = 404, description = "User no longer exists", body = ErrorBody)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(user): Auth,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(state.auth.get_user(user.user_id).await?))
}
