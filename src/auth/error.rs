// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication and registration errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::{CacheError, CreateUserError, DeadlineError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No authorization header present
    #[error("Authorization header is required")]
    MissingAuthHeader,

    #[error("Invalid authorization header format (expected 'Bearer <token>')")]
    InvalidAuthHeader,

    /// Malformed, wrongly signed, wrong token type, or not backed by a session
    #[error("Token is invalid")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    /// Refresh token unknown, consumed, or expired
    #[error("Refresh token is invalid or expired")]
    InvalidOrExpiredToken,

    /// Unknown username or wrong password; deliberately indistinguishable
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("No active session for this user")]
    SessionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("Username is already taken")]
    DuplicateUsername,

    #[error("Phone number is already registered")]
    DuplicatePhone,

    #[error("Field '{0}' is required")]
    MissingField(&'static str),

    #[error("Email address is malformed")]
    InvalidEmail,

    #[error("Password must be at least {min} characters long")]
    PasswordTooShort { min: usize },

    #[error("Invalid date of birth '{0}', expected YYYY-MM-DD")]
    InvalidDobFormat(String),

    #[error("Token cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Credential store unavailable: {0}")]
    Persistence(String),

    #[error("Internal authentication error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::InvalidToken => "invalid_token",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidOrExpiredToken => "invalid_or_expired_token",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::SessionNotFound => "session_not_found",
            AuthError::UserNotFound => "user_not_found",
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::DuplicateUsername => "duplicate_username",
            AuthError::DuplicatePhone => "duplicate_phone",
            AuthError::MissingField(_) => "missing_field",
            AuthError::InvalidEmail => "invalid_email",
            AuthError::PasswordTooShort { .. } => "password_too_short",
            AuthError::InvalidDobFormat(_) => "invalid_dob_format",
            AuthError::CacheUnavailable(_) => "cache_unavailable",
            AuthError::Persistence(_) => "persistence_failure",
            AuthError::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuthHeader
            | AuthError::InvalidAuthHeader
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidOrExpiredToken
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::SessionNotFound | AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::DuplicateEmail | AuthError::DuplicateUsername | AuthError::DuplicatePhone => {
                StatusCode::CONFLICT
            }
            AuthError::MissingField(_)
            | AuthError::InvalidEmail
            | AuthError::PasswordTooShort { .. }
            | AuthError::InvalidDobFormat(_) => StatusCode::BAD_REQUEST,
            AuthError::CacheUnavailable(_) | AuthError::Persistence(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Credential store failure");
        AuthError::Persistence(e.to_string())
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        tracing::error!(error = %e, "Token cache failure");
        AuthError::CacheUnavailable(e.to_string())
    }
}

impl From<CreateUserError> for AuthError {
    fn from(e: CreateUserError) -> Self {
        match e {
            CreateUserError::DuplicateEmail => AuthError::DuplicateEmail,
            CreateUserError::DuplicateUsername => AuthError::DuplicateUsername,
            CreateUserError::DuplicatePhone => AuthError::DuplicatePhone,
            CreateUserError::Store(e) => e.into(),
        }
    }
}

impl AuthError {
    /// A store call that did not finish in time.
    pub(crate) fn store_deadline(e: DeadlineError) -> Self {
        AuthError::Persistence(e.to_string())
    }

    /// A cache call that did not finish in time.
    pub(crate) fn cache_deadline(e: DeadlineError) -> Self {
        AuthError::CacheUnavailable(e.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
