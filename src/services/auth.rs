// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User-facing auth operations: request validation on top of the
//! [`SessionManager`].

use std::sync::Arc;

use chrono::NaiveDate;

use crate::auth::password::MIN_PASSWORD_LENGTH;
use crate::auth::{AuthError, AuthenticatedUser, Registration, SessionManager, TokenPair};
use crate::models::{
    LoginRequest, LoginResponse, RefreshRequest, RegisterRequest, TokenResponse, UserResponse,
};
use crate::storage::UserId;

const DOB_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct AuthService {
    sessions: Arc<SessionManager>,
}

impl AuthService {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<UserResponse, AuthError> {
        let registration = validate_registration(request)?;
        let user = self.sessions.register(registration).await?;
        Ok(user.into())
    }

    pub async fn login(&self, request: LoginRequest) -> Result<LoginResponse, AuthError> {
        let username = required("username", &request.username)?;
        if request.password.is_empty() {
            return Err(AuthError::MissingField("password"));
        }

        let outcome = self.sessions.login(username, &request.password).await?;
        Ok(LoginResponse {
            user: outcome.user.into(),
            tokens: token_response(outcome.tokens),
        })
    }

    pub async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.sessions.logout(user_id).await
    }

    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenResponse, AuthError> {
        let token = required("refresh_token", &request.refresh_token)?;
        let tokens = self.sessions.refresh(token).await?;
        Ok(token_response(tokens))
    }

    pub async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        self.sessions.authenticate(access_token).await
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<UserResponse, AuthError> {
        Ok(self.sessions.get_user(user_id).await?.into())
    }

    pub async fn cache_ready(&self) -> Result<(), AuthError> {
        self.sessions.cache_ready().await
    }

    pub async fn purge_expired_sessions(&self) -> Result<usize, AuthError> {
        self.sessions.purge_expired_sessions().await
    }
}

fn token_response(tokens: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: "Bearer".to_string(),
        access_token_expires_at: tokens.access_expires_at,
        refresh_token_expires_at: tokens.refresh_expires_at,
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, AuthError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AuthError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

/// Minimal shape check: one `@`, non-empty local part, dotted domain.
fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

fn validate_registration(request: RegisterRequest) -> Result<Registration, AuthError> {
    let username = required("username", &request.username)?.to_string();
    let email = required("email", &request.email)?.to_lowercase();
    let phone_number = required("phone_number", &request.phone_number)?.to_string();
    let address = required("address", &request.address)?.to_string();
    let dob = required("dob", &request.dob)?;
    if request.password.is_empty() {
        return Err(AuthError::MissingField("password"));
    }

    if !is_plausible_email(&email) {
        return Err(AuthError::InvalidEmail);
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    let dob = NaiveDate::parse_from_str(dob, DOB_FORMAT)
        .map_err(|_| AuthError::InvalidDobFormat(dob.to_string()))?;

    Ok(Registration {
        username,
        password: request.password,
        email,
        phone_number,
        address,
        dob,
    })
}
