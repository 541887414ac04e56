// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JWT claims and authenticated user representation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::storage::UserId;

/// `typ` claim of access tokens.
pub const ACCESS_TOKEN_TYPE: &str = "access";
/// `typ` claim of refresh tokens.
pub const REFRESH_TOKEN_TYPE: &str = "refresh";

/// Claims embedded in every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject -- the user's internal id.
    pub sub: UserId,
    pub username: String,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
    /// Unique token id, so two tokens minted in the same second differ.
    pub jti: String,
}

/// Claims embedded in every refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Authenticated user information extracted from a verified access token.
///
/// This is the type handlers receive from the [`Auth`](super::Auth)
/// extractor.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub username: String,

    /// Token expiration (Unix timestamp, not serialized)
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthenticatedUser {
    pub fn from_claims(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            username: claims.username,
            expires_at: claims.exp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_claims_copies_identity() {
        let user = AuthenticatedUser::from_claims(AccessClaims {
            sub: 12,
            username: "alice".to_string(),
            typ: ACCESS_TOKEN_TYPE.to_string(),
            iat: 1_700_000_000,
            exp: 1_700_003_600,
            jti: "j".to_string(),
        });
        assert_eq!(user.user_id, 12);
        assert_eq!(user.username, "alice");
        assert_eq!(user.expires_at, 1_700_003_600);
    }

    #[test]
    fn access_claims_need_username() {
        let refresh = serde_json::json!({
            "sub": 1, "typ": "refresh", "iat": 0, "exp": 1, "jti": "x"
        });
        assert!(serde_json::from_value::<AccessClaims>(refresh).is_err());
    }
}
