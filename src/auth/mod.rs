// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Username/password accounts with HS256 bearer tokens.
//!
//! ## Auth Flow
//!
//! 1. `POST /user/v1/login` verifies the Argon2id password hash and returns
//!    an access token and a refresh token
//! 2. Clients send `Authorization: Bearer <access token>`
//! 3. The [`Auth`] extractor verifies signature, expiry and token type, then
//!    requires the token to match the cached session or a live durable one
//! 4. `POST /user/v1/refresh` consumes the refresh token and returns a new pair
//!
//! ## Lifetimes
//!
//! - Access token: `ACCESS_TOKEN_TTL_SECS` (default one hour)
//! - Refresh token: 24 × the access lifetime

pub mod claims;
pub mod error;
pub mod extractor;
pub mod password;
pub mod session;
pub mod tokens;

pub use claims::AuthenticatedUser;
pub use error::AuthError;
pub use extractor::Auth;
pub use session::{LoginOutcome, Registration, SessionManager};
pub use tokens::{TokenIssuer, TokenPair};
