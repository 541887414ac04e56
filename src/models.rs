// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. All types derive
//! `ToSchema` for the OpenAPI document.
//!
//! ## Money
//!
//! Amounts and balances are arbitrary-precision decimals. Responses render
//! them as JSON strings (`"100.50"`); requests accept either a string or a
//! JSON number.
//!
//! ## Model Categories
//!
//! - **Users**: registration, login, token refresh
//! - **Balance**: wallet balance, direct CREDIT/DEBIT, wallet history
//! - **Transactions**: top-up/purchase/refund lifecycle

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::{IntoParams, ToSchema};

use crate::storage::{
    Direction, Finalization, Metadata, StoredUser, Transaction, TransactionStatus,
    TransactionType, UserId, WalletTransaction,
};

// =============================================================================
// Amount Type
// =============================================================================

/// Longest amount text accepted before parsing.
const MAX_AMOUNT_TEXT_LEN: usize = 40;

/// Positive decimal amount as sent by clients.
///
/// Accepts `"12.50"` or `12.5`. Range checks happen in the ledger.
#[derive(Debug, Clone, PartialEq, ToSchema)]
#[schema(value_type = String, example = "100.00")]
pub struct Amount(pub BigDecimal);

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(serde_json::Number),
        }

        let text = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text,
            Raw::Number(number) => number.to_string(),
        };
        let text = text.trim();
        if text.len() > MAX_AMOUNT_TEXT_LEN {
            return Err(serde::de::Error::custom(format!(
                "amount is longer than {MAX_AMOUNT_TEXT_LEN} characters"
            )));
        }
        text.parse::<BigDecimal>()
            .map(Amount)
            .map_err(|e| serde::de::Error::custom(format!("invalid amount '{text}': {e}")))
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

// =============================================================================
// Pagination
// =============================================================================

pub const DEFAULT_PAGE_LIMIT: usize = 50;
pub const MAX_PAGE_LIMIT: usize = 200;

/// Query parameters of list endpoints.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Maximum number of rows, newest first (default 50, max 200).
    pub limit: Option<usize>,
}

impl ListQuery {
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT)
    }
}

// =============================================================================
// User Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    /// At least 6 characters.
    pub password: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    /// Date of birth, `YYYY-MM-DD`.
    #[schema(example = "1990-01-01")]
    pub dob: String,
}

/// Public user profile. Never carries the password hash.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    #[schema(value_type = String, example = "1990-01-01")]
    pub dob: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<StoredUser> for UserResponse {
    fn from(user: StoredUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            phone_number: user.phone_number,
            address: user.address,
            dob: user.dob,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    #[serde(flatten)]
    pub tokens: TokenResponse,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Always `Bearer`.
    pub token_type: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

// =============================================================================
// Balance Models
// =============================================================================

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceResponse {
    #[schema(value_type = String, example = "100.00")]
    pub balance: BigDecimal,
}

/// Direct balance movement (`POST /user/v1/topup`).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BalanceTransactionRequest {
    pub amount: Amount,
    /// `CREDIT` or `DEBIT`.
    #[schema(example = "CREDIT")]
    pub wallet_transaction_type: String,
    pub reference: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WalletTransactionResponse {
    pub id: u64,
    pub direction: Direction,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl From<WalletTransaction> for WalletTransactionResponse {
    fn from(entry: WalletTransaction) -> Self {
        Self {
            id: entry.id,
            direction: entry.direction,
            amount: entry.amount,
            reference: entry.reference,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BalanceTransactionResponse {
    #[schema(value_type = String)]
    pub balance: BigDecimal,
    pub wallet_transaction: WalletTransactionResponse,
}

// =============================================================================
// Transaction Models
// =============================================================================

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTransactionRequest {
    pub amount: Amount,
    /// `TOPUP`, `PURCHASE` or `REFUND`.
    #[schema(example = "PURCHASE")]
    pub transaction_type: String,
    /// Caller-chosen idempotency key, unique across all transactions.
    pub reference: String,
    #[serde(default)]
    pub description: String,
    /// Arbitrary key/value data stored with the transaction.
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateTransactionStatusRequest {
    pub reference: String,
    /// `SUCCESS`, `FAILED` or `REVERSED`.
    #[schema(example = "SUCCESS")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub id: u64,
    pub user_id: UserId,
    #[schema(value_type = String)]
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub reference: String,
    pub description: String,
    #[schema(value_type = Object)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self {
            id: tx.id,
            user_id: tx.user_id,
            amount: tx.amount,
            transaction_type: tx.transaction_type,
            status: tx.status,
            reference: tx.reference,
            description: tx.description,
            metadata: tx.metadata,
            created_at: tx.created_at,
            updated_at: tx.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpdateTransactionStatusResponse {
    pub transaction: TransactionResponse,
    /// `false` when the transaction already had the requested status.
    pub changed: bool,
    /// Wallet row written by a SUCCESS settlement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_transaction: Option<WalletTransactionResponse>,
}

impl From<Finalization> for UpdateTransactionStatusResponse {
    fn from(finalization: Finalization) -> Self {
        match finalization {
            Finalization::Applied { transaction, entry } => Self {
                transaction: transaction.into(),
                changed: true,
                wallet_transaction: entry.map(Into::into),
            },
            Finalization::Unchanged { transaction } => Self {
                transaction: transaction.into(),
                changed: false,
                wallet_transaction: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_accepts_strings_and_numbers() {
        let from_text: Amount = serde_json::from_str(r#""12.50""#).unwrap();
        let from_number: Amount = serde_json::from_str("12.5").unwrap();
        assert_eq!(from_text, from_number);

        let integer: Amount = serde_json::from_str("100").unwrap();
        assert_eq!(integer.0, BigDecimal::from(100));

        assert!(serde_json::from_str::<Amount>(r#""abc""#).is_err());
        assert!(serde_json::from_str::<Amount>("true").is_err());
        let padded = format!(r#""{}1""#, "0".repeat(MAX_AMOUNT_TEXT_LEN));
        assert!(serde_json::from_str::<Amount>(&padded).is_err());
        assert_eq!(serde_json::to_string(&integer).unwrap(), r#""100""#);
    }

    #[test]
    fn list_limit_is_clamped() {
        assert_eq!(ListQuery::default().limit(), DEFAULT_PAGE_LIMIT);
        assert_eq!(ListQuery { limit: Some(0) }.limit(), 1);
        assert_eq!(ListQuery { limit: Some(10_000) }.limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn user_response_omits_password_hash() {
        let user = StoredUser {
            id: 1,
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            phone_number: "0811".to_string(),
            address: "Jl. A".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            password_hash: "$argon2id$secret".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(UserResponse::from(user)).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("password").is_none());
        assert_eq!(json["dob"], "1990-01-01");
    }

    #[test]
    fn create_request_defaults_optional_fields() {
        let req: CreateTransactionRequest = serde_json::from_str(
            r#"{"amount": 50, "transaction_type": "PURCHASE", "reference": "ref-1"}"#,
        )
        .unwrap();
        assert_eq!(req.amount.0, BigDecimal::from(50));
        assert!(req.description.is_empty());
        assert!(req.metadata.is_empty());
    }
}
