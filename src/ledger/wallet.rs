// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet ledger: the only component that moves a balance.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use bigdecimal::{BigDecimal, Zero};

use super::amount::amount_in_range;
use crate::storage::{
    run_blocking, AdjustError, Adjustment, AdjustmentReceipt, DeadlineError, Direction,
    StoreError, UserId, WalletStore, WalletTransaction,
};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero with at most 18 integer digits and 8 decimal places")]
    InvalidAmount,

    #[error("invalid direction '{0}', expected CREDIT or DEBIT")]
    InvalidDirection(String),

    #[error("reference must not be empty")]
    MissingReference,

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: BigDecimal,
        requested: BigDecimal,
    },

    #[error("ledger store unavailable: {0}")]
    Persistence(String),
}

impl LedgerError {
    pub fn error_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidAmount => "invalid_amount",
            LedgerError::InvalidDirection(_) => "invalid_direction",
            LedgerError::MissingReference => "missing_reference",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::Persistence(_) => "persistence_failure",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LedgerError::InvalidAmount
            | LedgerError::InvalidDirection(_)
            | LedgerError::MissingReference => StatusCode::BAD_REQUEST,
            LedgerError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            LedgerError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Ledger store failure");
        LedgerError::Persistence(e.to_string())
    }
}

impl From<DeadlineError> for LedgerError {
    fn from(e: DeadlineError) -> Self {
        LedgerError::Persistence(e.to_string())
    }
}

impl From<AdjustError> for LedgerError {
    fn from(e: AdjustError) -> Self {
        match e {
            AdjustError::InsufficientFunds(e) => LedgerError::InsufficientFunds {
                balance: e.balance,
                requested: e.requested,
            },
            AdjustError::Store(e) => e.into(),
        }
    }
}

/// Parse a wire direction, rejecting anything but `CREDIT`/`DEBIT`.
pub fn parse_direction(raw: &str) -> Result<Direction, LedgerError> {
    raw.parse().map_err(LedgerError::InvalidDirection)
}

/// Async facade over a [`WalletStore`], bounding each store call.
#[derive(Clone)]
pub struct WalletLedger {
    store: Arc<dyn WalletStore>,
    timeout: Duration,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn WalletStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Current balance; a user without a wallet has balance 0.
    pub async fn get_balance(&self, user_id: UserId) -> Result<BigDecimal, LedgerError> {
        let store = self.store.clone();
        let wallet = run_blocking(self.timeout, "wallet.find", move || store.find_wallet(user_id))
            .await??;
        Ok(wallet.map(|w| w.balance).unwrap_or_else(BigDecimal::zero))
    }

    /// Apply one CREDIT or DEBIT, creating the wallet on first use.
    ///
    /// Balance update and log append commit together. A DEBIT larger than
    /// the balance fails with [`LedgerError::InsufficientFunds`] and writes
    /// nothing.
    pub async fn adjust_balance(
        &self,
        user_id: UserId,
        amount: BigDecimal,
        direction: Direction,
        reference: &str,
    ) -> Result<AdjustmentReceipt, LedgerError> {
        if !amount_in_range(&amount) {
            return Err(LedgerError::InvalidAmount);
        }
        if reference.trim().is_empty() {
            return Err(LedgerError::MissingReference);
        }

        let adjustment = Adjustment {
            user_id,
            amount,
            direction,
            reference: reference.to_string(),
        };
        let store = self.store.clone();
        let outcome = run_blocking(self.timeout, "wallet.adjust", move || {
            store.adjust(&adjustment)
        })
        .await?;

        match outcome {
            Ok(receipt) => {
                tracing::info!(
                    user_id,
                    direction = %direction,
                    amount = %receipt.entry.amount,
                    reference,
                    balance = %receipt.wallet.balance,
                    "Balance adjusted"
                );
                Ok(receipt)
            }
            Err(AdjustError::InsufficientFunds(e)) => {
                tracing::warn!(
                    user_id,
                    reference,
                    balance = %e.balance,
                    requested = %e.requested,
                    "Debit rejected: insufficient funds"
                );
                Err(AdjustError::InsufficientFunds(e).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Newest-first wallet log rows; empty when the user has no wallet.
    pub async fn list_entries(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<WalletTransaction>, LedgerError> {
        let store = self.store.clone();
        let entries = run_blocking(self.timeout, "wallet.list", move || {
            store.list_entries(user_id, limit)
        })
        .await??;
        Ok(entries)
    }
}
