// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet balances and the append-only wallet transaction log.
//!
//! ## Invariants
//!
//! - One wallet per user (`wallets` is keyed by user id).
//! - `balance` equals the net sum of the wallet's log rows (CREDIT positive,
//!   DEBIT negative) and is never negative.
//! - Log rows are never updated or deleted.
//!
//! [`apply_adjustment`] is the only code path that mutates a balance. It runs
//! inside the caller's write transaction, so the balance write and the log
//! append commit together, and redb's single writer serialises concurrent
//! adjustments of the same wallet.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use redb::{ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::UserId;
use crate::storage::database::{
    counter, decode, encode, next_id, LedgerDatabase, StoreError, StoreResult, WALLETS,
    WALLET_TRANSACTIONS,
};

/// Direction of a balance movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Credit,
    Debit,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Credit => "CREDIT",
            Direction::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    /// The rejected input.
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREDIT" => Ok(Direction::Credit),
            "DEBIT" => Ok(Direction::Debit),
            other => Err(other.to_string()),
        }
    }
}

/// A user's wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub wallet_id: u64,
    pub user_id: UserId,
    pub balance: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One row of the append-only wallet log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: u64,
    pub wallet_id: u64,
    pub direction: Direction,
    pub amount: BigDecimal,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

/// A requested balance movement.
#[derive(Debug, Clone)]
pub struct Adjustment {
    pub user_id: UserId,
    pub amount: BigDecimal,
    pub direction: Direction,
    pub reference: String,
}

/// Result of a committed adjustment.
#[derive(Debug, Clone)]
pub struct AdjustmentReceipt {
    /// Wallet state after the adjustment.
    pub wallet: Wallet,
    /// The log row that was appended.
    pub entry: WalletTransaction,
}

/// A DEBIT larger than the current balance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("insufficient funds: balance {balance}, requested {requested}")]
pub struct InsufficientFunds {
    pub balance: BigDecimal,
    pub requested: BigDecimal,
}

#[derive(Debug, thiserror::Error)]
pub enum AdjustError {
    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Capability contract for the wallet ledger store.
pub trait WalletStore: Send + Sync {
    /// Read-only lookup; never creates a wallet.
    fn find_wallet(&self, user_id: UserId) -> StoreResult<Option<Wallet>>;

    /// Apply one adjustment atomically, creating the wallet on first use.
    fn adjust(&self, adjustment: &Adjustment) -> Result<AdjustmentReceipt, AdjustError>;

    /// Newest-first log rows of the user's wallet.
    fn list_entries(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<WalletTransaction>>;
}

/// Locate the user's wallet or create it, inside an open write transaction.
fn wallet_for_update(txn: &WriteTransaction, user_id: UserId) -> StoreResult<Wallet> {
    let existing = {
        let wallets = txn.open_table(WALLETS)?;
        let row = wallets.get(user_id)?;
        match row {
            Some(row) => Some(decode::<Wallet>(row.value())?),
            None => None,
        }
    };
    if let Some(wallet) = existing {
        return Ok(wallet);
    }

    let now = Utc::now();
    Ok(Wallet {
        wallet_id: next_id(txn, counter::WALLET)?,
        user_id,
        balance: BigDecimal::zero(),
        created_at: now,
        updated_at: now,
    })
}

/// Apply `adjustment` inside `txn`: locate-or-create the wallet, check and
/// update the balance, append the log row.
///
/// A rejected DEBIT returns `Ok(Err(_))` having written nothing that the
/// caller's abort will not undo.
pub(crate) fn apply_adjustment(
    txn: &WriteTransaction,
    adjustment: &Adjustment,
) -> StoreResult<Result<AdjustmentReceipt, InsufficientFunds>> {
    let mut wallet = wallet_for_update(txn, adjustment.user_id)?;

    let new_balance = match adjustment.direction {
        Direction::Credit => &wallet.balance + &adjustment.amount,
        Direction::Debit => {
            if wallet.balance < adjustment.amount {
                return Ok(Err(InsufficientFunds {
                    balance: wallet.balance,
                    requested: adjustment.amount.clone(),
                }));
            }
            &wallet.balance - &adjustment.amount
        }
    };

    let now = Utc::now();
    wallet.balance = new_balance;
    wallet.updated_at = now;

    let entry = WalletTransaction {
        id: next_id(txn, counter::WALLET_TX)?,
        wallet_id: wallet.wallet_id,
        direction: adjustment.direction,
        amount: adjustment.amount.clone(),
        reference: adjustment.reference.clone(),
        created_at: now,
    };

    let wallet_json = encode(&wallet)?;
    txn.open_table(WALLETS)?
        .insert(wallet.user_id, wallet_json.as_slice())?;
    let entry_json = encode(&entry)?;
    txn.open_table(WALLET_TRANSACTIONS)?
        .insert((entry.wallet_id, entry.id), entry_json.as_slice())?;

    Ok(Ok(AdjustmentReceipt { wallet, entry }))
}

/// redb-backed [`WalletStore`].
#[derive(Clone)]
pub struct WalletRepository {
    db: Arc<LedgerDatabase>,
}

impl WalletRepository {
    pub fn new(db: Arc<LedgerDatabase>) -> Self {
        Self { db }
    }
}

impl WalletStore for WalletRepository {
    fn find_wallet(&self, user_id: UserId) -> StoreResult<Option<Wallet>> {
        let read_txn = self.db.read()?;
        let wallets = read_txn.open_table(WALLETS)?;
        match wallets.get(user_id)? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Ok(None),
        }
    }

    fn adjust(&self, adjustment: &Adjustment) -> Result<AdjustmentReceipt, AdjustError> {
        let receipt = self.db.write(|txn| apply_adjustment(txn, adjustment))??;
        tracing::debug!(
            user_id = adjustment.user_id,
            direction = %adjustment.direction,
            amount = %adjustment.amount,
            balance = %receipt.wallet.balance,
            "Wallet adjusted"
        );
        Ok(receipt)
    }

    fn list_entries(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<WalletTransaction>> {
        let Some(wallet) = self.find_wallet(user_id)? else {
            return Ok(Vec::new());
        };
        let read_txn = self.db.read()?;
        let log = read_txn.open_table(WALLET_TRANSACTIONS)?;
        let mut entries = Vec::new();
        for row in log
            .range((wallet.wallet_id, 0)..=(wallet.wallet_id, u64::MAX))?
            .rev()
            .take(limit)
        {
            let (_, value) = row?;
            entries.push(decode(value.value())?);
        }
        Ok(entries)
    }
}
