// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Logical business transactions (top-up, purchase, refund).
//!
//! A transaction is created PENDING and leaves that state exactly once.
//! [`TransactionStore::finalize`] performs the PENDING compare-and-set and,
//! for SUCCESS, the wallet settlement in a single write transaction: either
//! the status change and the wallet movement both commit, or neither does.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use redb::ReadableTable;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::wallets::{apply_adjustment, Adjustment, Direction, InsufficientFunds, WalletTransaction};
use super::UserId;
use crate::storage::database::{
    counter, decode, encode, next_id, LedgerDatabase, StoreError, StoreResult, TRANSACTIONS,
    USER_TRANSACTIONS,
};

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Topup,
    Purchase,
    Refund,
}

impl TransactionType {
    /// Wallet direction applied when a transaction of this type succeeds.
    pub fn direction(&self) -> Direction {
        match self {
            TransactionType::Topup | TransactionType::Refund => Direction::Credit,
            TransactionType::Purchase => Direction::Debit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Topup => "TOPUP",
            TransactionType::Purchase => "PURCHASE",
            TransactionType::Refund => "REFUND",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TOPUP" => Ok(TransactionType::Topup),
            "PURCHASE" => Ok(TransactionType::Purchase),
            "REFUND" => Ok(TransactionType::Refund),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Reversed,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Success => "SUCCESS",
            TransactionStatus::Failed => "FAILED",
            TransactionStatus::Reversed => "REVERSED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TransactionStatus::Pending),
            "SUCCESS" => Ok(TransactionStatus::Success),
            "FAILED" => Ok(TransactionStatus::Failed),
            "REVERSED" => Ok(TransactionStatus::Reversed),
            other => Err(other.to_string()),
        }
    }
}

/// One value in transaction metadata. Never interpreted by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<MetadataValue>),
    Map(IndexMap<String, MetadataValue>),
}

/// Insertion-ordered key/value metadata.
pub type Metadata = IndexMap<String, MetadataValue>;

/// Stored transaction record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub user_id: UserId,
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    /// External idempotency/correlation key, unique across all users.
    pub reference: String,
    pub description: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when a transaction is initiated.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub amount: BigDecimal,
    pub transaction_type: TransactionType,
    pub reference: String,
    pub description: String,
    pub metadata: Metadata,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateTransactionError {
    #[error("reference already used: {0}")]
    DuplicateReference(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of a committed [`TransactionStore::finalize`].
#[derive(Debug, Clone)]
pub enum Finalization {
    /// The row left PENDING in this call. `entry` is the wallet row written
    /// by a SUCCESS settlement.
    Applied {
        transaction: Transaction,
        entry: Option<WalletTransaction>,
    },
    /// The row already carried the requested status; nothing was written.
    Unchanged { transaction: Transaction },
}

impl Finalization {
    pub fn transaction(&self) -> &Transaction {
        match self {
            Finalization::Applied { transaction, .. } | Finalization::Unchanged { transaction } => {
                transaction
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("cannot move transaction from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error(transparent)]
    InsufficientFunds(#[from] InsufficientFunds),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Capability contract for the durable transaction store.
pub trait TransactionStore: Send + Sync {
    fn create(&self, new: NewTransaction) -> Result<Transaction, CreateTransactionError>;

    fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Transaction>>;

    /// Newest-first transactions of a user.
    fn list_by_user(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<Transaction>>;

    /// Move a PENDING transaction to the terminal `status`, settling the
    /// wallet on SUCCESS.
    fn finalize(
        &self,
        reference: &str,
        status: TransactionStatus,
    ) -> Result<Finalization, FinalizeError>;
}

// =============================================================================
// Repository
// =============================================================================

/// redb-backed [`TransactionStore`].
#[derive(Clone)]
pub struct TransactionRepository {
    db: Arc<LedgerDatabase>,
}

impl TransactionRepository {
    pub fn new(db: Arc<LedgerDatabase>) -> Self {
        Self { db }
    }
}

impl TransactionStore for TransactionRepository {
    fn create(&self, new: NewTransaction) -> Result<Transaction, CreateTransactionError> {
        let created = self.db.write(|txn| {
            let mut transactions = txn.open_table(TRANSACTIONS)?;
            if transactions.get(new.reference.as_str())?.is_some() {
                return Ok(Err(CreateTransactionError::DuplicateReference(
                    new.reference.clone(),
                )));
            }

            let now = Utc::now();
            let transaction = Transaction {
                id: next_id(txn, counter::TRANSACTION)?,
                user_id: new.user_id,
                amount: new.amount,
                transaction_type: new.transaction_type,
                status: TransactionStatus::Pending,
                reference: new.reference,
                description: new.description,
                metadata: new.metadata,
                created_at: now,
                updated_at: now,
            };

            let json = encode(&transaction)?;
            transactions.insert(transaction.reference.as_str(), json.as_slice())?;
            txn.open_table(USER_TRANSACTIONS)?.insert(
                (transaction.user_id, transaction.id),
                transaction.reference.as_str(),
            )?;
            Ok(Ok(transaction))
        })??;

        tracing::info!(
            user_id = created.user_id,
            reference = %created.reference,
            transaction_type = %created.transaction_type,
            amount = %created.amount,
            "Transaction initiated"
        );
        Ok(created)
    }

    fn find_by_reference(&self, reference: &str) -> StoreResult<Option<Transaction>> {
        let read_txn = self.db.read()?;
        let table = read_txn.open_table(TRANSACTIONS)?;
        match table.get(reference)? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Ok(None),
        }
    }

    fn list_by_user(&self, user_id: UserId, limit: usize) -> StoreResult<Vec<Transaction>> {
        let read_txn = self.db.read()?;
        let index = read_txn.open_table(USER_TRANSACTIONS)?;
        let transactions = read_txn.open_table(TRANSACTIONS)?;

        let mut result = Vec::new();
        for entry in index.range((user_id, 0)..=(user_id, u64::MAX))?.rev().take(limit) {
            let (_, reference) = entry?;
            let reference = reference.value();
            match transactions.get(reference)? {
                Some(row) => result.push(decode(row.value())?),
                None => {
                    return Err(StoreError::Corrupt(format!(
                        "user index points at missing transaction {reference}"
                    )))
                }
            }
        }
        Ok(result)
    }

    fn finalize(
        &self,
        reference: &str,
        status: TransactionStatus,
    ) -> Result<Finalization, FinalizeError> {
        let finalization = self.db.write(|txn| {
            let current = {
                let table = txn.open_table(TRANSACTIONS)?;
                let row = table.get(reference)?;
                match row {
                    Some(row) => decode::<Transaction>(row.value())?,
                    None => return Ok(Err(FinalizeError::NotFound(reference.to_string()))),
                }
            };

            if current.status == status && status.is_terminal() {
                return Ok(Ok(Finalization::Unchanged {
                    transaction: current,
                }));
            }
            if current.status.is_terminal() || !status.is_terminal() {
                return Ok(Err(FinalizeError::InvalidTransition {
                    from: current.status,
                    to: status,
                }));
            }

            let entry = if status == TransactionStatus::Success {
                let adjustment = Adjustment {
                    user_id: current.user_id,
                    amount: current.amount.clone(),
                    direction: current.transaction_type.direction(),
                    reference: current.reference.clone(),
                };
                match apply_adjustment(txn, &adjustment)? {
                    Ok(receipt) => Some(receipt.entry),
                    Err(insufficient) => return Ok(Err(insufficient.into())),
                }
            } else {
                None
            };

            let mut transaction = current;
            transaction.status = status;
            transaction.updated_at = Utc::now();
            let json = encode(&transaction)?;
            txn.open_table(TRANSACTIONS)?
                .insert(reference, json.as_slice())?;

            Ok(Ok(Finalization::Applied { transaction, entry }))
        })??;

        if let Finalization::Applied { transaction, entry } = &finalization {
            tracing::info!(
                reference = %transaction.reference,
                status = %transaction.status,
                settled = entry.is_some(),
                "Transaction finalized"
            );
        }
        Ok(finalization)
    }
}

// =============================================================================
// Tests
// =============================================================================
