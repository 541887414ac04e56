// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded ledger database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: user_id → serialized StoredUser
//! - `users_by_username` / `users_by_email` / `users_by_phone`: unique index → user_id
//! - `sessions`: session_id → serialized StoredSession
//! - `sessions_by_refresh` / `sessions_by_access`: sha256(token) → session_id
//! - `user_sessions`: user_id ⇒ session_id (multimap)
//! - `wallets`: user_id → serialized Wallet (one wallet per user)
//! - `wallet_transactions`: (wallet_id, seq) → serialized WalletTransaction (append-only)
//! - `transactions`: reference → serialized Transaction
//! - `user_transactions`: (user_id, transaction_id) → reference
//! - `counters`: name → next id
//!
//! redb admits a single write transaction at a time. Every mutation that
//! touches more than one row goes through [`LedgerDatabase::write`], so the
//! rows it touches are committed together or not at all.

use std::path::Path;

use redb::{
    Database, MultimapTableDefinition, ReadTransaction, ReadableDatabase, ReadableTable,
    TableDefinition, WriteTransaction,
};
use serde::{de::DeserializeOwned, Serialize};

// =============================================================================
// Table Definitions
// =============================================================================

pub(crate) const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");
pub(crate) const USERS_BY_USERNAME: TableDefinition<&str, u64> =
    TableDefinition::new("users_by_username");
pub(crate) const USERS_BY_EMAIL: TableDefinition<&str, u64> =
    TableDefinition::new("users_by_email");
pub(crate) const USERS_BY_PHONE: TableDefinition<&str, u64> =
    TableDefinition::new("users_by_phone");

pub(crate) const SESSIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("sessions");
pub(crate) const SESSIONS_BY_REFRESH: TableDefinition<&str, &str> =
    TableDefinition::new("sessions_by_refresh");
pub(crate) const SESSIONS_BY_ACCESS: TableDefinition<&str, &str> =
    TableDefinition::new("sessions_by_access");
pub(crate) const USER_SESSIONS: MultimapTableDefinition<u64, &str> =
    MultimapTableDefinition::new("user_sessions");

pub(crate) const WALLETS: TableDefinition<u64, &[u8]> = TableDefinition::new("wallets");
/// Key: (wallet_id, sequence). Sequence comes from the `wallet_tx` counter,
/// so forward order is insertion order.
pub(crate) const WALLET_TRANSACTIONS: TableDefinition<(u64, u64), &[u8]> =
    TableDefinition::new("wallet_transactions");

pub(crate) const TRANSACTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("transactions");
pub(crate) const USER_TRANSACTIONS: TableDefinition<(u64, u64), &str> =
    TableDefinition::new("user_transactions");

const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

/// Counter names used with [`next_id`].
pub(crate) mod counter {
    pub const USER: &str = "user";
    pub const WALLET: &str = "wallet";
    pub const WALLET_TX: &str = "wallet_tx";
    pub const TRANSACTION: &str = "transaction";
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An index points at a row that does not exist.
    #[error("dangling index: {0}")]
    Corrupt(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Row Encoding
// =============================================================================

pub(crate) fn encode<T: Serialize>(row: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(row)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Allocate the next id for `name` inside an open write transaction.
///
/// Ids start at 1. The increment commits with the caller's transaction, so
/// an aborted write does not burn an id.
pub(crate) fn next_id(txn: &WriteTransaction, name: &str) -> StoreResult<u64> {
    let mut table = txn.open_table(COUNTERS)?;
    let current = table.get(name)?.map(|v| v.value()).unwrap_or(0);
    let next = current + 1;
    table.insert(name, next)?;
    Ok(next)
}

// =============================================================================
// LedgerDatabase
// =============================================================================

/// Durable store shared by every repository.
///
/// Constructed once at startup and handed to repositories as an `Arc`.
pub struct LedgerDatabase {
    db: Database,
}

impl LedgerDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USERS_BY_USERNAME)?;
            let _ = write_txn.open_table(USERS_BY_EMAIL)?;
            let _ = write_txn.open_table(USERS_BY_PHONE)?;
            let _ = write_txn.open_table(SESSIONS)?;
            let _ = write_txn.open_table(SESSIONS_BY_REFRESH)?;
            let _ = write_txn.open_table(SESSIONS_BY_ACCESS)?;
            let _ = write_txn.open_multimap_table(USER_SESSIONS)?;
            let _ = write_txn.open_table(WALLETS)?;
            let _ = write_txn.open_table(WALLET_TRANSACTIONS)?;
            let _ = write_txn.open_table(TRANSACTIONS)?;
            let _ = write_txn.open_table(USER_TRANSACTIONS)?;
            let _ = write_txn.open_table(COUNTERS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read-only snapshot.
    pub(crate) fn read(&self) -> StoreResult<ReadTransaction> {
        Ok(self.db.begin_read()?)
    }

    /// Run `f` inside a single write transaction.
    ///
    /// The outer result carries infrastructure failures, the inner one the
    /// business outcome. The transaction commits only when both are `Ok`;
    /// a business rejection aborts it and leaves every table untouched.
    pub(crate) fn write<T, E>(
        &self,
        f: impl FnOnce(&WriteTransaction) -> StoreResult<Result<T, E>>,
    ) -> StoreResult<Result<T, E>> {
        let txn = self.db.begin_write()?;
        match f(&txn) {
            Ok(Ok(value)) => {
                txn.commit()?;
                Ok(Ok(value))
            }
            outcome => {
                if let Err(e) = txn.abort() {
                    tracing::warn!(error = %e, "Failed to abort write transaction");
                }
                outcome
            }
        }
    }

    /// Verify the database file can serve a read snapshot.
    pub fn health_check(&self) -> StoreResult<()> {
        let read_txn = self.read()?;
        let table = read_txn.open_table(COUNTERS)?;
        let _ = table.get(counter::USER)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
