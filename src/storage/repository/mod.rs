// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to the ledger database.
//!
//! Each repository exposes a capability trait (the contract the services
//! depend on) and a redb-backed implementation sharing one
//! [`LedgerDatabase`](super::LedgerDatabase) handle.

pub mod sessions;
pub mod transactions;
pub mod users;
pub mod wallets;

/// Internal numeric user identifier.
pub type UserId = u64;

pub use sessions::{hash_token, SessionRepository, SessionStore, StoredSession};
pub use transactions::{
    CreateTransactionError, FinalizeError, Finalization, Metadata, MetadataValue, NewTransaction,
    Transaction, TransactionRepository, TransactionStatus, TransactionStore, TransactionType,
};
pub use users::{CreateUserError, CredentialStore, NewUser, StoredUser, UserRepository};
pub use wallets::{
    AdjustError, Adjustment, AdjustmentReceipt, Direction, InsufficientFunds, Wallet,
    WalletRepository, WalletStore, WalletTransaction,
};
