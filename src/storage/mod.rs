// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Durable state lives in one redb file; ephemeral session tokens live in
//! the [`TokenCache`].
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   ewallet.redb     # users, sessions, wallets, wallet log, transactions
//! ```
//!
//! ## Important Notes
//!
//! - redb and the cache are synchronous; async callers go through
//!   [`deadline::run_blocking`]
//! - Handles are constructed once in `main` and injected as `Arc`s

pub mod cache;
pub mod database;
pub mod deadline;
pub mod repository;

pub use cache::{CacheError, CacheResult, CachedSession, LruTokenCache, TokenCache};
pub use database::{LedgerDatabase, StoreError, StoreResult};
pub use deadline::{run_blocking, DeadlineError};
pub use repository::{
    AdjustError, Adjustment, AdjustmentReceipt, CreateTransactionError, CreateUserError,
    CredentialStore, Direction, Finalization, FinalizeError, InsufficientFunds, Metadata,
    MetadataValue, NewTransaction, NewUser, SessionRepository, SessionStore, StoredSession,
    StoredUser, Transaction, TransactionRepository, TransactionStatus, TransactionStore,
    TransactionType, UserId, UserRepository, Wallet, WalletRepository, WalletStore,
    WalletTransaction,
};
