// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Service Facades
//!
//! The operations exposed to HTTP handlers. Each facade validates and
//! converts request models, delegates to the auth or ledger components and
//! returns response models.

pub mod auth;
pub mod balance;
pub mod session_sweeper;
pub mod transactions;

pub use auth::AuthService;
pub use balance::BalanceService;
pub use transactions::TransactionService;
