// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Ledger
//!
//! - [`WalletLedger`]: balance reads and direct CREDIT/DEBIT adjustments
//! - [`TransactionOrchestrator`]: PENDING → terminal lifecycle of logical
//!   transactions, settling through the same wallet primitive
//!
//! The orchestrator depends on the wallet store primitive; the wallet
//! ledger never calls the orchestrator.

pub mod amount;
pub mod orchestrator;
pub mod wallet;

pub use amount::amount_in_range;
pub use orchestrator::{parse_terminal_status, TransactionError, TransactionOrchestrator};
pub use wallet::{parse_direction, LedgerError, WalletLedger};
