// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! E-Wallet Engine - Wallet Ledger & Auth Session Service
//!
//! Single-node e-wallet backend: username/password accounts with bearer
//! token sessions, one wallet per user with an append-only movement log,
//! and top-up/purchase/refund transactions that settle against the wallet
//! when marked SUCCESS.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Password hashing, tokens and session management
//! - `ledger` - Wallet ledger and transaction orchestrator
//! - `services` - Request validation facades used by the handlers
//! - `storage` - Durable store (redb) and the session/token cache

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
