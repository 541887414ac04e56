// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{SessionManager, TokenIssuer};
use crate::config::AppConfig;
use crate::ledger::{TransactionOrchestrator, WalletLedger};
use crate::services::{AuthService, BalanceService, TransactionService};
use crate::storage::{
    LedgerDatabase, LruTokenCache, SessionRepository, TokenCache, TransactionRepository,
    UserRepository, WalletRepository,
};

/// Shared handles for request handlers.
///
/// Every component receives its store and cache handles at construction;
/// nothing is looked up globally.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<LedgerDatabase>,
    pub auth: AuthService,
    pub balance: BalanceService,
    pub transactions: TransactionService,
}

impl AppState {
    /// Wire the services over an opened database and a fresh token cache.
    pub fn new(config: &AppConfig, db: Arc<LedgerDatabase>) -> Self {
        let cache: Arc<dyn TokenCache> = Arc::new(LruTokenCache::new(config.token_cache_capacity));
        let sessions = SessionManager::new(
            Arc::new(UserRepository::new(db.clone())),
            Arc::new(SessionRepository::new(db.clone())),
            cache,
            TokenIssuer::new(&config.jwt_secret, config.access_token_ttl),
            config.store_timeout,
            config.cache_timeout,
        );
        let ledger = WalletLedger::new(Arc::new(WalletRepository::new(db.clone())), config.store_timeout);
        let orchestrator = TransactionOrchestrator::new(
            Arc::new(TransactionRepository::new(db.clone())),
            config.store_timeout,
        );

        Self {
            db,
            auth: AuthService::new(Arc::new(sessions)),
            balance: BalanceService::new(ledger),
            transactions: TransactionService::new(orchestrator),
        }
    }
}

/// State over a throwaway database. Keep the directory alive for the test.
#[cfg(test)]
pub(crate) fn test_state() -> (AppState, tempfile::TempDir) {
    use std::path::PathBuf;
    use std::time::Duration;

    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        data_dir: PathBuf::from(dir.path()),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "test-secret".to_string(),
        access_token_ttl: Duration::from_secs(3600),
        token_cache_capacity: 1024,
        store_timeout: Duration::from_secs(5),
        cache_timeout: Duration::from_secs(1),
        session_sweep_interval: Duration::from_secs(3600),
    };
    let db = Arc::new(LedgerDatabase::open(&config.database_path()).unwrap());
    (AppState::new(&config, db), dir)
}
