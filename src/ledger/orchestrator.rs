// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Transaction orchestrator.
//!
//! ```text
//! PENDING ──► SUCCESS   (settles the wallet)
//!         ├─► FAILED
//!         └─► REVERSED
//! ```
//!
//! Initiation records intent only. Settlement happens when the transaction
//! moves to SUCCESS, in the same commit as the status change.

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use bigdecimal::BigDecimal;

use super::amount::amount_in_range;
use crate::storage::{
    run_blocking, CreateTransactionError, DeadlineError, Finalization, FinalizeError,
    NewTransaction, StoreError, Transaction, TransactionStatus, TransactionStore, UserId,
};

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("amount must be greater than zero with at most 18 integer digits and 8 decimal places")]
    InvalidAmount,

    #[error("reference is required")]
    MissingReference,

    #[error("invalid transaction type '{0}', expected TOPUP, PURCHASE or REFUND")]
    InvalidType(String),

    #[error("invalid status '{0}', expected SUCCESS, FAILED or REVERSED")]
    InvalidStatus(String),

    #[error("reference already used: {0}")]
    DuplicateReference(String),

    #[error("transaction not found: {0}")]
    NotFound(String),

    #[error("transaction is already {from}, cannot move to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        balance: BigDecimal,
        requested: BigDecimal,
    },

    #[error("transaction store unavailable: {0}")]
    Persistence(String),
}

impl TransactionError {
    pub fn error_code(&self) -> &'static str {
        match self {
            TransactionError::InvalidAmount => "invalid_amount",
            TransactionError::MissingReference => "missing_reference",
            TransactionError::InvalidType(_) => "invalid_transaction_type",
            TransactionError::InvalidStatus(_) => "invalid_status",
            TransactionError::DuplicateReference(_) => "duplicate_reference",
            TransactionError::NotFound(_) => "transaction_not_found",
            TransactionError::InvalidTransition { .. } => "invalid_transition",
            TransactionError::InsufficientFunds { .. } => "insufficient_funds",
            TransactionError::Persistence(_) => "persistence_failure",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TransactionError::InvalidAmount
            | TransactionError::MissingReference
            | TransactionError::InvalidType(_)
            | TransactionError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
            TransactionError::NotFound(_) => StatusCode::NOT_FOUND,
            TransactionError::DuplicateReference(_) | TransactionError::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            TransactionError::InsufficientFunds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            TransactionError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StoreError> for TransactionError {
    fn from(e: StoreError) -> Self {
        tracing::error!(error = %e, "Transaction store failure");
        TransactionError::Persistence(e.to_string())
    }
}

impl From<DeadlineError> for TransactionError {
    fn from(e: DeadlineError) -> Self {
        TransactionError::Persistence(e.to_string())
    }
}

impl From<CreateTransactionError> for TransactionError {
    fn from(e: CreateTransactionError) -> Self {
        match e {
            CreateTransactionError::DuplicateReference(r) => TransactionError::DuplicateReference(r),
            CreateTransactionError::Store(e) => e.into(),
        }
    }
}

impl From<FinalizeError> for TransactionError {
    fn from(e: FinalizeError) -> Self {
        match e {
            FinalizeError::NotFound(r) => TransactionError::NotFound(r),
            FinalizeError::InvalidTransition { from, to } => {
                TransactionError::InvalidTransition { from, to }
            }
            FinalizeError::InsufficientFunds(e) => TransactionError::InsufficientFunds {
                balance: e.balance,
                requested: e.requested,
            },
            FinalizeError::Store(e) => e.into(),
        }
    }
}

/// Parse a status accepted by [`TransactionOrchestrator::update_status`].
pub fn parse_terminal_status(raw: &str) -> Result<TransactionStatus, TransactionError> {
    match raw.parse::<TransactionStatus>() {
        Ok(status) if status.is_terminal() => Ok(status),
        _ => Err(TransactionError::InvalidStatus(raw.to_string())),
    }
}

#[derive(Clone)]
pub struct TransactionOrchestrator {
    store: Arc<dyn TransactionStore>,
    timeout: Duration,
}

impl TransactionOrchestrator {
    pub fn new(store: Arc<dyn TransactionStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Record a PENDING transaction. No balance effect.
    pub async fn initiate(&self, new: NewTransaction) -> Result<Transaction, TransactionError> {
        if !amount_in_range(&new.amount) {
            return Err(TransactionError::InvalidAmount);
        }
        if new.reference.trim().is_empty() {
            return Err(TransactionError::MissingReference);
        }

        let store = self.store.clone();
        let created = run_blocking(self.timeout, "transaction.create", move || store.create(new))
            .await??;
        Ok(created)
    }

    /// Move a PENDING transaction to a terminal status.
    ///
    /// Repeating the recorded terminal status is a no-op returning
    /// [`Finalization::Unchanged`]. A SUCCESS that cannot be settled leaves
    /// the transaction PENDING.
    pub async fn update_status(
        &self,
        reference: &str,
        status: TransactionStatus,
    ) -> Result<Finalization, TransactionError> {
        if !status.is_terminal() {
            return Err(TransactionError::InvalidStatus(status.to_string()));
        }

        let store = self.store.clone();
        let owned_reference = reference.to_string();
        let outcome = run_blocking(self.timeout, "transaction.finalize", move || {
            store.finalize(&owned_reference, status)
        })
        .await?;

        match outcome {
            Ok(finalization) => Ok(finalization),
            Err(e) => {
                tracing::warn!(reference, status = %status, error = %e, "Status update rejected");
                Err(e.into())
            }
        }
    }

    pub async fn get_by_reference(&self, reference: &str) -> Result<Transaction, TransactionError> {
        let store = self.store.clone();
        let owned_reference = reference.to_string();
        run_blocking(self.timeout, "transaction.find", move || {
            store.find_by_reference(&owned_reference)
        })
        .await??
        .ok_or_else(|| TransactionError::NotFound(reference.to_string()))
    }

    /// Newest-first transactions of a user.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<Transaction>, TransactionError> {
        let store = self.store.clone();
        let listed = run_blocking(self.timeout, "transaction.list", move || {
            store.list_by_user(user_id, limit)
        })
        .await??;
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::Zero;
    use crate::ledger::WalletLedger;
    use crate::storage::{
        Direction, LedgerDatabase, Metadata, MetadataValue, TransactionRepository, TransactionType,
        WalletRepository,
    };

    struct Harness {
        orchestrator: TransactionOrchestrator,
        ledger: WalletLedger,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("orch.redb")).unwrap());
        let timeout = Duration::from_secs(5);
        Harness {
            orchestrator: TransactionOrchestrator::new(
                Arc::new(TransactionRepository::new(db.clone())),
                timeout,
            ),
            ledger: WalletLedger::new(Arc::new(WalletRepository::new(db)), timeout),
            _dir: dir,
        }
    }

    fn new_tx(user_id: UserId, amount: &str, kind: TransactionType, reference: &str) -> NewTransaction {
        NewTransaction {
            user_id,
            amount: amount.parse().unwrap(),
            transaction_type: kind,
            reference: reference.to_string(),
            description: "test".to_string(),
            metadata: Metadata::new(),
        }
    }

    fn dec(s: &str) -> BigDecimal {
        s.parse().unwrap()
    }

    #[test]
    fn only_terminal_statuses_parse() {
        assert_eq!(parse_terminal_status("SUCCESS").unwrap(), TransactionStatus::Success);
        assert!(matches!(
            parse_terminal_status("PENDING"),
            Err(TransactionError::InvalidStatus(s)) if s == "PENDING"
        ));
        assert!(matches!(
            parse_terminal_status("DONE"),
            Err(TransactionError::InvalidStatus(_))
        ));
    }

    #[tokio::test]
    async fn initiate_validates_and_records_pending() {
        let h = harness();
        let err = h
            .orchestrator
            .initiate(new_tx(1, "0", TransactionType::Topup, "t-0"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidAmount));

        for (i, amount) in ["1e5000000", "1000000000000000000", "0.123456789"]
            .into_iter()
            .enumerate()
        {
            let err = h
                .orchestrator
                .initiate(new_tx(1, amount, TransactionType::Topup, &format!("big-{i}")))
                .await
                .unwrap_err();
            assert!(matches!(err, TransactionError::InvalidAmount), "{amount}");
        }
        assert!(h.orchestrator.list_for_user(1, 10).await.unwrap().is_empty());

        let err = h
            .orchestrator
            .initiate(new_tx(1, "5", TransactionType::Topup, "  "))
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::MissingReference));

        let mut tx = new_tx(1, "5", TransactionType::Topup, "t-1");
        tx.metadata
            .insert("channel".to_string(), MetadataValue::Text("app".to_string()));
        let created = h.orchestrator.initiate(tx).await.unwrap();
        assert_eq!(created.status, TransactionStatus::Pending);
        assert_eq!(h.ledger.get_balance(1).await.unwrap(), BigDecimal::zero());

        let fetched = h.orchestrator.get_by_reference("t-1").await.unwrap();
        assert_eq!(
            fetched.metadata.get("channel"),
            Some(&MetadataValue::Text("app".to_string()))
        );

        let err = h
            .orchestrator
            .initiate(new_tx(2, "5", TransactionType::Topup, "t-1"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn purchase_settles_as_debit() {
        let h = harness();
        h.ledger
            .adjust_balance(1, dec("100"), Direction::Credit, "topup-1")
            .await
            .unwrap();
        h.orchestrator
            .initiate(new_tx(1, "50", TransactionType::Purchase, "ref-1"))
            .await
            .unwrap();

        let finalization = h
            .orchestrator
            .update_status("ref-1", TransactionStatus::Success)
            .await
            .unwrap();
        assert_eq!(finalization.transaction().status, TransactionStatus::Success);

        assert_eq!(h.ledger.get_balance(1).await.unwrap(), dec("50"));
        let entries = h.ledger.list_entries(1, 10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].direction, Direction::Debit);
        assert_eq!(entries[0].amount, dec("50"));
        assert_eq!(entries[0].reference, "ref-1");
    }

    #[tokio::test]
    async fn unsettleable_success_keeps_transaction_pending() {
        let h = harness();
        h.orchestrator
            .initiate(new_tx(1, "50", TransactionType::Purchase, "ref-2"))
            .await
            .unwrap();

        let err = h
            .orchestrator
            .update_status("ref-2", TransactionStatus::Success)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::InsufficientFunds { .. }));

        let tx = h.orchestrator.get_by_reference("ref-2").await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Pending);

        // Funds arrive later; the same request now settles
        h.ledger
            .adjust_balance(1, dec("60"), Direction::Credit, "topup")
            .await
            .unwrap();
        h.orchestrator
            .update_status("ref-2", TransactionStatus::Success)
            .await
            .unwrap();
        assert_eq!(h.ledger.get_balance(1).await.unwrap(), dec("10"));
    }

    #[tokio::test]
    async fn status_errors() {
        let h = harness();
        let err = h
            .orchestrator
            .update_status("missing", TransactionStatus::Failed)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = h
            .orchestrator
            .update_status("missing", TransactionStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, TransactionError::InvalidStatus(_)));

        h.orchestrator
            .initiate(new_tx(1, "5", TransactionType::Refund, "rf"))
            .await
            .unwrap();
        h.orchestrator
            .update_status("rf", TransactionStatus::Reversed)
            .await
            .unwrap();
        let err = h
            .orchestrator
            .update_status("rf", TransactionStatus::Success)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransactionError::InvalidTransition {
                from: TransactionStatus::Reversed,
                to: TransactionStatus::Success
            }
        ));
        assert!(h.ledger.get_balance(1).await.unwrap().is_zero());

        let err = h.orchestrator.get_by_reference("nope").await.unwrap_err();
        assert!(matches!(err, TransactionError::NotFound(r) if r == "nope"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn duplicate_success_delivery_settles_once() {
        let h = harness();
        h.orchestrator
            .initiate(new_tx(9, "25", TransactionType::Topup, "hook-1"))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let orchestrator = h.orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orchestrator
                    .update_status("hook-1", TransactionStatus::Success)
                    .await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                Finalization::Applied { .. } => applied += 1,
                Finalization::Unchanged { .. } => {}
            }
        }

        assert_eq!(applied, 1);
        assert_eq!(h.ledger.get_balance(9).await.unwrap(), dec("25"));
        assert_eq!(h.ledger.list_entries(9, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn list_for_user_is_newest_first() {
        let h = harness();
        for reference in ["a", "b", "c"] {
            h.orchestrator
                .initiate(new_tx(4, "1", TransactionType::Topup, reference))
                .await
                .unwrap();
        }
        let listed = h.orchestrator.list_for_user(4, 2).await.unwrap();
        let references: Vec<&str> = listed.iter().map(|t| t.reference.as_str()).collect();
        assert_eq!(references, vec!["c", "b"]);
    }
}
