// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Logical transactions as seen by their owner.
//!
//! Another user's reference reads as [`TransactionError::NotFound`], so
//! references cannot be probed across accounts.

use crate::ledger::{parse_terminal_status, TransactionError, TransactionOrchestrator};
use crate::models::{
    CreateTransactionRequest, TransactionResponse, UpdateTransactionStatusRequest,
    UpdateTransactionStatusResponse,
};
use crate::storage::{Finalization, NewTransaction, Transaction, TransactionType, UserId};

#[derive(Clone)]
pub struct TransactionService {
    orchestrator: TransactionOrchestrator,
}

impl TransactionService {
    pub fn new(orchestrator: TransactionOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub async fn initiate(
        &self,
        user_id: UserId,
        request: CreateTransactionRequest,
    ) -> Result<TransactionResponse, TransactionError> {
        let transaction_type = request
            .transaction_type
            .trim()
            .parse::<TransactionType>()
            .map_err(TransactionError::InvalidType)?;

        let created = self
            .orchestrator
            .initiate(NewTransaction {
                user_id,
                amount: request.amount.0,
                transaction_type,
                reference: request.reference.trim().to_string(),
                description: request.description,
                metadata: request.metadata,
            })
            .await?;
        Ok(created.into())
    }

    pub async fn update_status(
        &self,
        user_id: UserId,
        request: UpdateTransactionStatusRequest,
    ) -> Result<UpdateTransactionStatusResponse, TransactionError> {
        let status = parse_terminal_status(request.status.trim())?;
        let reference = request.reference.trim();
        self.owned(user_id, reference).await?;

        let finalization = self.orchestrator.update_status(reference, status).await?;
        if matches!(finalization, Finalization::Unchanged { .. }) {
            tracing::debug!(user_id, reference, status = %status, "Status already recorded");
        }
        Ok(finalization.into())
    }

    pub async fn get(
        &self,
        user_id: UserId,
        reference: &str,
    ) -> Result<TransactionResponse, TransactionError> {
        Ok(self.owned(user_id, reference).await?.into())
    }

    pub async fn list(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<TransactionResponse>, TransactionError> {
        let listed = self.orchestrator.list_for_user(user_id, limit).await?;
        Ok(listed.into_iter().map(Into::into).collect())
    }

    async fn owned(&self, user_id: UserId, reference: &str) -> Result<Transaction, TransactionError> {
        let transaction = self.orchestrator.get_by_reference(reference).await?;
        if transaction.user_id != user_id {
            tracing::warn!(user_id, reference, "Transaction belongs to another user");
            return Err(TransactionError::NotFound(reference.to_string()));
        }
        Ok(transaction)
    }
}
