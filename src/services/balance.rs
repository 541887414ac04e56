// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use crate::ledger::{parse_direction, LedgerError, WalletLedger};
use crate::models::{
    BalanceResponse, BalanceTransactionRequest, BalanceTransactionResponse,
    WalletTransactionResponse,
};
use crate::storage::UserId;

/// Wallet balance reads and direct CREDIT/DEBIT movements.
#[derive(Clone)]
pub struct BalanceService {
    ledger: WalletLedger,
}

impl BalanceService {
    pub fn new(ledger: WalletLedger) -> Self {
        Self { ledger }
    }

    pub async fn get_balance(&self, user_id: UserId) -> Result<BalanceResponse, LedgerError> {
        let balance = self.ledger.get_balance(user_id).await?;
        Ok(BalanceResponse { balance })
    }

    pub async fn process(
        &self,
        user_id: UserId,
        request: BalanceTransactionRequest,
    ) -> Result<BalanceTransactionResponse, LedgerError> {
        let direction = parse_direction(request.wallet_transaction_type.trim())?;
        let receipt = self
            .ledger
            .adjust_balance(user_id, request.amount.0, direction, request.reference.trim())
            .await?;
        Ok(BalanceTransactionResponse {
            balance: receipt.wallet.balance,
            wallet_transaction: receipt.entry.into(),
        })
    }

    pub async fn history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> Result<Vec<WalletTransactionResponse>, LedgerError> {
        let entries = self.ledger.list_entries(user_id, limit).await?;
        Ok(entries.into_iter().map(Into::into).collect())
    }
}
