// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Credential store: registered users and their password hashes.
//!
//! Username, email and phone number are unique. The three index tables are
//! checked and written in the same commit as the user row.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use redb::ReadableTable;
use serde::{Deserialize, Serialize};

use super::UserId;
use crate::storage::database::{
    counter, decode, encode, next_id, LedgerDatabase, StoreError, StoreResult, USERS,
    USERS_BY_EMAIL, USERS_BY_PHONE, USERS_BY_USERNAME,
};

/// Stored user record. `password_hash` never leaves the service layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub dob: NaiveDate,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User fields supplied at registration (password already hashed).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub dob: NaiveDate,
    pub password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    DuplicateEmail,

    #[error("username already taken")]
    DuplicateUsername,

    #[error("phone number already registered")]
    DuplicatePhone,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Capability contract for the durable user store.
pub trait CredentialStore: Send + Sync {
    fn create_user(&self, user: NewUser) -> Result<StoredUser, CreateUserError>;
    fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<StoredUser>>;
    fn find_by_username(&self, username: &str) -> StoreResult<Option<StoredUser>>;
    fn find_by_email(&self, email: &str) -> StoreResult<Option<StoredUser>>;
}

/// Emails are compared case-insensitively.
fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

/// redb-backed [`CredentialStore`].
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<LedgerDatabase>,
}

impl UserRepository {
    pub fn new(db: Arc<LedgerDatabase>) -> Self {
        Self { db }
    }

    fn find_by_index(
        &self,
        index: redb::TableDefinition<'static, &'static str, u64>,
        key: &str,
    ) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.read()?;
        let index_table = read_txn.open_table(index)?;
        let Some(user_id) = index_table.get(key)?.map(|v| v.value()) else {
            return Ok(None);
        };
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id)? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Err(StoreError::Corrupt(format!("user index points at missing user {user_id}"))),
        }
    }
}

impl CredentialStore for UserRepository {
    fn create_user(&self, user: NewUser) -> Result<StoredUser, CreateUserError> {
        let email = email_key(&user.email);

        let created = self.db.write(|txn| {
            let mut by_email = txn.open_table(USERS_BY_EMAIL)?;
            if by_email.get(email.as_str())?.is_some() {
                return Ok(Err(CreateUserError::DuplicateEmail));
            }
            let mut by_username = txn.open_table(USERS_BY_USERNAME)?;
            if by_username.get(user.username.as_str())?.is_some() {
                return Ok(Err(CreateUserError::DuplicateUsername));
            }
            let mut by_phone = txn.open_table(USERS_BY_PHONE)?;
            if by_phone.get(user.phone_number.as_str())?.is_some() {
                return Ok(Err(CreateUserError::DuplicatePhone));
            }

            let id = next_id(txn, counter::USER)?;
            let now = Utc::now();
            let stored = StoredUser {
                id,
                username: user.username,
                email: user.email,
                phone_number: user.phone_number,
                address: user.address,
                dob: user.dob,
                password_hash: user.password_hash,
                created_at: now,
                updated_at: now,
            };

            let json = encode(&stored)?;
            txn.open_table(USERS)?.insert(id, json.as_slice())?;
            by_email.insert(email.as_str(), id)?;
            by_username.insert(stored.username.as_str(), id)?;
            by_phone.insert(stored.phone_number.as_str(), id)?;

            Ok(Ok(stored))
        })??;

        tracing::info!(user_id = created.id, username = %created.username, "User registered");
        Ok(created)
    }

    fn find_by_id(&self, user_id: UserId) -> StoreResult<Option<StoredUser>> {
        let read_txn = self.db.read()?;
        let users = read_txn.open_table(USERS)?;
        match users.get(user_id)? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Ok(None),
        }
    }

    fn find_by_username(&self, username: &str) -> StoreResult<Option<StoredUser>> {
        self.find_by_index(USERS_BY_USERNAME, username)
    }

    fn find_by_email(&self, email: &str) -> StoreResult<Option<StoredUser>> {
        self.find_by_index(USERS_BY_EMAIL, &email_key(email))
    }
}
