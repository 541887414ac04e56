// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable login sessions.
//!
//! A session row is the authoritative record of a login. Tokens are never
//! stored in plaintext: the lookup tables are keyed by the SHA-256 digest of
//! the access and refresh tokens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use redb::{ReadableMultimapTable, ReadableTable, WriteTransaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::UserId;
use crate::storage::database::{
    decode, encode, LedgerDatabase, StoreError, StoreResult, SESSIONS, SESSIONS_BY_ACCESS,
    SESSIONS_BY_REFRESH, USER_SESSIONS,
};

/// Compute the SHA-256 hex digest of a token.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stored session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub session_id: String,
    pub user_id: UserId,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StoredSession {
    /// Create a session row for a freshly minted token pair.
    pub fn new(
        user_id: UserId,
        access_token: &str,
        refresh_token: &str,
        access_expires_at: DateTime<Utc>,
        refresh_expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id,
            access_token_hash: hash_token(access_token),
            refresh_token_hash: hash_token(refresh_token),
            access_expires_at,
            refresh_expires_at,
            created_at: Utc::now(),
        }
    }

    /// Whether the access token of this session is still within its lifetime.
    pub fn access_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.access_expires_at
    }
}

/// Capability contract for the durable session store.
pub trait SessionStore: Send + Sync {
    fn create_session(&self, session: &StoredSession) -> StoreResult<()>;

    fn find_by_access_token(&self, access_token: &str) -> StoreResult<Option<StoredSession>>;

    fn find_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Option<StoredSession>>;

    /// Replace the session holding `old_refresh_token` with `replacement` in
    /// one commit. Returns the replaced row, or `None` (writing nothing) when
    /// no session holds that refresh token.
    fn rotate_session(
        &self,
        old_refresh_token: &str,
        replacement: &StoredSession,
    ) -> StoreResult<Option<StoredSession>>;

    /// Delete every session of a user. Returns how many rows were removed.
    fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<usize>;

    /// Delete sessions whose refresh token expired at or before `now`.
    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize>;
}

/// redb-backed [`SessionStore`].
#[derive(Clone)]
pub struct SessionRepository {
    db: Arc<LedgerDatabase>,
}

impl SessionRepository {
    pub fn new(db: Arc<LedgerDatabase>) -> Self {
        Self { db }
    }

    fn find_by_hash(
        &self,
        index: redb::TableDefinition<'static, &'static str, &'static str>,
        token: &str,
    ) -> StoreResult<Option<StoredSession>> {
        let digest = hash_token(token);
        let read_txn = self.db.read()?;
        let index_table = read_txn.open_table(index)?;
        let Some(session_id) = index_table.get(digest.as_str())?.map(|v| v.value().to_string())
        else {
            return Ok(None);
        };
        let sessions = read_txn.open_table(SESSIONS)?;
        match sessions.get(session_id.as_str())? {
            Some(row) => Ok(Some(decode(row.value())?)),
            None => Err(StoreError::Corrupt(format!(
                "session index points at missing session {session_id}"
            ))),
        }
    }
}

fn insert_session(txn: &WriteTransaction, session: &StoredSession) -> StoreResult<()> {
    let json = encode(session)?;
    let id = session.session_id.as_str();
    txn.open_table(SESSIONS)?.insert(id, json.as_slice())?;
    txn.open_table(SESSIONS_BY_ACCESS)?
        .insert(session.access_token_hash.as_str(), id)?;
    txn.open_table(SESSIONS_BY_REFRESH)?
        .insert(session.refresh_token_hash.as_str(), id)?;
    txn.open_multimap_table(USER_SESSIONS)?
        .insert(session.user_id, id)?;
    Ok(())
}

fn remove_session(txn: &WriteTransaction, session_id: &str) -> StoreResult<Option<StoredSession>> {
    let removed = {
        let mut sessions = txn.open_table(SESSIONS)?;
        let removed = sessions.remove(session_id)?;
        match removed {
            Some(row) => Some(decode::<StoredSession>(row.value())?),
            None => None,
        }
    };
    if let Some(session) = &removed {
        txn.open_table(SESSIONS_BY_ACCESS)?
            .remove(session.access_token_hash.as_str())?;
        txn.open_table(SESSIONS_BY_REFRESH)?
            .remove(session.refresh_token_hash.as_str())?;
        txn.open_multimap_table(USER_SESSIONS)?
            .remove(session.user_id, session_id)?;
    }
    Ok(removed)
}

impl SessionStore for SessionRepository {
    fn create_session(&self, session: &StoredSession) -> StoreResult<()> {
        self.db
            .write(|txn| {
                insert_session(txn, session)?;
                Ok(Ok::<_, StoreError>(()))
            })??;
        Ok(())
    }

    fn find_by_access_token(&self, access_token: &str) -> StoreResult<Option<StoredSession>> {
        self.find_by_hash(SESSIONS_BY_ACCESS, access_token)
    }

    fn find_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Option<StoredSession>> {
        self.find_by_hash(SESSIONS_BY_REFRESH, refresh_token)
    }

    fn rotate_session(
        &self,
        old_refresh_token: &str,
        replacement: &StoredSession,
    ) -> StoreResult<Option<StoredSession>> {
        let digest = hash_token(old_refresh_token);
        self.db.write(|txn| {
            let old_id = txn
                .open_table(SESSIONS_BY_REFRESH)?
                .get(digest.as_str())?
                .map(|v| v.value().to_string());
            let Some(old_id) = old_id else {
                return Ok(Ok(None));
            };
            let replaced = remove_session(txn, &old_id)?;
            insert_session(txn, replacement)?;
            Ok(Ok::<_, StoreError>(replaced))
        })?
    }

    fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<usize> {
        self.db.write(|txn| {
            let session_ids: Vec<String> = {
                let index = txn.open_multimap_table(USER_SESSIONS)?;
                let mut ids = Vec::new();
                for entry in index.get(user_id)? {
                    ids.push(entry?.value().to_string());
                }
                ids
            };
            let mut removed = 0;
            for id in &session_ids {
                if remove_session(txn, id)?.is_some() {
                    removed += 1;
                }
            }
            Ok(Ok::<_, StoreError>(removed))
        })?
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        self.db.write(|txn| {
            let expired: Vec<String> = {
                let sessions = txn.open_table(SESSIONS)?;
                let mut ids = Vec::new();
                for entry in sessions.iter()? {
                    let (id, row) = entry?;
                    let session: StoredSession = decode(row.value())?;
                    if session.refresh_expires_at <= now {
                        ids.push(id.value().to_string());
                    }
                }
                ids
            };
            let mut removed = 0;
            for id in &expired {
                if remove_session(txn, id)?.is_some() {
                    removed += 1;
                }
            }
            Ok(Ok::<_, StoreError>(removed))
        })?
    }
}
