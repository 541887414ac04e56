// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ephemeral session/token cache.
//!
//! Holds the projection of live sessions used to accelerate token checks:
//!
//! ```text
//! auth:token:{user_id}        → current access token (+ the refresh token minted with it)
//! auth:refresh:{refresh_token} → user_id
//! ```
//!
//! Entries are advisory. The durable session rows are authoritative, except
//! that refresh-token resolution goes through this cache only, so losing an
//! entry invalidates the refresh token it held.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::storage::repository::UserId;

/// Error type for cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("token cache unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Cached projection of a session under `auth:token:{user_id}`.
///
/// `refresh_token` is `None` when the entry was re-warmed from the durable
/// store, which only keeps token digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Capability contract for the session/token cache.
pub trait TokenCache: Send + Sync {
    /// Mirror a freshly minted token pair: the access entry lives for
    /// `access_ttl`, the refresh mapping for `refresh_ttl`. Overwrites the
    /// previous access entry for the user.
    fn store_session(
        &self,
        user_id: UserId,
        access_token: &str,
        refresh_token: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> CacheResult<()>;

    /// The session currently cached for a user, if any.
    fn current_session(&self, user_id: UserId) -> CacheResult<Option<CachedSession>>;

    /// Re-insert only the access entry (used after a durable fallback).
    fn restore_access(&self, user_id: UserId, access_token: &str, ttl: Duration)
        -> CacheResult<()>;

    /// Resolve a refresh token to its user without consuming it.
    fn resolve_refresh(&self, refresh_token: &str) -> CacheResult<Option<UserId>>;

    /// Resolve and evict a refresh token in one step. At most one caller
    /// observes `Some` for a given token.
    fn take_refresh(&self, refresh_token: &str) -> CacheResult<Option<UserId>>;

    /// Evict the access entry of a user and, when known, its refresh key.
    fn evict_session(&self, user_id: UserId, refresh_token: Option<&str>) -> CacheResult<()>;

    /// Liveness probe.
    fn ping(&self) -> CacheResult<()>;
}

pub fn token_key(user_id: UserId) -> String {
    format!("auth:token:{user_id}")
}

pub fn refresh_key(refresh_token: &str) -> String {
    format!("auth:refresh:{refresh_token}")
}

#[derive(Debug, Clone)]
enum CacheValue {
    Session(CachedSession),
    UserId(UserId),
}

struct CacheEntry {
    value: CacheValue,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// In-process LRU implementation of [`TokenCache`].
///
/// Capacity pressure evicts the least recently used entries, which is the
/// early-eviction case the session manager has to tolerate.
pub struct LruTokenCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
}

impl LruTokenCache {
    /// Create a new cache holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn with_cache<T>(&self, f: impl FnOnce(&mut LruCache<String, CacheEntry>) -> T) -> CacheResult<T> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|e| CacheError::Unavailable(e.to_string()))?;
        Ok(f(&mut cache))
    }
}

/// Fetch a live entry, dropping it if its TTL has lapsed.
fn live_value(cache: &mut LruCache<String, CacheEntry>, key: &str) -> Option<CacheValue> {
    let live = cache.get(key).map(|entry| entry.is_live())?;
    if live {
        cache.get(key).map(|entry| entry.value.clone())
    } else {
        cache.pop(key);
        None
    }
}

impl TokenCache for LruTokenCache {
    fn store_session(
        &self,
        user_id: UserId,
        access_token: &str,
        refresh_token: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> CacheResult<()> {
        let now = Instant::now();
        self.with_cache(|cache| {
            cache.put(
                refresh_key(refresh_token),
                CacheEntry {
                    value: CacheValue::UserId(user_id),
                    expires_at: now + refresh_ttl,
                },
            );
            cache.put(
                token_key(user_id),
                CacheEntry {
                    value: CacheValue::Session(CachedSession {
                        access_token: access_token.to_string(),
                        refresh_token: Some(refresh_token.to_string()),
                    }),
                    expires_at: now + access_ttl,
                },
            );
        })
    }

    fn current_session(&self, user_id: UserId) -> CacheResult<Option<CachedSession>> {
        self.with_cache(|cache| match live_value(cache, &token_key(user_id)) {
            Some(CacheValue::Session(session)) => Some(session),
            _ => None,
        })
    }

    fn restore_access(
        &self,
        user_id: UserId,
        access_token: &str,
        ttl: Duration,
    ) -> CacheResult<()> {
        let expires_at = Instant::now() + ttl;
        self.with_cache(|cache| {
            cache.put(
                token_key(user_id),
                CacheEntry {
                    value: CacheValue::Session(CachedSession {
                        access_token: access_token.to_string(),
                        refresh_token: None,
                    }),
                    expires_at,
                },
            );
        })
    }

    fn resolve_refresh(&self, refresh_token: &str) -> CacheResult<Option<UserId>> {
        self.with_cache(|cache| match live_value(cache, &refresh_key(refresh_token)) {
            Some(CacheValue::UserId(user_id)) => Some(user_id),
            _ => None,
        })
    }

    fn take_refresh(&self, refresh_token: &str) -> CacheResult<Option<UserId>> {
        self.with_cache(|cache| match cache.pop(&refresh_key(refresh_token)) {
            Some(CacheEntry {
                value: CacheValue::UserId(user_id),
                expires_at,
            }) if Instant::now() < expires_at => Some(user_id),
            _ => None,
        })
    }

    fn evict_session(&self, user_id: UserId, refresh_token: Option<&str>) -> CacheResult<()> {
        self.with_cache(|cache| {
            cache.pop(&token_key(user_id));
            if let Some(refresh_token) = refresh_token {
                cache.pop(&refresh_key(refresh_token));
            }
        })
    }

    fn ping(&self) -> CacheResult<()> {
        self.with_cache(|_| ())
    }
}
