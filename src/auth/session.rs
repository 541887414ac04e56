// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Auth session manager: registration, login, logout, token refresh and
//! request authentication.
//!
//! ## Session state
//!
//! - The durable session row is authoritative. Access tokens are accepted
//!   when they match the cached `auth:token:{user_id}` entry or a live
//!   durable session.
//! - Refresh tokens must be present in the cache *and* back a durable
//!   session. Rotation is strict: the durable session holding the presented
//!   refresh token is replaced in one commit, so at most one concurrent
//!   refresh with the same token succeeds. The old cache key is retired only
//!   after that commit, so a failed attempt can be retried.
//! - Cache writes never outlive a revocation: the new pair is mirrored
//!   before the durable rotate, and an entry re-warmed from the store is
//!   confirmed against the store afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use super::password::{hash_password, verify_against_dummy, verify_password};
use super::tokens::{TokenIssuer, TokenPair};
use super::{AuthError, AuthenticatedUser};
use crate::storage::{
    run_blocking, CredentialStore, NewUser, SessionStore, StoredSession, StoredUser, TokenCache,
    UserId,
};

/// Validated registration input (plaintext password).
#[derive(Clone)]
pub struct Registration {
    pub username: String,
    pub password: String,
    pub email: String,
    pub phone_number: String,
    pub address: String,
    pub dob: NaiveDate,
}

/// Successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: StoredUser,
    pub tokens: TokenPair,
}

pub struct SessionManager {
    users: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    cache: Arc<dyn TokenCache>,
    tokens: TokenIssuer,
    store_timeout: Duration,
    cache_timeout: Duration,
}

impl SessionManager {
    pub fn new(
        users: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        cache: Arc<dyn TokenCache>,
        tokens: TokenIssuer,
        store_timeout: Duration,
        cache_timeout: Duration,
    ) -> Self {
        Self {
            users,
            sessions,
            cache,
            tokens,
            store_timeout,
            cache_timeout,
        }
    }

    // =========================================================================
    // Bounded store/cache calls
    // =========================================================================

    async fn in_store<T, E, F>(&self, op: &'static str, f: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        AuthError: From<E>,
    {
        run_blocking(self.store_timeout, op, f)
            .await
            .map_err(AuthError::store_deadline)?
            .map_err(AuthError::from)
    }

    async fn in_cache<T, E, F>(&self, op: &'static str, f: F) -> Result<T, AuthError>
    where
        F: FnOnce() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        AuthError: From<E>,
    {
        run_blocking(self.cache_timeout, op, f)
            .await
            .map_err(AuthError::cache_deadline)?
            .map_err(AuthError::from)
    }

    /// Mirror a token pair into the cache with TTLs matching the tokens.
    async fn mirror(&self, user_id: UserId, tokens: &TokenPair) -> Result<(), AuthError> {
        let cache = self.cache.clone();
        let access = tokens.access_token.clone();
        let refresh = tokens.refresh_token.clone();
        let access_ttl = self.tokens.access_ttl();
        let refresh_ttl = self.tokens.refresh_ttl();
        self.in_cache("cache.store_session", move || {
            cache.store_session(user_id, &access, &refresh, access_ttl, refresh_ttl)
        })
        .await
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Hash the password and persist the user. Email, username and phone
    /// number must be unused.
    pub async fn register(&self, registration: Registration) -> Result<StoredUser, AuthError> {
        let password = registration.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .map_err(|e| AuthError::Internal(format!("password hashing failed: {e}")))?;

        let new_user = NewUser {
            username: registration.username,
            email: registration.email,
            phone_number: registration.phone_number,
            address: registration.address,
            dob: registration.dob,
            password_hash,
        };
        let users = self.users.clone();
        self.in_store("users.create", move || users.create_user(new_user))
            .await
    }

    /// Verify credentials and open a new session.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let users = self.users.clone();
        let lookup = username.to_string();
        let user = self
            .in_store("users.find_by_username", move || users.find_by_username(&lookup))
            .await?;
        let Some(user) = user else {
            let candidate = password.to_string();
            tokio::task::spawn_blocking(move || verify_against_dummy(&candidate))
                .await
                .map_err(|e| AuthError::Internal(e.to_string()))?;
            tracing::warn!(username, "Login rejected: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        let candidate = password.to_string();
        let stored_hash = user.password_hash.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&candidate, &stored_hash))
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        match verified {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(user_id = user.id, "Login rejected: wrong password");
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => {
                tracing::error!(user_id = user.id, error = %e, "Stored password hash is unreadable");
                return Err(AuthError::Internal("stored password hash is unreadable".to_string()));
            }
        }

        let tokens = self.tokens.issue(user.id, &user.username)?;
        let session = StoredSession::new(
            user.id,
            &tokens.access_token,
            &tokens.refresh_token,
            tokens.access_expires_at,
            tokens.refresh_expires_at,
        );
        let sessions = self.sessions.clone();
        self.in_store("sessions.create", move || sessions.create_session(&session))
            .await?;
        self.mirror(user.id, &tokens).await?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome { user, tokens })
    }

    /// End every session of a user.
    ///
    /// Fails with [`AuthError::SessionNotFound`] only when neither the cache
    /// nor the durable store knows a session. A durable delete failure is
    /// surfaced after the cache eviction has been attempted.
    pub async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        let cache = self.cache.clone();
        let cached = self
            .in_cache("cache.current_session", move || cache.current_session(user_id))
            .await?;

        let sessions = self.sessions.clone();
        let deleted = self
            .in_store("sessions.delete_user", move || {
                sessions.delete_user_sessions(user_id)
            })
            .await;

        if cached.is_none() && matches!(deleted, Ok(0)) {
            tracing::warn!(user_id, "Logout rejected: no active session");
            return Err(AuthError::SessionNotFound);
        }

        let refresh = cached.and_then(|session| session.refresh_token);
        let cache = self.cache.clone();
        let evicted = self
            .in_cache("cache.evict_session", move || {
                cache.evict_session(user_id, refresh.as_deref())
            })
            .await;

        let deleted = deleted.inspect_err(|e| {
            tracing::error!(user_id, error = %e, "Failed to delete durable sessions on logout");
        })?;
        evicted?;

        tracing::info!(user_id, sessions = deleted, "User logged out");
        Ok(())
    }

    /// Exchange a refresh token for a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self
            .tokens
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidOrExpiredToken)?;

        let cache = self.cache.clone();
        let presented = refresh_token.to_string();
        let cached_user = self
            .in_cache("cache.resolve_refresh", move || cache.resolve_refresh(&presented))
            .await?;
        let Some(user_id) = cached_user.filter(|id| *id == claims.sub) else {
            tracing::warn!(user_id = claims.sub, "Refresh rejected: token not in cache");
            return Err(AuthError::InvalidOrExpiredToken);
        };

        let users = self.users.clone();
        let user = self
            .in_store("users.find_by_id", move || users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::InvalidOrExpiredToken)?;

        let tokens = self.tokens.issue(user.id, &user.username)?;
        let replacement = StoredSession::new(
            user.id,
            &tokens.access_token,
            &tokens.refresh_token,
            tokens.access_expires_at,
            tokens.refresh_expires_at,
        );

        // A logout racing this refresh evicts these keys and deletes the
        // durable row, so the rotate below then finds nothing.
        self.mirror(user.id, &tokens).await?;

        let sessions = self.sessions.clone();
        let presented = refresh_token.to_string();
        let replaced = self
            .in_store("sessions.rotate", move || {
                sessions.rotate_session(&presented, &replacement)
            })
            .await;
        let retired = match replaced {
            Ok(Some(_)) => refresh_token.to_string(),
            Ok(None) => {
                self.forget_refresh(user_id, tokens.refresh_token.clone()).await;
                tracing::warn!(user_id, "Refresh rejected: no durable session");
                return Err(AuthError::InvalidOrExpiredToken);
            }
            Err(e) => {
                self.forget_refresh(user_id, tokens.refresh_token.clone()).await;
                return Err(e);
            }
        };

        self.forget_refresh(user_id, retired).await;
        tracing::info!(user_id, "Session refreshed");
        Ok(tokens)
    }

    /// Drop a refresh key from the cache. The durable row decides validity,
    /// so a failure here only leaves a key that can no longer rotate.
    async fn forget_refresh(&self, user_id: UserId, refresh_token: String) {
        let cache = self.cache.clone();
        if let Err(e) = self
            .in_cache("cache.take_refresh", move || cache.take_refresh(&refresh_token))
            .await
        {
            tracing::warn!(user_id, error = %e, "Failed to evict refresh key");
        }
    }

    /// Resolve a bearer access token to the user it was issued to.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.tokens.verify_access(access_token)?;
        let user_id = claims.sub;

        let cache = self.cache.clone();
        let cached = match self
            .in_cache("cache.current_session", move || cache.current_session(user_id))
            .await
        {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Checking durable session without cache");
                None
            }
        };
        if cached
            .as_ref()
            .is_some_and(|session| session.access_token == access_token)
        {
            return Ok(AuthenticatedUser::from_claims(claims));
        }

        let sessions = self.sessions.clone();
        let presented = access_token.to_string();
        let session = self
            .in_store("sessions.find_by_access", move || {
                sessions.find_by_access_token(&presented)
            })
            .await?;

        let now = Utc::now();
        match session {
            Some(session) if session.user_id == user_id && session.access_live_at(now) => {
                if cached.is_none() {
                    self.rewarm(user_id, access_token, &session).await?;
                }
                Ok(AuthenticatedUser::from_claims(claims))
            }
            _ => {
                tracing::debug!(user_id, "Access token has no live session");
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// Put a durably confirmed access token back into the cache, then check
    /// the durable row again. A logout that deleted the row in between has
    /// either already evicted the entry or is evicted here, so a revoked
    /// token never stays cached.
    async fn rewarm(
        &self,
        user_id: UserId,
        access_token: &str,
        session: &StoredSession,
    ) -> Result<(), AuthError> {
        let remaining = (session.access_expires_at - Utc::now())
            .to_std()
            .unwrap_or_default();
        let cache = self.cache.clone();
        let token = access_token.to_string();
        if let Err(e) = self
            .in_cache("cache.restore_access", move || {
                cache.restore_access(user_id, &token, remaining)
            })
            .await
        {
            tracing::warn!(user_id, error = %e, "Failed to re-warm token cache");
            return Ok(());
        }

        let sessions = self.sessions.clone();
        let presented = access_token.to_string();
        let confirmed = self
            .in_store("sessions.find_by_access", move || {
                sessions.find_by_access_token(&presented)
            })
            .await;
        match confirmed {
            Ok(Some(current)) if current.session_id == session.session_id => Ok(()),
            outcome => {
                let cache = self.cache.clone();
                if let Err(e) = self
                    .in_cache("cache.evict_session", move || cache.evict_session(user_id, None))
                    .await
                {
                    tracing::error!(user_id, error = %e, "Failed to drop re-warmed token");
                }
                match outcome {
                    Err(e) => Err(e),
                    _ => {
                        tracing::warn!(user_id, "Session revoked while re-warming cache");
                        Err(AuthError::InvalidToken)
                    }
                }
            }
        }
    }

    pub async fn get_user(&self, user_id: UserId) -> Result<StoredUser, AuthError> {
        let users = self.users.clone();
        self.in_store("users.find_by_id", move || users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Drop durable sessions whose refresh token has expired.
    pub async fn purge_expired_sessions(&self) -> Result<usize, AuthError> {
        let sessions = self.sessions.clone();
        let now = Utc::now();
        self.in_store("sessions.purge_expired", move || sessions.purge_expired(now))
            .await
    }

    /// Liveness of the token cache.
    pub async fn cache_ready(&self) -> Result<(), AuthError> {
        let cache = self.cache.clone();
        self.in_cache("cache.ping", move || cache.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{LedgerDatabase, LruTokenCache, SessionRepository, UserRepository};

    struct Harness {
        manager: Arc<SessionManager>,
        cache: Arc<LruTokenCache>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let cache = Arc::new(LruTokenCache::new(64));
        let manager = SessionManager::new(
            Arc::new(UserRepository::new(db.clone())),
            Arc::new(SessionRepository::new(db)),
            cache.clone(),
            TokenIssuer::new("unit-test-secret", Duration::from_secs(3600)),
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        Harness {
            manager: Arc::new(manager),
            cache,
            _dir: dir,
        }
    }

    fn alice() -> Registration {
        Registration {
            username: "alice".to_string(),
            password: "secret1".to_string(),
            email: "a@x.com".to_string(),
            phone_number: "0811".to_string(),
            address: "Jl. A".to_string(),
            dob: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        }
    }

    #[tokio::test]
    async fn register_hashes_password_and_rejects_duplicate_email() {
        let h = harness();
        let user = h.manager.register(alice()).await.unwrap();
        assert_ne!(user.password_hash, "secret1");
        assert!(user.password_hash.starts_with("$argon2id$"));

        let mut again = alice();
        again.username = "alice2".to_string();
        again.phone_number = "0812".to_string();
        let err = h.manager.register(again).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateEmail));

        let fetched = h.manager.get_user(user.id).await.unwrap();
        assert_eq!(fetched.username, "alice");
        assert!(matches!(
            h.manager.get_user(999).await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn bad_credentials_are_indistinguishable() {
        let h = harness();
        h.manager.register(alice()).await.unwrap();

        let wrong_password = h.manager.login("alice", "nope").await.unwrap_err();
        let unknown_user = h.manager.login("mallory", "secret1").await.unwrap_err();
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(wrong_password.error_code(), unknown_user.error_code());
    }

    #[tokio::test]
    async fn login_mirrors_tokens_and_authenticates() {
        let h = harness();
        let user = h.manager.register(alice()).await.unwrap();
        let outcome = h.manager.login("alice", "secret1").await.unwrap();
        assert_eq!(outcome.user.id, user.id);

        let cached = h.cache.current_session(user.id).unwrap().unwrap();
        assert_eq!(cached.access_token, outcome.tokens.access_token);
        assert_eq!(
            h.cache.resolve_refresh(&outcome.tokens.refresh_token).unwrap(),
            Some(user.id)
        );

        let authed = h
            .manager
            .authenticate(&outcome.tokens.access_token)
            .await
            .unwrap();
        assert_eq!(authed.user_id, user.id);
        assert_eq!(authed.username, "alice");

        let err = h
            .manager
            .authenticate(&outcome.tokens.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken));
    }

    #[tokio::test]
    async fn refresh_chain_rotates_strictly() {
        let h = harness();
        h.manager.register(alice()).await.unwrap();
        let first = h.manager.login("alice", "secret1").await.unwrap().tokens;

        let second = h.manager.refresh(&first.refresh_token).await.unwrap();
        assert!(matches!(
            h.manager.refresh(&first.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            h.manager.authenticate(&first.access_token).await,
            Err(AuthError::InvalidToken)
        ));
        h.manager.authenticate(&second.access_token).await.unwrap();

        let third = h.manager.refresh(&second.refresh_token).await.unwrap();
        h.manager.authenticate(&third.access_token).await.unwrap();
        assert!(h.manager.authenticate(&second.access_token).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_has_one_winner() {
        let h = harness();
        h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        let mut handles = Vec::new();
        for _ in 0..6 {
            let manager = h.manager.clone();
            let refresh = tokens.refresh_token.clone();
            handles.push(tokio::spawn(async move { manager.refresh(&refresh).await }));
        }
        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AuthError::InvalidOrExpiredToken) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn refresh_fails_cleanly_after_cache_loss() {
        let h = harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.cache
            .evict_session(user.id, Some(tokens.refresh_token.as_str()))
            .unwrap();

        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            h.manager.refresh("garbage").await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
    }

    #[tokio::test]
    async fn authenticate_falls_back_to_durable_session_and_rewarms() {
        let h = harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.cache.evict_session(user.id, None).unwrap();
        h.manager.authenticate(&tokens.access_token).await.unwrap();

        let rewarmed = h.cache.current_session(user.id).unwrap().unwrap();
        assert_eq!(rewarmed.access_token, tokens.access_token);
        assert_eq!(rewarmed.refresh_token, None);
    }

    #[tokio::test]
    async fn logout_ends_every_session() {
        let h = harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.manager.logout(user.id).await.unwrap();

        assert!(h.cache.current_session(user.id).unwrap().is_none());
        assert!(h.manager.authenticate(&tokens.access_token).await.is_err());
        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert!(matches!(
            h.manager.logout(user.id).await,
            Err(AuthError::SessionNotFound)
        ));
    }

    #[tokio::test]
    async fn logout_without_cache_entry_still_revokes_durable_session() {
        let h = harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        // Only the access entry is lost; the refresh key survives in cache
        h.cache.evict_session(user.id, None).unwrap();
        h.manager.logout(user.id).await.unwrap();

        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert!(h.manager.authenticate(&tokens.access_token).await.is_err());
    }

    // -------------------------------------------------------------------------
    // Fault injection
    // -------------------------------------------------------------------------

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::DateTime;

    use crate::storage::{CacheError, CacheResult, CachedSession, StoreError, StoreResult};

    #[derive(Default)]
    struct Faults {
        fail_rotate: AtomicUsize,
        fail_delete: AtomicUsize,
        revoke_after_access_lookup: AtomicBool,
        revoke_before_rotate: AtomicBool,
        cache_down: AtomicBool,
    }

    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn disk_error() -> StoreError {
        StoreError::Io(std::io::Error::other("disk unavailable"))
    }

    /// Session store that fails or races a logout on demand.
    struct FlakySessions {
        inner: SessionRepository,
        cache: Arc<LruTokenCache>,
        faults: Arc<Faults>,
    }

    impl FlakySessions {
        /// What a concurrent logout does: drop the rows, then the cache keys.
        fn revoke(&self, user_id: UserId) {
            self.inner.delete_user_sessions(user_id).unwrap();
            let refresh = self
                .cache
                .current_session(user_id)
                .unwrap()
                .and_then(|session| session.refresh_token);
            self.cache.evict_session(user_id, refresh.as_deref()).unwrap();
        }
    }

    impl SessionStore for FlakySessions {
        fn create_session(&self, session: &StoredSession) -> StoreResult<()> {
            self.inner.create_session(session)
        }

        fn find_by_access_token(&self, access_token: &str) -> StoreResult<Option<StoredSession>> {
            let found = self.inner.find_by_access_token(access_token)?;
            if let Some(session) = &found {
                if self.faults.revoke_after_access_lookup.swap(false, Ordering::SeqCst) {
                    self.revoke(session.user_id);
                }
            }
            Ok(found)
        }

        fn find_by_refresh_token(&self, refresh_token: &str) -> StoreResult<Option<StoredSession>> {
            self.inner.find_by_refresh_token(refresh_token)
        }

        fn rotate_session(
            &self,
            old_refresh_token: &str,
            replacement: &StoredSession,
        ) -> StoreResult<Option<StoredSession>> {
            if take(&self.faults.fail_rotate) {
                return Err(disk_error());
            }
            if self.faults.revoke_before_rotate.swap(false, Ordering::SeqCst) {
                self.revoke(replacement.user_id);
            }
            self.inner.rotate_session(old_refresh_token, replacement)
        }

        fn delete_user_sessions(&self, user_id: UserId) -> StoreResult<usize> {
            if take(&self.faults.fail_delete) {
                return Err(disk_error());
            }
            self.inner.delete_user_sessions(user_id)
        }

        fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<usize> {
            self.inner.purge_expired(now)
        }
    }

    /// Token cache that can be switched off.
    struct SwitchableCache {
        inner: Arc<LruTokenCache>,
        faults: Arc<Faults>,
    }

    impl SwitchableCache {
        fn check(&self) -> CacheResult<()> {
            if self.faults.cache_down.load(Ordering::SeqCst) {
                return Err(CacheError::Unavailable("connection refused".to_string()));
            }
            Ok(())
        }
    }

    impl TokenCache for SwitchableCache {
        fn store_session(
            &self,
            user_id: UserId,
            access_token: &str,
            refresh_token: &str,
            access_ttl: Duration,
            refresh_ttl: Duration,
        ) -> CacheResult<()> {
            self.check()?;
            self.inner
                .store_session(user_id, access_token, refresh_token, access_ttl, refresh_ttl)
        }

        fn current_session(&self, user_id: UserId) -> CacheResult<Option<CachedSession>> {
            self.check()?;
            self.inner.current_session(user_id)
        }

        fn restore_access(
            &self,
            user_id: UserId,
            access_token: &str,
            ttl: Duration,
        ) -> CacheResult<()> {
            self.check()?;
            self.inner.restore_access(user_id, access_token, ttl)
        }

        fn resolve_refresh(&self, refresh_token: &str) -> CacheResult<Option<UserId>> {
            self.check()?;
            self.inner.resolve_refresh(refresh_token)
        }

        fn take_refresh(&self, refresh_token: &str) -> CacheResult<Option<UserId>> {
            self.check()?;
            self.inner.take_refresh(refresh_token)
        }

        fn evict_session(&self, user_id: UserId, refresh_token: Option<&str>) -> CacheResult<()> {
            self.check()?;
            self.inner.evict_session(user_id, refresh_token)
        }

        fn ping(&self) -> CacheResult<()> {
            self.check()
        }
    }

    struct FaultyHarness {
        manager: SessionManager,
        cache: Arc<LruTokenCache>,
        faults: Arc<Faults>,
        _dir: tempfile::TempDir,
    }

    fn faulty_harness() -> FaultyHarness {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(LedgerDatabase::open(&dir.path().join("auth.redb")).unwrap());
        let cache = Arc::new(LruTokenCache::new(64));
        let faults = Arc::new(Faults::default());
        let manager = SessionManager::new(
            Arc::new(UserRepository::new(db.clone())),
            Arc::new(FlakySessions {
                inner: SessionRepository::new(db),
                cache: cache.clone(),
                faults: faults.clone(),
            }),
            Arc::new(SwitchableCache {
                inner: cache.clone(),
                faults: faults.clone(),
            }),
            TokenIssuer::new("unit-test-secret", Duration::from_secs(3600)),
            Duration::from_secs(5),
            Duration::from_secs(1),
        );
        FaultyHarness {
            manager,
            cache,
            faults,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn refresh_survives_a_failed_rotate() {
        let h = faulty_harness();
        h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.faults.fail_rotate.store(1, Ordering::SeqCst);
        let err = h.manager.refresh(&tokens.refresh_token).await.unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));

        let renewed = h.manager.refresh(&tokens.refresh_token).await.unwrap();
        h.manager.authenticate(&renewed.access_token).await.unwrap();
        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));
        assert_eq!(h.cache.resolve_refresh(&tokens.refresh_token).unwrap(), None);
    }

    #[tokio::test]
    async fn refresh_racing_logout_leaves_nothing_cached() {
        let h = faulty_harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.faults.revoke_before_rotate.store(true, Ordering::SeqCst);
        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token).await,
            Err(AuthError::InvalidOrExpiredToken)
        ));

        assert!(h.cache.current_session(user.id).unwrap().is_none());
        assert!(h.manager.authenticate(&tokens.access_token).await.is_err());
    }

    #[tokio::test]
    async fn rewarm_racing_logout_does_not_resurrect_token() {
        let h = faulty_harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        // Force the durable path, then let a logout land after the lookup
        h.cache.evict_session(user.id, None).unwrap();
        h.faults.revoke_after_access_lookup.store(true, Ordering::SeqCst);
        assert!(matches!(
            h.manager.authenticate(&tokens.access_token).await,
            Err(AuthError::InvalidToken)
        ));

        assert!(h.cache.current_session(user.id).unwrap().is_none());
        assert!(matches!(
            h.manager.authenticate(&tokens.access_token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn logout_surfaces_store_failure_after_evicting_cache() {
        let h = faulty_harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.faults.fail_delete.store(1, Ordering::SeqCst);
        let err = h.manager.logout(user.id).await.unwrap_err();
        assert!(matches!(err, AuthError::Persistence(_)));

        assert!(h.cache.current_session(user.id).unwrap().is_none());
        assert_eq!(h.cache.resolve_refresh(&tokens.refresh_token).unwrap(), None);

        // The durable row survived, so a retry finds and ends it
        h.manager.logout(user.id).await.unwrap();
        assert!(h.manager.authenticate(&tokens.access_token).await.is_err());
    }

    #[tokio::test]
    async fn cache_outage_is_surfaced() {
        let h = faulty_harness();
        let user = h.manager.register(alice()).await.unwrap();
        let tokens = h.manager.login("alice", "secret1").await.unwrap().tokens;

        h.faults.cache_down.store(true, Ordering::SeqCst);
        assert!(matches!(
            h.manager.login("alice", "secret1").await,
            Err(AuthError::CacheUnavailable(_))
        ));
        assert!(matches!(
            h.manager.logout(user.id).await,
            Err(AuthError::CacheUnavailable(_))
        ));
        assert!(matches!(
            h.manager.refresh(&tokens.refresh_token).await,
            Err(AuthError::CacheUnavailable(_))
        ));
        assert!(matches!(
            h.manager.cache_ready().await,
            Err(AuthError::CacheUnavailable(_))
        ));

        // Authentication degrades to the durable session
        h.manager.authenticate(&tokens.access_token).await.unwrap();

        h.faults.cache_down.store(false, Ordering::SeqCst);
        h.manager.refresh(&tokens.refresh_token).await.unwrap();
    }

    #[tokio::test]
    async fn cache_is_ready() {
        let h = harness();
        h.manager.cache_ready().await.unwrap();
    }
}
