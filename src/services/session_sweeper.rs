// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Periodic cleanup of expired durable sessions.
//!
//! Sessions are replaced on refresh and deleted on logout, but a client that
//! simply stops using its tokens leaves its row behind. This task removes
//! rows whose refresh token has expired.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::AuthService;

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(auth: AuthService, every: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = every.as_secs(), "Session sweeper started");

    let mut interval = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Session sweeper stopping");
                break;
            }
            _ = interval.tick() => {
                match auth.purge_expired_sessions().await {
                    Ok(0) => tracing::debug!("Session sweep: nothing to purge"),
                    Ok(purged) => tracing::info!(purged, "Session sweep: purged expired sessions"),
                    Err(e) => tracing::error!(error = %e, "Session sweep failed"),
                }
            }
        }
    }
}
