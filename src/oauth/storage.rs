//! OAuth Token Storage
//!
//! Keeps the current access token in memory and refreshes it when its
//! reuse window has elapsed. Failed exchanges are never stored.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::client::TokenSource;
use crate::Result;

/// A cached access token with its local expiry
#[derive(Debug, Clone)]
pub struct TokenInfo {
    /// Bearer token
    pub access_token: String,
    /// When this token stops being reused
    pub expires_at: Instant,
}

impl TokenInfo {
    /// Check if the token is past its reuse window
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// Time until the token is refreshed
    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Single-slot token cache shared by every upstream request.
///
/// Concurrent callers that all find the slot empty may each refresh; the
/// last successful write wins.
pub struct TokenCache {
    source: Arc<dyn TokenSource>,
    /// Upper bound on how long a token is reused
    ttl: Duration,
    current: RwLock<Option<TokenInfo>>,
    refreshes: AtomicU64,
}

impl TokenCache {
    /// Create an empty cache over a token source
    pub fn new(source: Arc<dyn TokenSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            current: RwLock::new(None),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Get a valid access token, exchanging credentials if needed
    pub async fn get_token(&self) -> Result<TokenInfo> {
        {
            let token = self.current.read();
            if let Some(ref t) = *token {
                if !t.is_expired() {
                    return Ok(t.clone());
                }
            }
        }

        debug!("Access token missing or expired, refreshing");
        self.refresh().await
    }

    /// Exchange credentials for a new token and store it
    pub async fn refresh(&self) -> Result<TokenInfo> {
        self.refreshes.fetch_add(1, Ordering::Relaxed);

        let issued = match self.source.fetch_token().await {
            Ok(issued) => issued,
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return Err(e);
            }
        };

        let lifetime = issued
            .expires_in
            .map_or(self.ttl, |server_ttl| server_ttl.min(self.ttl));

        let token = TokenInfo {
            access_token: issued.access_token,
            expires_at: Instant::now() + lifetime,
        };
        *self.current.write() = Some(token.clone());

        info!(reuse_for = ?lifetime, "Access token cached");
        Ok(token)
    }

    /// Drop the cached token so the next call refreshes
    pub fn invalidate(&self) {
        if self.current.write().take().is_some() {
            debug!("Cached access token cleared");
        }
    }

    /// Check if a non-expired token is cached
    pub fn has_valid_token(&self) -> bool {
        self.current.read().as_ref().is_some_and(|t| !t.is_expired())
    }

    /// Number of token exchanges attempted so far
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }
}
