//! In-memory access-token cache keyed by (provider, refresh credential).
//!
//! Entries are never persisted; losing them on restart is fine because a
//! fresh refresh is always possible from the durable refresh credential.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ApiError;
use crate::providers::TokenProvider;

/// A token within this margin of expiry is treated as stale so it cannot
/// expire mid-request after being handed out.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now + Duration::seconds(EXPIRY_MARGIN_SECS)
    }
}

/// What callers get back from [`TokenCache::get_access_token`].
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub access_token: String,
    /// Set when the provider rotated the refresh credential on this call.
    /// The caller must persist it over the stored credential; the old value
    /// is dead at the provider.
    pub rotated_refresh_token: Option<String>,
}

type TokenSlot = Arc<Mutex<Option<CachedToken>>>;

/// Process-local token cache with per-key single-flight refresh.
///
/// Constructed once at startup and shared through `AppState`. Each cache key
/// owns a `tokio::sync::Mutex` slot; a refresh happens while holding that
/// slot's lock, so concurrent callers for the same credential serialize on
/// the slot and re-check freshness instead of issuing their own refresh.
pub struct TokenCache {
    slots: Mutex<HashMap<String, TokenSlot>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Stable cache key: sha256 over provider id and refresh credential, so
    /// the raw credential never sits in a map key.
    fn cache_key(provider_id: &str, refresh_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(provider_id.as_bytes());
        hasher.update(b":");
        hasher.update(refresh_token.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    async fn slot(&self, key: &str) -> TokenSlot {
        let mut slots = self.slots.lock().await;
        slots.entry(key.to_string()).or_default().clone()
    }

    /// Return a valid access token for the credential, refreshing through
    /// the provider only when the cached token is missing or within the
    /// expiry margin.
    pub async fn get_access_token(
        &self,
        provider: &dyn TokenProvider,
        refresh_token: &str,
    ) -> Result<AccessGrant, ApiError> {
        let key = Self::cache_key(provider.id(), refresh_token);
        let slot = self.slot(&key).await;
        let mut guard = slot.lock().await;

        // A concurrent caller may have refreshed while we waited on the slot.
        if let Some(cached) = guard.as_ref() {
            if cached.is_fresh(Utc::now()) {
                debug!(provider = provider.id(), "token cache hit");
                return Ok(AccessGrant {
                    access_token: cached.access_token.clone(),
                    rotated_refresh_token: None,
                });
            }
        }

        debug!(provider = provider.id(), "token cache miss, refreshing");
        let refreshed = match provider.refresh(refresh_token).await {
            Ok(refreshed) => refreshed,
            Err(e) => {
                // Failed refresh invalidates whatever was cached for this
                // credential; no automatic retry.
                *guard = None;
                self.slots.lock().await.remove(&key);
                return Err(e);
            }
        };

        let cached = CachedToken {
            access_token: refreshed.access_token.clone(),
            expires_at: refreshed.expires_at,
        };
        *guard = Some(cached.clone());

        let rotated = refreshed
            .new_refresh_token
            .filter(|rt| rt != refresh_token);

        if let Some(new_token) = &rotated {
            // Re-key the fresh entry under the rotated credential so the
            // caller's next lookup (with the persisted new value) is a hit,
            // and drop the entry for the now-dead credential.
            let new_key = Self::cache_key(provider.id(), new_token);
            let mut slots = self.slots.lock().await;
            slots.insert(new_key, Arc::new(Mutex::new(Some(cached))));
            slots.remove(&key);
        }

        Ok(AccessGrant {
            access_token: refreshed.access_token,
            rotated_refresh_token: rotated,
        })
    }

    /// Drop any cached token for the credential.
    pub async fn invalidate(&self, provider_id: &str, refresh_token: &str) {
        let key = Self::cache_key(provider_id, refresh_token);
        self.slots.lock().await.remove(&key);
    }

    #[cfg(test)]
    async fn entry_count(&self) -> usize {
        self.slots.lock().await.len()
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
