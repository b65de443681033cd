//! Bearer token reuse

use pfind_core::{AuthProvider, Error, Result};
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Caches the token produced by an [`AuthProvider`] for a fixed TTL.
///
/// Minting through gcloud spawns a process, so one token is shared by every
/// request until it ages out or a request is rejected with 401. The lock is
/// never held while a token is minted.
pub struct TokenCache {
    provider: AuthProvider,
    ttl: Duration,
    cached: RwLock<Option<(String, Instant)>>,
}

impl TokenCache {
    pub fn new(provider: AuthProvider, ttl: Duration) -> Self {
        Self {
            provider,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// A usable bearer token.
    ///
    /// Credential failures are reported as [`Error::StoreUnavailable`] since
    /// the store cannot be reached without them.
    pub async fn token(&self) -> Result<String> {
        self.cached_or_mint(|| async {
            let token = self.provider.access_token().await.map_err(|e| match e {
                Error::Auth(msg) => Error::unavailable(format!("no Google credentials: {}", msg)),
                other => other,
            })?;
            tracing::debug!(provider = self.provider.provider_name(), "minted access token");
            Ok(token)
        })
        .await
    }

    async fn cached_or_mint<F, Fut>(&self, mint: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        {
            let cached = self.cached.read().await;
            if let Some((token, minted_at)) = cached.as_ref()
                && minted_at.elapsed() < self.ttl
            {
                return Ok(token.clone());
            }
        }

        let token = mint().await?;
        *self.cached.write().await = Some((token.clone(), Instant::now()));
        Ok(token)
    }

    /// Forget the cached token; the next call mints a fresh one.
    pub async fn invalidate(&self) {
        self.cached.write().await.take();
    }
}
