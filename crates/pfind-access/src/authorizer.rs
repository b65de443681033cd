//! Cached allow-list checks

use crate::source::{AllowlistSource, normalize_identity};
use pfind_core::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CachedList {
    users: HashSet<String>,
    fetched_at: Instant,
}

/// Answers "may this identity use pfind?" from a cached allow-list.
///
/// The list is refetched once it is older than the TTL. When a fetch fails,
/// every identity is refused until a later fetch succeeds.
pub struct Authorizer {
    source: Arc<dyn AllowlistSource>,
    ttl: Duration,
    cache: RwLock<Option<CachedList>>,
}

impl Authorizer {
    pub fn new(source: Arc<dyn AllowlistSource>) -> Self {
        Self {
            source,
            ttl: Duration::from_secs(300),
            cache: RwLock::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Case-insensitive membership test.
    pub async fn is_authorized(&self, identity: &str) -> bool {
        let Some(identity) = normalize_identity(identity) else {
            return false;
        };

        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref()
                && cached.fetched_at.elapsed() < self.ttl
            {
                return cached.users.contains(&identity);
            }
        }

        match self.refresh().await {
            Ok(users) => users.contains(&identity),
            Err(e) => {
                tracing::error!(
                    source = %self.source.describe(),
                    error = %e,
                    "failed to fetch allow-list, denying access"
                );
                false
            }
        }
    }

    /// Fetch the list now, replacing the cache.
    ///
    /// No lock is held while the source is fetched. A slower fetch that
    /// finishes after a newer one does not overwrite the newer list.
    pub async fn refresh(&self) -> Result<HashSet<String>> {
        let started = Instant::now();
        let raw = match self.source.fetch().await {
            Ok(raw) => raw,
            Err(e) => {
                self.cache.write().await.take();
                return Err(e);
            }
        };
        let users: HashSet<String> = raw.iter().filter_map(|u| normalize_identity(u)).collect();

        tracing::debug!(
            source = %self.source.describe(),
            entries = users.len(),
            "allow-list refreshed"
        );
        let mut cache = self.cache.write().await;
        let newer_cached = cache
            .as_ref()
            .is_some_and(|cached| cached.fetched_at > started);
        if !newer_cached {
            *cache = Some(CachedList {
                users: users.clone(),
                fetched_at: started,
            });
        }
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StaticAllowlist;
    use async_trait::async_trait;
    use pfind_core::Error;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    struct CountingSource {
        calls: AtomicU32,
        fail: bool,
    }

    #[async_trait]
    impl AllowlistSource for CountingSource {
        async fn fetch(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::unavailable("sheets API down"))
            } else {
                Ok(vec!["User@StonyBrook.edu".to_string(), "  ".to_string()])
            }
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[tokio::test]
    async fn test_case_insensitive_match() {
        let authorizer = Authorizer::new(Arc::new(StaticAllowlist::new([
            "user@stonybrook.edu",
            "ADMIN@stonybrook.edu",
        ])));

        assert!(authorizer.is_authorized("User@StonyBrook.edu").await);
        assert!(authorizer.is_authorized(" admin@stonybrook.edu ").await);
        assert!(!authorizer.is_authorized("intruder@example.com").await);
        assert!(!authorizer.is_authorized("").await);
    }

    #[tokio::test]
    async fn test_list_is_cached_within_ttl() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let authorizer = Authorizer::new(source.clone()).with_ttl(Duration::from_secs(60));

        assert!(authorizer.is_authorized("user@stonybrook.edu").await);
        assert!(!authorizer.is_authorized("other@stonybrook.edu").await);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_cache_refetches() {
        let source = Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail: false,
        });
        let authorizer = Authorizer::new(source.clone()).with_ttl(Duration::ZERO);

        authorizer.is_authorized("user@stonybrook.edu").await;
        authorizer.is_authorized("user@stonybrook.edu").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_denies() {
        let authorizer = Authorizer::new(Arc::new(CountingSource {
            calls: AtomicU32::new(0),
            fail: true,
        }));

        assert!(!authorizer.is_authorized("user@stonybrook.edu").await);
        assert!(authorizer.refresh().await.is_err());
    }

    /// Tracks how many fetches are in flight at once.
    struct SlowSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl AllowlistSource for SlowSource {
        async fn fetch(&self) -> Result<Vec<String>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(vec!["user@stonybrook.edu".to_string()])
        }

        fn describe(&self) -> String {
            "slow".to_string()
        }
    }

    #[tokio::test]
    async fn test_overlapping_refreshes_run_concurrently() {
        let source = Arc::new(SlowSource {
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let authorizer = Authorizer::new(source.clone()).with_ttl(Duration::ZERO);

        let results = tokio::join!(
            authorizer.is_authorized("user@stonybrook.edu"),
            authorizer.is_authorized("user@stonybrook.edu"),
            authorizer.is_authorized("other@stonybrook.edu"),
        );

        assert_eq!(results, (true, true, false));
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 3);
    }
}
