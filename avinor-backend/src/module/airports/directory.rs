use std::sync::Arc;

use avinor_common::AirportRecord;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::module::feed::AirportSource;
use crate::module::feed::parser::normalize_airport_code;

pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Fetches with fewer entries than this are treated as failed
const MIN_DIRECTORY_SIZE: usize = 5;

/// Well-known airports served when the directory cannot be fetched
const FALLBACK_AIRPORTS: &[(&str, &str)] = &[
    ("BGO", "Bergen Lufthavn"),
    ("OSL", "Oslo Lufthavn"),
    ("SVG", "Stavanger Lufthavn"),
    ("TRD", "Trondheim Lufthavn"),
];

/// Get the static fallback list, sorted by code
pub fn fallback_airports() -> Vec<AirportRecord> {
    FALLBACK_AIRPORTS
        .iter()
        .map(|(code, name)| AirportRecord::new(code, name))
        .collect()
}

struct CachedDirectory {
    airports: Vec<AirportRecord>,
    fetched_at: DateTime<Utc>,
}

/// Airport directory cache, shareable between coordinators
pub struct AirportDirectory {
    source: Arc<dyn AirportSource>,
    ttl: Duration,
    cache: RwLock<Option<CachedDirectory>>,
}

impl AirportDirectory {
    pub fn new(source: Arc<dyn AirportSource>) -> Self {
        Self::with_ttl(source, Duration::hours(DEFAULT_CACHE_TTL_HOURS))
    }

    pub fn with_ttl(source: Arc<dyn AirportSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Cached airport list, refreshed when stale
    pub async fn get_airports(&self) -> Vec<AirportRecord> {
        self.fetch_with_cache(Utc::now()).await
    }

    /// Serve the cache when it is fresh and larger than the fallback list,
    /// otherwise fetch again. Never fails.
    pub async fn fetch_with_cache(&self, now: DateTime<Utc>) -> Vec<AirportRecord> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            let age = now.signed_duration_since(cached.fetched_at);
            if cached.airports.len() > FALLBACK_AIRPORTS.len() && age < self.ttl {
                debug!(
                    "Serving {} cached airports (age: {} min)",
                    cached.airports.len(),
                    age.num_minutes()
                );
                return cached.airports.clone();
            }
        }

        let fetched = self.source.fetch_airports().await;
        let airports = if fetched.len() < MIN_DIRECTORY_SIZE {
            warn!(
                "Airport directory returned {} entries, using fallback list",
                fetched.len()
            );
            fallback_airports()
        } else {
            info!("Fetched {} airports", fetched.len());
            fetched
        };

        *self.cache.write().await = Some(CachedDirectory {
            airports: airports.clone(),
            fetched_at: now,
        });
        airports
    }

    /// Whether `code` is a known airport; checked for requested and configured feeds
    pub async fn contains(&self, code: &str) -> bool {
        let Some(code) = normalize_airport_code(code) else {
            return false;
        };
        self.get_airports().await.iter().any(|airport| airport.code == code)
    }

    /// Drop the cached entry so the next call fetches again
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        airports: Vec<AirportRecord>,
        calls: AtomicUsize,
    }

    impl CountingSource {
        fn new(codes: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                airports: codes.iter().map(|code| AirportRecord::new(code, code)).collect(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl AirportSource for CountingSource {
        async fn fetch_airports(&self) -> Vec<AirportRecord> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.airports.clone()
        }
    }

    const FULL: &[&str] = &["AES", "BGO", "BOO", "OSL", "SVG", "TOS", "TRD"];

    #[test]
    fn test_fallback_list_sorted() {
        let fallback = fallback_airports();
        assert_eq!(fallback.len(), 4);
        assert!(fallback.windows(2).all(|pair| pair[0].code < pair[1].code));
        assert!(fallback.iter().any(|a| a.code == "OSL" && a.name == "Oslo Lufthavn"));
    }

    #[tokio::test]
    async fn test_small_result_replaced_by_fallback() {
        let source = CountingSource::new(&["OSL", "BGO", "TRD", "SVG"]);
        let directory = AirportDirectory::new(source.clone());

        let airports = directory.get_airports().await;
        assert_eq!(airports, fallback_airports());

        // Fallback is not worth keeping: the next call fetches again
        directory.get_airports().await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_result_replaced_by_fallback() {
        let directory = AirportDirectory::new(CountingSource::new(&[]));
        assert_eq!(directory.get_airports().await, fallback_airports());
    }

    #[tokio::test]
    async fn test_fresh_cache_is_reused() {
        let source = CountingSource::new(FULL);
        let directory = AirportDirectory::new(source.clone());
        let start = Utc::now();

        let first = directory.fetch_with_cache(start).await;
        let second = directory.fetch_with_cache(start + Duration::hours(23)).await;

        assert_eq!(first.len(), FULL.len());
        assert_eq!(first, second);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_is_refetched() {
        let source = CountingSource::new(FULL);
        let directory = AirportDirectory::new(source.clone());
        let start = Utc::now();

        directory.fetch_with_cache(start).await;
        directory.fetch_with_cache(start + Duration::hours(24)).await;
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_contains() {
        let source = CountingSource::new(FULL);
        let directory = AirportDirectory::new(source.clone());

        assert!(directory.contains("tos").await);
        assert!(!directory.contains("XYZ").await);
        assert!(!directory.contains("TOSS").await);
        assert_eq!(source.calls(), 1);

        directory.invalidate().await;
        directory.get_airports().await;
        assert_eq!(source.calls(), 2);
    }
}
