///! Host-side registry of running coordinators, keyed by feed id
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use avinor_common::FlightSnapshot;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::FeedConfig;
use crate::module::feed::FlightSource;
use crate::module::flights::{
    CoordinatorHandle, FlightCoordinator, PollConfiguration, RefreshStatus,
};

struct RegisteredFeed {
    config: FeedConfig,
    handle: CoordinatorHandle,
}

/// Feed overview returned to consumers
#[derive(Debug, Clone, Serialize)]
pub struct FeedSummary {
    pub id: String,
    pub config: PollConfiguration,
    pub status: RefreshStatus,
    pub flight_count: usize,
}

/// Outcome of applying a feed list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplySummary {
    pub started: Vec<String>,
    pub kept: Vec<String>,
    pub stopped: Vec<String>,
}

pub struct FeedRegistry {
    source: Arc<dyn FlightSource>,
    update_interval: Duration,
    feeds: RwLock<BTreeMap<String, RegisteredFeed>>,
}

impl FeedRegistry {
    pub fn new(source: Arc<dyn FlightSource>, update_interval: Duration) -> Self {
        Self {
            source,
            update_interval,
            feeds: RwLock::new(BTreeMap::new()),
        }
    }

    /// Bring the running coordinators in line with `feeds`.
    ///
    /// Unchanged feeds keep running; changed feeds are reconstructed (first
    /// refresh included) and removed feeds are stopped.
    pub async fn apply(&self, feeds: Vec<FeedConfig>) -> ApplySummary {
        let mut summary = ApplySummary::default();

        let to_start: Vec<FeedConfig> = {
            let current = self.feeds.read().await;
            feeds
                .iter()
                .filter(|feed| {
                    let id = feed.id();
                    let unchanged = current
                        .get(&id)
                        .is_some_and(|registered| registered.config == **feed);
                    if unchanged {
                        summary.kept.push(id);
                    }
                    !unchanged
                })
                .cloned()
                .collect()
        };

        let mut started = Vec::with_capacity(to_start.len());
        for feed in to_start {
            let coordinator = FlightCoordinator::new(self.source.clone(), feed.poll.clone())
                .with_update_interval(self.update_interval);
            let handle = Arc::new(coordinator).start().await;
            started.push(RegisteredFeed {
                config: feed,
                handle,
            });
        }

        let mut current = self.feeds.write().await;

        let wanted: Vec<String> = feeds.iter().map(FeedConfig::id).collect();
        let removed: Vec<String> = current
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in removed {
            if let Some(old) = current.remove(&id) {
                old.handle.shutdown();
                info!("Stopped feed {}", id);
                summary.stopped.push(id);
            }
        }

        for registered in started {
            let id = registered.config.id();
            if let Some(old) = current.insert(id.clone(), registered) {
                old.handle.shutdown();
                info!("Reconstructed feed {} after settings change", id);
            } else {
                info!("Started feed {}", id);
            }
            summary.started.push(id);
        }

        summary
    }

    pub async fn coordinator(&self, id: &str) -> Option<Arc<FlightCoordinator>> {
        self.feeds
            .read()
            .await
            .get(id)
            .map(|registered| registered.handle.coordinator().clone())
    }

    pub async fn list(&self) -> Vec<FeedSummary> {
        let coordinators: Vec<(String, Arc<FlightCoordinator>)> = self
            .feeds
            .read()
            .await
            .iter()
            .map(|(id, registered)| (id.clone(), registered.handle.coordinator().clone()))
            .collect();

        let mut summaries = Vec::with_capacity(coordinators.len());
        for (id, coordinator) in coordinators {
            summaries.push(FeedSummary {
                id,
                config: coordinator.config().clone(),
                status: coordinator.status().await,
                flight_count: coordinator.snapshot().flights.len(),
            });
        }
        summaries
    }

    /// Flights for `config`, never an error.
    ///
    /// Served from a running coordinator polling the same feed when there is
    /// one, otherwise fetched once; failures yield an empty snapshot.
    pub async fn get_flights(&self, config: &PollConfiguration) -> FlightSnapshot {
        let running = {
            let feeds = self.feeds.read().await;
            feeds
                .values()
                .map(|registered| registered.handle.coordinator())
                .find(|coordinator| coordinator.config().same_feed(config))
                .cloned()
        };

        if let Some(coordinator) = running {
            return coordinator.view(config.classifier()).await;
        }

        match self.source.fetch_flights(&config.to_query()).await {
            Ok(snapshot) => snapshot.filtered(config.classifier()),
            Err(e) => {
                warn!("One-off flight fetch for {} failed: {}", config.default_id(), e);
                FlightSnapshot::empty()
            }
        }
    }

    /// Stop every coordinator
    pub async fn shutdown(&self) {
        let mut feeds = self.feeds.write().await;
        for (id, registered) in std::mem::take(&mut *feeds) {
            registered.handle.shutdown();
            info!("Stopped feed {}", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::feed::FlightQuery;
    use async_trait::async_trait;
    use avinor_common::{Direction, FlightRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Returns one flight per call, tagged with the requested airport
    struct EchoSource {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl FlightSource for EchoSource {
        async fn fetch_flights(&self, query: &FlightQuery) -> crate::Result<FlightSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(crate::Error::Timeout {
                    url: "http://feed".to_string(),
                });
            }
            Ok(FlightSnapshot {
                last_update: Some("2025-01-01T12:00:00Z".to_string()),
                flights: vec![
                    FlightRecord {
                        flight_id: format!("{}-D", query.airport),
                        dom_int: Some("D".to_string()),
                        ..Default::default()
                    },
                    FlightRecord {
                        flight_id: format!("{}-I", query.airport),
                        dom_int: Some("I".to_string()),
                        ..Default::default()
                    },
                ],
            })
        }
    }

    fn source(fail: bool) -> Arc<EchoSource> {
        Arc::new(EchoSource {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn feed(airport: &str, direction: Direction) -> FeedConfig {
        FeedConfig {
            id: None,
            poll: PollConfiguration::new(airport, Some(direction)),
        }
    }

    #[tokio::test]
    async fn test_apply_starts_keeps_and_stops() {
        let source = source(false);
        let registry = FeedRegistry::new(source.clone(), Duration::from_secs(180));

        let summary = registry
            .apply(vec![feed("OSL", Direction::Departures), feed("BGO", Direction::Arrivals)])
            .await;
        assert_eq!(summary.started, vec!["OSL_D".to_string(), "BGO_A".to_string()]);
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        // Settings change on OSL_D, BGO_A removed, TRD_A added
        let mut changed = feed("OSL", Direction::Departures);
        changed.poll.flight_type = "I".to_string();
        let summary = registry
            .apply(vec![changed, feed("TRD", Direction::Arrivals)])
            .await;
        assert_eq!(summary.started, vec!["OSL_D".to_string(), "TRD_A".to_string()]);
        assert_eq!(summary.stopped, vec!["BGO_A".to_string()]);
        assert!(summary.kept.is_empty());

        let oslo = registry.coordinator("OSL_D").await.unwrap();
        assert_eq!(oslo.snapshot().flights.len(), 1);
        assert_eq!(oslo.snapshot().flights[0].flight_id, "OSL-I");
        assert!(registry.coordinator("BGO_A").await.is_none());

        let summary = registry
            .apply(vec![
                {
                    let mut same = feed("OSL", Direction::Departures);
                    same.poll.flight_type = "I".to_string();
                    same
                },
                feed("TRD", Direction::Arrivals),
            ])
            .await;
        assert_eq!(summary.kept.len(), 2);
        assert!(summary.started.is_empty());

        let ids: Vec<String> = registry.list().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["OSL_D".to_string(), "TRD_A".to_string()]);

        registry.shutdown().await;
        assert!(registry.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_flights_uses_running_coordinator() {
        let source = source(false);
        let registry = FeedRegistry::new(source.clone(), Duration::from_secs(180));
        registry.apply(vec![feed("OSL", Direction::Departures)]).await;

        let mut query = PollConfiguration::new("OSL", Some(Direction::Departures));
        query.flight_type = "d".to_string();
        let snapshot = registry.get_flights(&query).await;

        assert_eq!(snapshot.flights.len(), 1);
        assert_eq!(snapshot.flights[0].flight_id, "OSL-D");
        // Served from the coordinator's cached data
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_flights_one_off_fetch_absorbs_errors() {
        let registry = FeedRegistry::new(source(true), Duration::from_secs(180));
        let snapshot = registry
            .get_flights(&PollConfiguration::new("SVG", None))
            .await;
        assert_eq!(snapshot, FlightSnapshot::empty());

        let registry = FeedRegistry::new(source(false), Duration::from_secs(180));
        let snapshot = registry
            .get_flights(&PollConfiguration::new("SVG", None))
            .await;
        assert_eq!(snapshot.flights.len(), 2);
    }
}
