use std::sync::Arc;
use std::time::Duration;

use avinor_common::FlightSnapshot;
use chrono::Utc;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

use super::types::{PollConfiguration, RefreshStatus};
use crate::Error;
use crate::module::REQUEST_TIMEOUT_SECONDS;
use crate::module::feed::FlightSource;

/// Poll cadence suggested by the feed documentation
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(180);

/// Data of the last successful fetch
struct LastKnownGood {
    /// As fetched, before the classifier filter
    raw: Arc<FlightSnapshot>,
    /// What was published
    filtered: Arc<FlightSnapshot>,
}

/// Refresh coordinator for one airport/direction.
///
/// Every refresh publishes a snapshot: fresh data on success, the last known
/// good snapshot on failure, or an empty one if nothing was ever fetched.
pub struct FlightCoordinator {
    source: Arc<dyn FlightSource>,
    config: PollConfiguration,
    update_interval: Duration,
    fetch_timeout: Duration,
    last_good: RwLock<Option<LastKnownGood>>,
    status: RwLock<RefreshStatus>,
    publisher: watch::Sender<Arc<FlightSnapshot>>,
}

impl FlightCoordinator {
    pub fn new(source: Arc<dyn FlightSource>, config: PollConfiguration) -> Self {
        let (publisher, _) = watch::channel(Arc::new(FlightSnapshot::empty()));
        Self {
            source,
            config,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            fetch_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECONDS),
            last_good: RwLock::new(None),
            status: RwLock::new(RefreshStatus::default()),
            publisher,
        }
    }

    pub fn with_update_interval(mut self, update_interval: Duration) -> Self {
        self.update_interval = update_interval;
        self
    }

    /// Upper bound for one fetch, on top of the HTTP client's own timeout
    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn config(&self) -> &PollConfiguration {
        &self.config
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Run the first refresh, then keep refreshing in the background.
    ///
    /// Returns once the first refresh has completed, so the coordinator is
    /// ready (possibly with degraded data) when this resolves.
    pub async fn start(self: Arc<Self>) -> CoordinatorHandle {
        info!(
            "Starting flight coordinator for {} (interval: {}s)",
            self.config.default_id(),
            self.update_interval.as_secs()
        );

        self.refresh().await;

        let coordinator = self.clone();
        let task = tokio::spawn(async move {
            coordinator.run_loop().await;
        });

        CoordinatorHandle {
            coordinator: self,
            task,
        }
    }

    /// Fetch-then-sleep, so a cycle never overlaps the previous one.
    async fn run_loop(&self) {
        loop {
            tokio::time::sleep(self.update_interval).await;
            self.refresh().await;
        }
    }

    /// One refresh cycle. Never fails; errors degrade to stale or empty data.
    pub async fn refresh(&self) -> Arc<FlightSnapshot> {
        let id = self.config.default_id();
        self.status.write().await.mark_fetching(Utc::now());

        let query = self.config.to_query();
        let result = match tokio::time::timeout(self.fetch_timeout, self.source.fetch_flights(&query)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                url: format!("flight feed for {}", id),
            }),
        };

        let snapshot = match result {
            Ok(raw) => {
                let filtered = Arc::new(raw.filtered(self.config.classifier()));
                info!(
                    "Flight refresh for {}: {} flights ({} after filter), lastUpdate {:?}",
                    id,
                    raw.flights.len(),
                    filtered.flights.len(),
                    filtered.last_update
                );

                *self.last_good.write().await = Some(LastKnownGood {
                    raw: Arc::new(raw),
                    filtered: filtered.clone(),
                });
                self.status.write().await.mark_success(Utc::now());
                filtered
            }
            Err(e) => {
                self.status.write().await.mark_failed(&e);
                match self.last_good.read().await.as_ref() {
                    Some(last) => {
                        warn!("Flight refresh for {} failed, serving last known data: {}", id, e);
                        last.filtered.clone()
                    }
                    None => {
                        error!("Flight refresh for {} failed with no previous data: {}", id, e);
                        Arc::new(FlightSnapshot::empty())
                    }
                }
            }
        };

        self.publisher.send_replace(snapshot.clone());
        snapshot
    }

    /// Most recently published snapshot
    pub fn snapshot(&self) -> Arc<FlightSnapshot> {
        self.publisher.borrow().clone()
    }

    /// Snapshot filtered with a different classifier, computed from the
    /// unfiltered data of the last successful fetch.
    pub async fn view(&self, classifier: Option<&str>) -> FlightSnapshot {
        match self.last_good.read().await.as_ref() {
            Some(last) => last.raw.filtered(classifier),
            None => self.snapshot().filtered(classifier),
        }
    }

    pub async fn status(&self) -> RefreshStatus {
        self.status.read().await.clone()
    }

    pub async fn is_ready(&self) -> bool {
        self.status.read().await.is_ready()
    }

    /// Receiver that always holds the latest published snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<FlightSnapshot>> {
        self.publisher.subscribe()
    }

    /// Stream of published snapshots, starting with the current one
    pub fn updates(&self) -> WatchStream<Arc<FlightSnapshot>> {
        WatchStream::new(self.subscribe())
    }
}

/// Owns the background refresh task of a started coordinator; dropping it
/// stops the task
pub struct CoordinatorHandle {
    coordinator: Arc<FlightCoordinator>,
    task: JoinHandle<()>,
}

impl CoordinatorHandle {
    pub fn coordinator(&self) -> &Arc<FlightCoordinator> {
        &self.coordinator
    }

    /// Stop the refresh loop. A fetch in flight is dropped.
    pub fn shutdown(self) {
        debug!(
            "Stopping flight coordinator for {}",
            self.coordinator.config.default_id()
        );
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
