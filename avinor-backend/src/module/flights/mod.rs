///! Flight refresh coordination
///!
///! One coordinator per configured airport/direction: fetch, filter, keep
///! the last known good snapshot and publish it to subscribers.

pub mod coordinator;
pub mod types;

pub use coordinator::{CoordinatorHandle, FlightCoordinator, DEFAULT_UPDATE_INTERVAL};
pub use types::{CoordinatorState, PollConfiguration, RefreshStatus};
