///! Airport directory with a time-based cache and static fallback

pub mod directory;

pub use directory::{AirportDirectory, DEFAULT_CACHE_TTL_HOURS, fallback_airports};
