///! Avinor XmlFeed client
///!
///! Fetches flight lists and the airport directory, converts whatever markup
///! the feed returns into a generic tree and normalizes it into stable records.

pub mod client;
pub mod markup;
pub mod parser;

pub use client::{FeedClient, FlightQuery, DEFAULT_BASE_URL};

use async_trait::async_trait;
use avinor_common::{AirportRecord, FlightSnapshot};

use crate::Result;

/// Anything able to produce one flight snapshot per call
#[async_trait]
pub trait FlightSource: Send + Sync {
    async fn fetch_flights(&self, query: &FlightQuery) -> Result<FlightSnapshot>;
}

/// Anything able to list airports; never fails, an empty list means "unavailable"
#[async_trait]
pub trait AirportSource: Send + Sync {
    async fn fetch_airports(&self) -> Vec<AirportRecord>;
}
