///! HTTP client for the Avinor flight feed
use std::time::Duration;

use async_trait::async_trait;
use avinor_common::{AirportRecord, Direction, FlightSnapshot};
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde_json::Value;

use super::{AirportSource, FlightSource, markup, parser};
use crate::module::{REQUEST_TIMEOUT_SECONDS, build_http_client};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://asrv.avinor.no";
const FLIGHTS_PATH: &str = "/XmlFeed/v1.0";
const AIRPORTS_PATH: &str = "/airportNames/v1.0";
const AIRPORTS_UNVERSIONED_PATH: &str = "/airportNames";

/// Query parameters for one flight list request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlightQuery {
    /// IATA code of the airport, e.g. "OSL"
    pub airport: String,
    pub direction: Option<Direction>,
    /// Hours back in time
    pub time_from: Option<u32>,
    /// Hours ahead in time
    pub time_to: Option<u32>,
    /// Include codeshare flights
    pub codeshare: bool,
}

impl FlightQuery {
    pub fn new(airport: &str) -> Self {
        Self {
            airport: airport.to_string(),
            direction: None,
            time_from: None,
            time_to: None,
            codeshare: false,
        }
    }

    /// Feed query string, parameters only present when set
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("airport", self.airport.clone())];
        if let Some(direction) = self.direction {
            params.push(("direction", direction.as_str().to_string()));
        }
        if let Some(time_from) = self.time_from {
            params.push(("TimeFrom", time_from.to_string()));
        }
        if let Some(time_to) = self.time_to {
            params.push(("TimeTo", time_to.to_string()));
        }
        if self.codeshare {
            params.push(("codeshare", "Y".to_string()));
        }
        params
    }
}

/// Stateless client for the flight feed and airport directory endpoints
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    base_url: String,
}

impl FeedClient {
    /// Create a client with the default 30 second request timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the flight list for `query`.
    ///
    /// Timeout, HTTP status and connection failures are returned as distinct
    /// error kinds; the caller decides how to recover.
    pub async fn fetch_flights(&self, query: &FlightQuery) -> Result<FlightSnapshot> {
        let url = format!("{}{}", self.base_url, FLIGHTS_PATH);
        let document = self.get_document(&url, &query.to_params()).await?;
        let snapshot = parser::parse_flights(&document);

        tracing::debug!(
            "Fetched {} flights for {} (lastUpdate: {:?})",
            snapshot.flights.len(),
            query.airport,
            snapshot.last_update
        );
        Ok(snapshot)
    }

    /// Fetch the airport directory.
    ///
    /// Never fails: unreachable or unparseable endpoints yield an empty list.
    pub async fn fetch_airports(&self) -> Vec<AirportRecord> {
        let mut last_error = None;

        for url in self.airport_endpoints() {
            match self.get_document(&url, &[]).await {
                Ok(document) => return parser::parse_airports(&document),
                Err(e) if e.is_not_found() => {
                    tracing::warn!("Airport endpoint 404 at {}, trying next variant", url);
                    last_error = Some(e);
                }
                Err(e @ Error::HttpStatus { .. }) => {
                    tracing::error!("Airport endpoint failed, giving up: {}", e);
                    return Vec::new();
                }
                Err(e) => {
                    tracing::debug!("Airport fetch attempt failed at {}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => tracing::error!("All airport endpoint attempts failed: {}", e),
            None => tracing::error!("No airport endpoint candidates configured"),
        }
        Vec::new()
    }

    /// Candidate URLs for the airport directory, tried in order.
    pub fn airport_endpoints(&self) -> Vec<String> {
        let primary = format!("{}{}", self.base_url, AIRPORTS_PATH);
        vec![
            primary.clone(),
            format!("{}/", primary),
            format!("{}{}", self.base_url, AIRPORTS_UNVERSIONED_PATH),
        ]
    }

    async fn get_document(&self, url: &str, params: &[(&'static str, String)]) -> Result<Value> {
        tracing::debug!("Avinor request: url={} params={:?}", url, params);

        let response = self
            .client
            .get(url)
            .query(params)
            .header(ACCEPT, "application/xml")
            .send()
            .await
            .map_err(|e| Error::from_transport(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_transport(url, e))?;

        markup::parse_document(&body)
    }
}

#[async_trait]
impl FlightSource for FeedClient {
    async fn fetch_flights(&self, query: &FlightQuery) -> Result<FlightSnapshot> {
        FeedClient::fetch_flights(self, query).await
    }
}

#[async_trait]
impl AirportSource for FeedClient {
    async fn fetch_airports(&self) -> Vec<AirportRecord> {
        FeedClient::fetch_airports(self).await
    }
}
