use avinor_common::Direction;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::module::feed::FlightQuery;
use crate::module::feed::parser::normalize_airport_code;
use crate::{Error, Result};

/// Largest window the feed accepts, in hours
pub const MAX_WINDOW_HOURS: u32 = 72;

/// What a coordinator polls for; immutable for the lifetime of a coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfiguration {
    /// IATA code, e.g. "OSL"
    pub airport: String,

    #[serde(default)]
    pub direction: Option<Direction>,

    /// Hours back in time
    #[serde(default = "default_time_from")]
    pub time_from: u32,

    /// Hours ahead in time
    #[serde(default = "default_time_to")]
    pub time_to: u32,

    /// Classifier filter on `dom_int` (D/I/S), empty means all flights
    #[serde(default)]
    pub flight_type: String,

    #[serde(default)]
    pub codeshare: bool,
}

fn default_time_from() -> u32 {
    1
}

fn default_time_to() -> u32 {
    7
}

impl PollConfiguration {
    pub fn new(airport: &str, direction: Option<Direction>) -> Self {
        Self {
            airport: airport.to_string(),
            direction,
            time_from: default_time_from(),
            time_to: default_time_to(),
            flight_type: String::new(),
            codeshare: false,
        }
    }

    /// Check ranges and normalize the airport code to uppercase.
    pub fn validate(mut self) -> Result<Self> {
        self.airport = normalize_airport_code(&self.airport).ok_or_else(|| {
            Error::validation(format!(
                "Airport must be a 3-letter IATA code, got '{}'",
                self.airport
            ))
        })?;

        for (name, value) in [("time_from", self.time_from), ("time_to", self.time_to)] {
            if value > MAX_WINDOW_HOURS {
                return Err(Error::validation(format!(
                    "{} must be between 0 and {} hours, got {}",
                    name, MAX_WINDOW_HOURS, value
                )));
            }
        }

        self.flight_type = self.flight_type.trim().to_string();
        Ok(self)
    }

    /// Classifier filter, `None` when every flight passes
    pub fn classifier(&self) -> Option<&str> {
        let filter = self.flight_type.trim();
        (!filter.is_empty()).then_some(filter)
    }

    pub fn to_query(&self) -> FlightQuery {
        FlightQuery {
            airport: self.airport.clone(),
            direction: self.direction,
            time_from: Some(self.time_from),
            time_to: Some(self.time_to),
            codeshare: self.codeshare,
        }
    }

    /// Same feed request, ignoring the classifier filter
    pub fn same_feed(&self, other: &PollConfiguration) -> bool {
        self.to_query() == other.to_query()
    }

    /// Default registry key, e.g. "OSL_D"
    pub fn default_id(&self) -> String {
        match self.direction {
            Some(direction) => format!("{}_{}", self.airport, direction),
            None => self.airport.clone(),
        }
    }
}

/// Coordinator life cycle: Idle → Fetching → Succeeded | Failed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Idle,
    Fetching,
    Succeeded,
    Failed,
}

/// Bookkeeping of refresh attempts
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStatus {
    pub state: CoordinatorState,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Finished refresh cycles, successful or not
    pub completed_cycles: u64,
}

impl RefreshStatus {
    pub fn mark_fetching(&mut self, now: DateTime<Utc>) {
        self.state = CoordinatorState::Fetching;
        self.last_attempt = Some(now);
    }

    pub fn mark_success(&mut self, now: DateTime<Utc>) {
        self.state = CoordinatorState::Succeeded;
        self.last_success = Some(now);
        self.consecutive_failures = 0;
        self.last_error = None;
        self.completed_cycles += 1;
    }

    /// Keeps `last_success` untouched
    pub fn mark_failed(&mut self, error: &Error) {
        self.state = CoordinatorState::Failed;
        self.consecutive_failures += 1;
        self.last_error = Some(error.to_string());
        self.completed_cycles += 1;
    }

    /// Ready once the first refresh finished, successfully or not
    pub fn is_ready(&self) -> bool {
        self.completed_cycles > 0
    }
}
