use serde::{Deserialize, Serialize};

/// Unstructured detail payload for a single flight, as returned by the lookup service.
pub type FlightDetail = serde_json::Map<String, serde_json::Value>;

/// Movement direction as used by the feed (`A` / `D`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "A", alias = "a")]
    Arrivals,
    #[serde(rename = "D", alias = "d")]
    Departures,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Arrivals => "A",
            Direction::Departures => "D",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" | "ARRIVALS" => Ok(Direction::Arrivals),
            "D" | "DEPARTURES" => Ok(Direction::Departures),
            other => Err(format!("Unknown direction: {}", other)),
        }
    }
}

/// One scheduled movement at an airport
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Feed-wide unique id, identity key when present
    #[serde(rename = "uniqueId")]
    pub unique_id: Option<String>,
    /// Airline code, e.g. "DY"
    pub airline: Option<String>,
    /// Flight identifier, e.g. "DY123" (empty when upstream omits it)
    #[serde(rename = "flightId", default)]
    pub flight_id: String,
    /// Domestic / international / Schengen classifier ("D", "I", "S")
    pub dom_int: Option<String>,
    /// Scheduled time, ISO-8601 as supplied upstream
    pub schedule_time: Option<String>,
    /// "A" or "D"
    pub arr_dep: Option<String>,
    /// Origin or destination airport code
    pub airport: Option<String>,
    pub check_in: Option<String>,
    pub gate: Option<String>,
    pub status_code: Option<String>,
    pub status_time: Option<String>,
}

impl FlightRecord {
    /// Exact, case-insensitive match against the classifier field.
    ///
    /// An empty filter matches everything; a flight without a classifier
    /// never matches a non-empty filter.
    pub fn matches_classifier(&self, filter: &str) -> bool {
        let filter = filter.trim();
        if filter.is_empty() {
            return true;
        }
        self.dom_int
            .as_deref()
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(filter))
    }
}

/// Result of one refresh cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightSnapshot {
    /// Feed timestamp of the data, null when the feed gave none
    #[serde(rename = "lastUpdate")]
    pub last_update: Option<String>,
    pub flights: Vec<FlightRecord>,
}

impl FlightSnapshot {
    /// Snapshot published when nothing could be fetched yet
    pub fn empty() -> Self {
        Self::default()
    }

    /// Copy of this snapshot keeping only flights matching `classifier`.
    pub fn filtered(&self, classifier: Option<&str>) -> Self {
        match classifier.map(str::trim).filter(|c| !c.is_empty()) {
            None => self.clone(),
            Some(filter) => Self {
                last_update: self.last_update.clone(),
                flights: self
                    .flights
                    .iter()
                    .filter(|flight| flight.matches_classifier(filter))
                    .cloned()
                    .collect(),
            },
        }
    }
}

/// Airport directory entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AirportRecord {
    /// IATA code, always 3 uppercase letters
    #[serde(rename = "iata")]
    pub code: String,
    pub name: String,
}

impl AirportRecord {
    pub fn new(code: &str, name: &str) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
        }
    }
}
