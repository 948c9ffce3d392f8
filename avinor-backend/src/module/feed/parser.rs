///! Normalization of feed trees into flight and airport records

use avinor_common::{AirportRecord, FlightRecord, FlightSnapshot};
use serde_json::Value;
use tracing::debug;

use super::markup::{as_list, field, first_non_empty};

const AIRPORT_CODE_KEYS: &[&str] = &["@code", "code", "@iata", "iata"];
const AIRPORT_NAME_KEYS: &[&str] = &["@name", "name"];

/// Extract the flight snapshot from an `airport → flights → flight` tree.
///
/// Missing containers produce an empty snapshot; missing fields stay `None`.
pub fn parse_flights(document: &Value) -> FlightSnapshot {
    let flights_node = document.get("airport").and_then(|airport| airport.get("flights"));

    let last_update = flights_node.and_then(|node| field(node, "@lastUpdate"));
    let items = as_list(flights_node.and_then(|node| node.get("flight")));

    if let Some(Value::Object(first)) = items.first() {
        debug!(
            "First flight raw keys: {:?}",
            first.keys().collect::<Vec<_>>()
        );
    }

    let flights: Vec<FlightRecord> = items
        .into_iter()
        .filter(|item| {
            let is_record = item.is_object();
            if !is_record {
                debug!("Skipping non-record flight entry: {}", item);
            }
            is_record
        })
        .map(parse_flight)
        .collect();

    FlightSnapshot {
        last_update,
        flights,
    }
}

fn parse_flight(item: &Value) -> FlightRecord {
    let (status_code, status_time) = match item.get("status") {
        Some(status @ Value::Object(_)) => (
            first_non_empty(status, &["@code", "code"]),
            first_non_empty(status, &["@time", "time"]),
        ),
        _ => (None, None),
    };

    FlightRecord {
        unique_id: first_non_empty(item, &["@uniqueId", "uniqueId"]),
        airline: field(item, "airline"),
        flight_id: first_non_empty(item, &["flight_id", "flightId"]).unwrap_or_default(),
        dom_int: field(item, "dom_int"),
        schedule_time: field(item, "schedule_time"),
        arr_dep: field(item, "arr_dep"),
        airport: field(item, "airport"),
        check_in: field(item, "check_in"),
        gate: field(item, "gate"),
        status_code,
        status_time,
    }
}

/// Extract airports from either `airportNames → airportName` or the older
/// `airports → airport` layout. Invalid codes are dropped; output is sorted.
pub fn parse_airports(document: &Value) -> Vec<AirportRecord> {
    let mut items = as_list(
        document
            .get("airportNames")
            .and_then(|node| node.get("airportName")),
    );
    if items.is_empty() {
        items = as_list(document.get("airports").and_then(|node| node.get("airport")));
    }

    let mut airports: Vec<AirportRecord> = items
        .into_iter()
        .filter_map(|item| {
            let code = normalize_airport_code(&first_non_empty(item, AIRPORT_CODE_KEYS)?)?;
            let name = first_non_empty(item, AIRPORT_NAME_KEYS).unwrap_or_else(|| code.clone());
            Some(AirportRecord { code, name })
        })
        .collect();

    airports.sort_by(|a, b| a.code.cmp(&b.code));
    debug!("Parsed {} airports", airports.len());
    airports
}

/// Accept exactly three ASCII letters, returned uppercased.
pub fn normalize_airport_code(raw: &str) -> Option<String> {
    let code = raw.trim();
    if code.chars().count() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}
