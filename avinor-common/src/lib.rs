pub mod types;

pub use types::{AirportRecord, Direction, FlightDetail, FlightRecord, FlightSnapshot};
