///! Flight detail lookup against an aviationstack-style JSON service

pub mod client;

pub use client::{DetailClient, FlightIdentifiers, DEFAULT_DETAIL_BASE_URL, interpret_detail_body};
