use std::time::Duration;

use avinor_common::FlightDetail;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::module::{REQUEST_TIMEOUT_SECONDS, build_http_client};
use crate::{Error, Result};

pub const DEFAULT_DETAIL_BASE_URL: &str = "https://api.aviationstack.com/v1";
const DETAIL_PATH: &str = "/flight";
const RESPONSE_KEY: &str = "response";

/// Identifiers accepted by the detail endpoint; the first non-blank one is used
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightIdentifiers {
    #[serde(default)]
    pub flight_iata: Option<String>,
    #[serde(default)]
    pub flight_icao: Option<String>,
    #[serde(default)]
    pub flight_number: Option<String>,
}

impl FlightIdentifiers {
    pub fn iata(code: &str) -> Self {
        Self {
            flight_iata: Some(code.to_string()),
            ..Default::default()
        }
    }

    /// Query parameter to send, by priority IATA → ICAO → number.
    pub fn selected(&self) -> Option<(&'static str, String)> {
        [
            ("flight_iata", &self.flight_iata),
            ("flight_icao", &self.flight_icao),
            ("flight_number", &self.flight_number),
        ]
        .into_iter()
        .find_map(|(param, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then(|| (param, value.to_string()))
        })
    }
}

/// Stateless client for one-shot flight detail lookups
#[derive(Debug, Clone)]
pub struct DetailClient {
    client: Client,
    base_url: String,
}

impl DetailClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Look up one flight. The API key is sent as a query parameter and never logged.
    pub async fn fetch_flight_detail(
        &self,
        api_key: &str,
        identifiers: &FlightIdentifiers,
    ) -> Result<FlightDetail> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(Error::validation("An API key is required for flight detail lookups"));
        }
        let (param, value) = identifiers.selected().ok_or_else(|| {
            Error::validation("One of flight_iata, flight_icao or flight_number is required")
        })?;

        let url = format!("{}{}", self.base_url, DETAIL_PATH);
        tracing::debug!("Flight detail request: url={} {}={}", url, param, value);

        let response = self
            .client
            .get(&url)
            .query(&[("api_key", api_key), (param, value.as_str())])
            .send()
            .await
            .map_err(|e| Error::from_transport(&url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::from_transport(&url, e))?;
        let body: Value = serde_json::from_str(&body)
            .map_err(|e| Error::parse(format!("Invalid JSON from detail service: {}", e)))?;

        interpret_detail_body(body)
    }
}

/// Turn a decoded detail response into a result.
///
/// An `error` indicator becomes [`Error::Remote`]; a `response` field is
/// unwrapped; otherwise the body itself is the detail.
pub fn interpret_detail_body(body: Value) -> Result<FlightDetail> {
    if let Some(message) = remote_error_message(&body) {
        tracing::warn!("Detail service reported an error: {}", message);
        return Err(Error::Remote { message });
    }

    let detail = match body {
        Value::Object(mut map) => match map.remove(RESPONSE_KEY) {
            Some(Value::Object(response)) => response,
            Some(Value::Null) | None => map,
            Some(other) => wrap(other),
        },
        other => wrap(other),
    };
    Ok(detail)
}

fn wrap(value: Value) -> FlightDetail {
    let mut map = Map::new();
    map.insert(RESPONSE_KEY.to_string(), value);
    map
}

fn remote_error_message(body: &Value) -> Option<String> {
    let error = match body.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => return None,
        Some(error) => error,
    };

    let non_empty = |value: Option<&Value>| {
        value
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let message = non_empty(body.get("message"))
        .or_else(|| non_empty(error.get("message")))
        .or_else(|| non_empty(error.get("info")))
        .or_else(|| non_empty(Some(error)))
        .unwrap_or_else(|| error.to_string());
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_selected_identifier_priority() {
        let ids = FlightIdentifiers {
            flight_iata: Some("  ".to_string()),
            flight_icao: Some(" NOZ123 ".to_string()),
            flight_number: Some("123".to_string()),
        };
        assert_eq!(ids.selected(), Some(("flight_icao", "NOZ123".to_string())));
        assert_eq!(FlightIdentifiers::default().selected(), None);
        assert_eq!(
            FlightIdentifiers::iata("DY123").selected(),
            Some(("flight_iata", "DY123".to_string()))
        );
    }

    #[test]
    fn test_error_payload_is_remote_error() {
        let err = interpret_detail_body(json!({"error": "x", "message": "Bad request"})).unwrap_err();
        match err {
            Error::Remote { message } => assert_eq!(message, "Bad request"),
            other => panic!("expected Remote error, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_error_object_message() {
        let body = json!({"error": {"code": "invalid_access_key", "message": "Invalid key"}});
        let err = interpret_detail_body(body).unwrap_err();
        assert!(matches!(err, Error::Remote { ref message } if message == "Invalid key"));

        let err = interpret_detail_body(json!({"error": "quota exceeded"})).unwrap_err();
        assert!(matches!(err, Error::Remote { ref message } if message == "quota exceeded"));
    }

    #[test]
    fn test_response_field_is_unwrapped() {
        let detail = interpret_detail_body(json!({
            "request": {"lang": "en"},
            "response": {"flight_iata": "DY123"}
        }))
        .unwrap();
        assert_eq!(Value::Object(detail), json!({"flight_iata": "DY123"}));
    }

    #[test]
    fn test_non_mapping_response_is_wrapped() {
        let detail = interpret_detail_body(json!({"response": [1, 2]})).unwrap();
        assert_eq!(Value::Object(detail), json!({"response": [1, 2]}));
    }

    #[test]
    fn test_body_without_response_is_returned_whole() {
        let detail = interpret_detail_body(json!({"flight_iata": "DY123", "error": null})).unwrap();
        assert_eq!(detail.get("flight_iata"), Some(&json!("DY123")));
    }

    #[tokio::test]
    async fn test_validation_errors_before_any_request() {
        // Nothing listens here; validation must fail first
        let client = DetailClient::new("http://127.0.0.1:9").unwrap();

        let err = client
            .fetch_flight_detail("key", &FlightIdentifiers {
                flight_iata: Some(" ".to_string()),
                flight_icao: Some(String::new()),
                flight_number: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));

        let err = client
            .fetch_flight_detail("   ", &FlightIdentifiers::iata("DY123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
    }

    #[tokio::test]
    async fn test_fetch_flight_detail_roundtrip() {
        let router = Router::new().route(
            "/flight",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                if params.get("api_key").map(String::as_str) != Some("secret") {
                    return Json(json!({"error": "auth", "message": "Invalid API key"}));
                }
                Json(json!({
                    "request": {"flight_iata": params.get("flight_iata")},
                    "response": {"flight_iata": params.get("flight_iata"), "status": "active"}
                }))
            }),
        );
        let client = DetailClient::new(serve(router).await).unwrap();

        let detail = client
            .fetch_flight_detail("secret", &FlightIdentifiers::iata("DY123"))
            .await
            .unwrap();
        assert_eq!(detail.get("flight_iata"), Some(&json!("DY123")));
        assert_eq!(detail.get("status"), Some(&json!("active")));

        let err = client
            .fetch_flight_detail("wrong", &FlightIdentifiers::iata("DY123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Remote { ref message } if message == "Invalid API key"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_http_status_error() {
        let router = Router::new().route(
            "/flight",
            get(|| async { (StatusCode::UNAUTHORIZED, Json(json!({"message": "no"}))) }),
        );
        let client = DetailClient::new(serve(router).await).unwrap();

        let err = client
            .fetch_flight_detail("secret", &FlightIdentifiers::iata("DY123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::HttpStatus { status: 401, .. }));
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_non_json_body_is_parse_error() {
        let router = Router::new().route("/flight", get(|| async { "<html>maintenance</html>" }));
        let client = DetailClient::new(serve(router).await).unwrap();

        let err = client
            .fetch_flight_detail("secret", &FlightIdentifiers::iata("DY123"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }
}
