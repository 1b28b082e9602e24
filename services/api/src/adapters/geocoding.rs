//! services/api/src/adapters/geocoding.rs
//!
//! This module contains the reverse-geocoding adapters.
//! Both implement the `PlaceLookup` port from the core crate.

use async_trait::async_trait;
use serde::Deserialize;
use slideshow_core::ports::{PlaceLookup, PortError, PortResult};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const GEOCODE_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/geocode/json";
/// Upper bound on one geocode request, connect included.
pub const GEOCODE_TIMEOUT: Duration = Duration::from_secs(10);
const CITY_TYPE: &str = "locality";
const STATE_TYPE: &str = "administrative_area_level_1";

//=========================================================================================
// Google Geocoding Response
//=========================================================================================

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    results: Vec<GeocodeResult>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    #[serde(default)]
    address_components: Vec<AddressComponent>,
}

#[derive(Debug, Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    #[serde(default)]
    types: Vec<String>,
}

/// `"{city}, {state}"` from the most specific result, if both parts are present.
fn place_from_response(response: &GeocodeResponse) -> Option<String> {
    if response.status != "OK" {
        return None;
    }
    let components = &response.results.first()?.address_components;
    let of_type = |kind: &str| components.iter().find(|c| c.types.iter().any(|t| t == kind));

    let city = &of_type(CITY_TYPE)?.long_name;
    let state = &of_type(STATE_TYPE)?.short_name;
    Some(format!("{}, {}", city, state))
}

//=========================================================================================
// Google Adapter
//=========================================================================================

/// A `PlaceLookup` backed by the Google Maps Geocoding API.
#[derive(Clone)]
pub struct GooglePlaceLookup {
    http: reqwest::Client,
    endpoint: Url,
    api_key: String,
}

impl GooglePlaceLookup {
    /// A request that takes longer than `timeout` fails as a transport error.
    pub fn new(api_key: String, timeout: Duration) -> PortResult<Self> {
        let endpoint = Url::parse(GEOCODE_ENDPOINT)
            .map_err(|e| PortError::Unexpected(format!("Invalid geocode endpoint: {}", e)))?;
        Self::with_endpoint(endpoint, api_key, timeout)
    }

    fn with_endpoint(endpoint: Url, api_key: String, timeout: Duration) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl PlaceLookup for GooglePlaceLookup {
    async fn lookup(&self, latitude: f64, longitude: f64) -> PortResult<String> {
        info!(latitude, longitude, "Getting location from Google Maps API");

        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("latlng", &format!("{},{}", latitude, longitude))
            .append_pair("key", &self.api_key);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| PortError::Transport(e.to_string()))?
            .json::<GeocodeResponse>()
            .await
            .map_err(|e| PortError::Transport(format!("Invalid geocode response: {}", e)))?;

        match place_from_response(&response) {
            Some(place) => Ok(place),
            None => {
                warn!(status = %response.status, "Failed to get city and state from Google Maps API");
                Ok(String::new())
            }
        }
    }
}

//=========================================================================================
// Mock Adapter
//=========================================================================================

/// A fixed-answer `PlaceLookup` for development without a Maps API key.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockPlaceLookup;

pub const MOCK_PLACE: &str = "(Mock)Nashville, TN";

#[async_trait]
impl PlaceLookup for MockPlaceLookup {
    async fn lookup(&self, _latitude: f64, _longitude: f64) -> PortResult<String> {
        Ok(MOCK_PLACE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::net::TcpListener;

    fn parse(value: serde_json::Value) -> GeocodeResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_city_and_state_from_first_result() {
        let response = parse(json!({
            "status": "OK",
            "results": [
                {
                    "address_components": [
                        { "long_name": "Broadway", "short_name": "Broadway", "types": ["route"] },
                        { "long_name": "Nashville", "short_name": "Nashville", "types": ["locality", "political"] },
                        { "long_name": "Tennessee", "short_name": "TN", "types": ["administrative_area_level_1", "political"] }
                    ]
                },
                {
                    "address_components": [
                        { "long_name": "Memphis", "short_name": "Memphis", "types": ["locality"] }
                    ]
                }
            ]
        }));

        assert_eq!(place_from_response(&response).as_deref(), Some("Nashville, TN"));
    }

    #[test]
    fn test_missing_state_yields_nothing() {
        let response = parse(json!({
            "status": "OK",
            "results": [
                { "address_components": [
                    { "long_name": "Nashville", "short_name": "Nashville", "types": ["locality"] }
                ] }
            ]
        }));

        assert_eq!(place_from_response(&response), None);
    }

    #[test]
    fn test_non_ok_status_yields_nothing() {
        let response = parse(json!({ "status": "ZERO_RESULTS", "results": [] }));

        assert_eq!(place_from_response(&response), None);
    }

    #[tokio::test]
    async fn test_mock_lookup_is_fixed() {
        assert_eq!(
            MockPlaceLookup.lookup(0.0, 0.0).await.unwrap(),
            "(Mock)Nashville, TN"
        );
    }

    #[tokio::test]
    async fn test_silent_geocoder_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        // Accept connections and never answer.
        let server = tokio::spawn(async move {
            let mut open = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                open.push(socket);
            }
        });

        let endpoint = Url::parse(&format!("http://{}/geocode/json", address)).unwrap();
        let lookup =
            GooglePlaceLookup::with_endpoint(endpoint, "key".into(), Duration::from_millis(100))
                .unwrap();

        let started = std::time::Instant::now();
        let result = lookup.lookup(36.16, -86.78).await;

        assert!(matches!(result, Err(PortError::Transport(_))));
        assert!(started.elapsed() < Duration::from_secs(5));
        server.abort();
    }
}
