use crate::{ElevationServiceConfig, GeoPoint, HttpMethod, MapError};

use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElevationSample {
    pub point: GeoPoint,
    pub elevation_meters: i32,
}

/// Looks up terrain heights.
///
/// Implementations block; callers run them off the main schedule.
pub trait ElevationService: Send + Sync {
    /// One round trip for all of `points`. Samples come back in request order.
    fn request_elevations(&self, points: &[GeoPoint]) -> Result<Vec<ElevationSample>, MapError>;
}

/// Client for the open-elevation lookup API.
pub struct OpenElevationClient {
    client: Client,
    config: ElevationServiceConfig,
}

impl OpenElevationClient {
    pub fn new(config: ElevationServiceConfig, timeout: Duration) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, config })
    }
}

impl ElevationService for OpenElevationClient {
    fn request_elevations(&self, points: &[GeoPoint]) -> Result<Vec<ElevationSample>, MapError> {
        log::debug!("Requesting {} elevations from {}", points.len(), self.config.url);

        let request = match self.config.method {
            HttpMethod::Put => self.client.put(&self.config.url),
            HttpMethod::Post => self.client.post(&self.config.url),
        };
        let body = request
            .header(ACCEPT, "application/json")
            .json(&LookupRequest::new(points))
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| MapError::ElevationFetchFailed(e.to_string()))?;

        parse_lookup_response(&body)
    }
}

#[derive(Serialize)]
struct LookupRequest {
    locations: Vec<LookupLocation>,
}

// The service speaks single precision.
#[derive(Serialize)]
struct LookupLocation {
    latitude: f32,
    longitude: f32,
}

impl LookupRequest {
    fn new(points: &[GeoPoint]) -> Self {
        Self {
            locations: points
                .iter()
                .map(|p| LookupLocation {
                    latitude: p.latitude as f32,
                    longitude: p.longitude as f32,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Deserialize)]
struct LookupResult {
    latitude: f32,
    longitude: f32,
    elevation: i32,
}

fn parse_lookup_response(body: &str) -> Result<Vec<ElevationSample>, MapError> {
    let response: LookupResponse =
        serde_json::from_str(body).map_err(|e| MapError::ElevationFetchFailed(e.to_string()))?;

    Ok(response
        .results
        .into_iter()
        .map(|r| ElevationSample {
            point: GeoPoint::new(r.latitude as f64, r.longitude as f64),
            elevation_meters: r.elevation,
        })
        .collect())
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_body_lists_locations_in_order() {
        let body = serde_json::to_value(LookupRequest::new(&[
            GeoPoint::new(45.5, 6.5),
            GeoPoint::new(-10.25, 100.0),
        ]))
        .unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "locations": [
                    { "latitude": 45.5, "longitude": 6.5 },
                    { "latitude": -10.25, "longitude": 100.0 },
                ]
            })
        );
    }

    #[test]
    fn response_keeps_order_and_integer_elevations() {
        let samples = parse_lookup_response(
            r#"{"results": [
                {"latitude": 45.5, "longitude": 6.5, "elevation": 4807},
                {"latitude": -10.25, "longitude": 100.0, "elevation": -12}
            ]}"#,
        )
        .unwrap();

        assert_eq!(
            samples,
            [
                ElevationSample {
                    point: GeoPoint::new(45.5, 6.5),
                    elevation_meters: 4807
                },
                ElevationSample {
                    point: GeoPoint::new(-10.25, 100.0),
                    elevation_meters: -12
                },
            ]
        );
    }

    #[test]
    fn malformed_response_is_a_fetch_failure() {
        assert!(matches!(
            parse_lookup_response(r#"{"error": "Invalid JSON."}"#),
            Err(MapError::ElevationFetchFailed(_))
        ));
    }
}
