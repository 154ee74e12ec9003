use crate::{GeoPoint, GeocodingConfig, MapError};

use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

/// Resolves a free-text place name to a point, for picking where to center the map.
pub struct Geocoder {
    client: Client,
    config: GeocodingConfig,
}

impl Geocoder {
    pub fn new(config: GeocodingConfig, timeout: Duration) -> reqwest::Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            config,
        })
    }

    /// The best match for `query`.
    pub fn geocode(&self, query: &str) -> Result<GeoPoint, MapError> {
        let url = self.query_url(query)?;
        log::info!("Geocoding {:?}", query);

        let body = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.text())
            .map_err(|e| MapError::GeocodingFailed(e.to_string()))?;

        first_match(&body)
    }

    fn query_url(&self, query: &str) -> Result<Url, MapError> {
        let mut url = Url::parse(&self.config.url).map_err(|e| MapError::GeocodingFailed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| MapError::GeocodingFailed(format!("{} cannot take a path", self.config.url)))?
            .pop_if_empty()
            .push(query);
        url.query_pairs_mut()
            .append_pair("maxResults", "1")
            .append_pair("key", &self.config.api_key);

        Ok(url)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationResponse {
    resource_sets: Vec<ResourceSet>,
}

#[derive(Deserialize)]
struct ResourceSet {
    resources: Vec<Location>,
}

#[derive(Deserialize)]
struct Location {
    point: Point,
}

#[derive(Deserialize)]
struct Point {
    /// `[latitude, longitude]`
    coordinates: [f64; 2],
}

fn first_match(body: &str) -> Result<GeoPoint, MapError> {
    let response: LocationResponse =
        serde_json::from_str(body).map_err(|e| MapError::GeocodingFailed(e.to_string()))?;

    response
        .resource_sets
        .into_iter()
        .flat_map(|set| set.resources)
        .next()
        .map(|location| {
            let [latitude, longitude] = location.point.coordinates;
            GeoPoint::new(latitude, longitude)
        })
        .ok_or_else(|| MapError::GeocodingFailed("no match".into()))
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
    fn query_is_a_path_segment() {
        let geocoder = Geocoder::new(
            GeocodingConfig {
                url: "https://geo.example/REST/v1/Locations".into(),
                api_key: "k".into(),
            },
            Duration::from_secs(1),
        )
        .unwrap();

        let url = geocoder.query_url("Mont Blanc/Chamonix").unwrap();
        assert_eq!(
            url.as_str(),
            "https://geo.example/REST/v1/Locations/Mont%20Blanc%2FChamonix?maxResults=1&key=k"
        );
    }

    #[test]
    fn takes_first_resource() {
        let body = r#"{
            "resourceSets": [
                { "resources": [
                    { "name": "Mont Blanc", "point": { "type": "Point", "coordinates": [45.832675, 6.865166] } },
                    { "name": "Other", "point": { "type": "Point", "coordinates": [1.0, 2.0] } }
                ] }
            ]
        }"#;
        assert_eq!(first_match(body).unwrap(), GeoPoint::new(45.832675, 6.865166));
    }

    #[test]
    fn empty_result_is_a_failure() {
        assert!(matches!(
            first_match(r#"{"resourceSets": [{"resources": []}]}"#),
            Err(MapError::GeocodingFailed(_))
        ));
        assert!(matches!(
            first_match("not json"),
            Err(MapError::GeocodingFailed(_))
        ));
    }
}
