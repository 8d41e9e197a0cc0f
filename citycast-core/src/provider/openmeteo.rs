use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{error::GeocodeError, model::Coordinate, provider::truncate_body};

use super::{GeocodeMatch, Geocoder};

const SEARCH_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
const MAX_RESULTS: &str = "5";

/// Forward geocoding through the Open-Meteo search API (no key required).
#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    base_url: String,
    language: String,
    http: Client,
}

impl OpenMeteoGeocoder {
    pub fn new(http: Client) -> Self {
        Self {
            base_url: SEARCH_URL.to_string(),
            language: "en".to_string(),
            http,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Deserialize)]
struct OmResult {
    name: String,
    latitude: f64,
    longitude: f64,
    country: Option<String>,
    admin1: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmSearchResponse {
    // Absent entirely when nothing matched.
    results: Option<Vec<OmResult>>,
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, GeocodeError> {
        debug!("Geocoding location: '{}'", query);

        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("name", query),
                ("count", MAX_RESULTS),
                ("language", self.language.as_str()),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::resolution(query, format!("request failed: {e}")))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GeocodeError::resolution(query, format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(GeocodeError::resolution(
                query,
                format!("status {}: {}", status, truncate_body(&body)),
            ));
        }

        let parsed: OmSearchResponse = serde_json::from_str(&body)
            .map_err(|e| GeocodeError::resolution(query, format!("malformed response: {e}")))?;

        let matches: Vec<GeocodeMatch> = parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .map(|r| GeocodeMatch {
                name: r.name,
                coordinate: Coordinate::new(r.latitude, r.longitude),
                country: r.country,
                region: r.admin1,
            })
            .collect();

        if matches.is_empty() {
            warn!("No geocoding results for '{}'", query);
        }

        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn geocoder_for(server: &MockServer) -> OpenMeteoGeocoder {
        OpenMeteoGeocoder::new(Client::new()).with_base_url(format!("{}/v1/search", server.uri()))
    }

    #[tokio::test]
    async fn resolve_returns_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("name", "Paris"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "id": 2988507, "name": "Paris", "latitude": 48.85341, "longitude": 2.3488,
                      "country": "France", "admin1": "Île-de-France" },
                    { "id": 4717560, "name": "Paris", "latitude": 33.66094, "longitude": -95.55551,
                      "country": "United States", "admin1": "Texas" }
                ],
                "generationtime_ms": 0.9
            })))
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server);
        let all = geocoder.search("Paris").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].region.as_deref(), Some("Texas"));

        let coord = geocoder.resolve("Paris").await.unwrap();
        assert_eq!(coord, Coordinate::new(48.85341, 2.3488));
    }

    #[tokio::test]
    async fn missing_results_is_resolution_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "generationtime_ms": 0.4 })))
            .mount(&server)
            .await;

        let err = geocoder_for(&server)
            .resolve("Zzzzznotacity")
            .await
            .unwrap_err();
        match err {
            GeocodeError::ResolutionFailed { query, reason } => {
                assert_eq!(query, "Zzzzznotacity");
                assert_eq!(reason, "no matches");
            }
            other => panic!("expected resolution failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn server_error_is_resolution_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = geocoder_for(&server).resolve("London").await.unwrap_err();
        assert!(matches!(err, GeocodeError::ResolutionFailed { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[tokio::test]
    async fn malformed_body_is_resolution_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = geocoder_for(&server).resolve("London").await.unwrap_err();
        assert!(err.to_string().contains("malformed response"));
    }

    #[tokio::test]
    async fn empty_query_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .expect(0)
            .mount(&server)
            .await;

        let err = geocoder_for(&server).resolve("").await.unwrap_err();
        assert!(matches!(err, GeocodeError::InvalidQuery));
    }
}
