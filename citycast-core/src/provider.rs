use crate::{
    Config,
    error::{GeocodeError, WeatherError},
    model::{Coordinate, WeatherSnapshot},
    provider::{openmeteo::OpenMeteoGeocoder, openweather::OpenWeatherClient},
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};
use tracing::debug;

pub mod openmeteo;
pub mod openweather;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One candidate returned by a geocoding search.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeMatch {
    pub name: String,
    pub coordinate: Coordinate,
    pub country: Option<String>,
    pub region: Option<String>,
}

/// Resolves free-text city names to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// All candidates for `query`, best match first.
    async fn search(&self, query: &str) -> Result<Vec<GeocodeMatch>, GeocodeError>;

    /// Coordinate of the first candidate for `city`.
    ///
    /// An empty name fails with [`GeocodeError::InvalidQuery`] before any
    /// request is made; zero candidates is a [`GeocodeError::ResolutionFailed`].
    async fn resolve(&self, city: &str) -> Result<Coordinate, GeocodeError> {
        if city.is_empty() {
            return Err(GeocodeError::InvalidQuery);
        }

        let first = self
            .search(city)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::resolution(city, "no matches"))?;

        debug!("Resolved '{}' to {} ({})", city, first.coordinate, first.name);
        Ok(first.coordinate)
    }
}

/// Fetches a full weather snapshot for a coordinate. No caching.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(&self, at: Coordinate) -> Result<WeatherSnapshot, WeatherError>;
}

/// The pair of live clients the orchestrator is driven by.
#[derive(Debug, Clone)]
pub struct Providers {
    pub geocoder: Arc<dyn Geocoder>,
    pub weather: Arc<dyn WeatherProvider>,
}

/// Shared HTTP client for both providers.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("citycast/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Construct both clients from config.
///
/// A missing API key is not an error here; the weather fetch reports it.
pub fn providers_from_config(config: &Config) -> anyhow::Result<Providers> {
    let http = http_client(Duration::from_secs(DEFAULT_TIMEOUT_SECS))?;

    let mut geocoder = OpenMeteoGeocoder::new(http.clone());
    if let Some(url) = &config.endpoints.geocoding_url {
        geocoder = geocoder.with_base_url(url.clone());
    }

    let mut weather = OpenWeatherClient::new(config.api_key(), http);
    if let Some(url) = &config.endpoints.weather_url {
        weather = weather.with_base_url(url.clone());
    }

    Ok(Providers {
        geocoder: Arc::new(geocoder),
        weather: Arc::new(weather),
    })
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
