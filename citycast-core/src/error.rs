//! Error types for each step of the city pipeline.
//!
//! None of these reach the presentation layer: the orchestrator logs them and
//! leaves the affected slot of the published state untouched.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while turning a city name into a coordinate.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The query was empty; no request was sent.
    #[error("city name must not be empty")]
    InvalidQuery,

    /// The provider could not be reached, answered badly, or had no match.
    #[error("unable to find the coordinates for '{query}': {reason}")]
    ResolutionFailed { query: String, reason: String },
}

impl GeocodeError {
    pub(crate) fn resolution(query: &str, reason: impl Into<String>) -> Self {
        GeocodeError::ResolutionFailed {
            query: query.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures while fetching a weather snapshot.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Deployment problem, e.g. no API credential configured.
    #[error("weather provider is not configured: {0}")]
    Configuration(String),

    /// No usable response: connection error, timeout or non-2xx status.
    #[error("weather request failed: {0}")]
    Transport(String),

    /// A 2xx response whose body does not match the expected schema.
    #[error("failed to decode weather response: {source}")]
    Decoding {
        #[source]
        source: serde_json::Error,
    },
}

/// Failures while loading the tourist places dataset.
#[derive(Debug, Error)]
pub enum PlacesError {
    #[error("places dataset not found at {}: {source}", .path.display())]
    DatasetMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("places dataset could not be parsed: {source}")]
    DatasetCorrupt {
        #[source]
        source: serde_json::Error,
    },
}
