//! Static tourist places dataset.
//!
//! The dataset is read once and never mutated; filtering returns clones in
//! dataset order.

use std::{borrow::Cow, fs, path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use serde::Deserialize;
use tracing::info;

use crate::{
    error::PlacesError,
    model::{Coordinate, PlaceOfInterest},
};

const BUNDLED_PLACES: &str = include_str!("../data/places.json");

/// Where the dataset comes from.
#[derive(Debug, Clone)]
pub enum PlacesSource {
    /// The dataset compiled into the crate.
    Bundled,
    /// A JSON file on disk.
    File(PathBuf),
    /// Raw JSON text.
    Json(String),
}

impl std::fmt::Display for PlacesSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacesSource::Bundled => f.write_str("bundled places.json"),
            PlacesSource::File(path) => write!(f, "{}", path.display()),
            PlacesSource::Json(_) => f.write_str("inline json"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceRecord {
    city_name: String,
    id: String,
    name: String,
    description: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    image_names: Vec<String>,
}

impl From<PlaceRecord> for PlaceOfInterest {
    fn from(r: PlaceRecord) -> Self {
        PlaceOfInterest {
            id: r.id,
            city_name: r.city_name,
            name: r.name,
            description: r.description,
            coordinate: Coordinate::new(r.latitude, r.longitude),
            image_names: r.image_names,
        }
    }
}

#[derive(Debug)]
pub struct PlacesRepository {
    source: PlacesSource,
    // Only successful loads are memoized.
    loaded: Mutex<Option<Arc<[PlaceOfInterest]>>>,
}

impl Default for PlacesRepository {
    fn default() -> Self {
        Self::new(PlacesSource::Bundled)
    }
}

impl PlacesRepository {
    pub fn new(source: PlacesSource) -> Self {
        Self {
            source,
            loaded: Mutex::new(None),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(PlacesSource::File(path.into()))
    }

    pub fn from_json(json: impl Into<String>) -> Self {
        Self::new(PlacesSource::Json(json.into()))
    }

    pub fn source(&self) -> &PlacesSource {
        &self.source
    }

    /// Every record, in dataset order.
    pub fn load_all(&self) -> Result<Arc<[PlaceOfInterest]>, PlacesError> {
        let mut loaded = self.loaded.lock();
        if let Some(places) = loaded.as_ref() {
            return Ok(Arc::clone(places));
        }

        let places: Arc<[PlaceOfInterest]> = self.read()?.into();
        info!("Loaded {} places from {}", places.len(), self.source);
        *loaded = Some(Arc::clone(&places));
        Ok(places)
    }

    /// Records whose city name equals `city` exactly (case-sensitive, untrimmed).
    ///
    /// No match is an empty list, not an error.
    pub fn filter_by_city(&self, city: &str) -> Result<Vec<PlaceOfInterest>, PlacesError> {
        Ok(self
            .load_all()?
            .iter()
            .filter(|place| place.city_name == city)
            .cloned()
            .collect())
    }

    fn read(&self) -> Result<Vec<PlaceOfInterest>, PlacesError> {
        let text: Cow<'_, str> = match &self.source {
            PlacesSource::Bundled => Cow::Borrowed(BUNDLED_PLACES),
            PlacesSource::Json(json) => Cow::Borrowed(json.as_str()),
            PlacesSource::File(path) => {
                let text = fs::read_to_string(path).map_err(|source| {
                    PlacesError::DatasetMissing {
                        path: path.clone(),
                        source,
                    }
                })?;
                Cow::Owned(text)
            }
        };

        let records: Vec<PlaceRecord> = serde_json::from_str(&text)
            .map_err(|source| PlacesError::DatasetCorrupt { source })?;

        Ok(records.into_iter().map(PlaceOfInterest::from).collect())
    }
}
