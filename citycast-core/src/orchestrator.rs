//! City pipeline: geocode, then weather and places, then publish.
//!
//! Every failure is caught here, logged, and turned into "that slot keeps its
//! previous value". Nothing in this module returns an error to the screens.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    Config,
    model::{Coordinate, FALLBACK_COORDINATE},
    places::{PlacesRepository, PlacesSource},
    provider::{Geocoder, WeatherProvider, providers_from_config},
    state::{DEFAULT_CITY, Dispatcher, Immediate, PublishedState, StateStore, SubscriptionId},
};

/// What happens when a new run starts before the previous one finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverlapPolicy {
    /// Both runs publish; each slot ends up with whichever write landed last.
    #[default]
    LastWriteWins,
    /// Writes from a run are dropped once a newer run has started.
    LatestRunOnly,
}

/// Steps of a single pipeline run, as they appear in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Resolving,
    ResolvedOk,
    ResolvedFallback,
    Fetching,
    Published,
    PartialFailure,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Geocoding succeeded; this is now the coordinate of record.
    Resolved(Coordinate),
    /// Geocoding failed; the coordinate only fed the weather request.
    Fallback(Coordinate),
}

impl Resolution {
    pub fn coordinate(&self) -> Coordinate {
        match *self {
            Resolution::Resolved(c) | Resolution::Fallback(c) => c,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// At least one of coordinate or weather was sent for publication.
    Published,
    /// Geocoding and weather both failed; only places may have been published.
    PartialFailure,
}

/// Summary of one finished run.
///
/// The `*_updated` flags record what the run handed to the dispatcher. Under
/// [`OverlapPolicy::LatestRunOnly`] a superseded run's writes may still be dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub city: String,
    pub resolution: Resolution,
    pub weather_updated: bool,
    pub places_updated: bool,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn coordinate_updated(&self) -> bool {
        self.resolution.is_resolved()
    }
}

/// A spawned run. Dropping the handle does not cancel the run.
#[derive(Debug)]
pub struct RunHandle {
    task: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Wait for the run to finish. Errors only if the task panicked.
    pub async fn wait(self) -> Result<RunReport, JoinError> {
        self.task.await
    }
}

struct Inner {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherProvider>,
    places: Arc<PlacesRepository>,
    store: Arc<StateStore>,
    dispatcher: Arc<dyn Dispatcher>,
    fallback: Coordinate,
    overlap: OverlapPolicy,
    /// Generation of the newest run; bumped together with the city write.
    latest_run: Arc<Mutex<u64>>,
}

/// Owns the current city and drives the pipeline on every change.
#[derive(Clone)]
pub struct CityOrchestrator {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CityOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CityOrchestrator")
            .field("geocoder", &self.inner.geocoder)
            .field("weather", &self.inner.weather)
            .field("places", &self.inner.places.source())
            .field("fallback", &self.inner.fallback)
            .field("overlap", &self.inner.overlap)
            .finish()
    }
}

pub struct OrchestratorBuilder {
    geocoder: Arc<dyn Geocoder>,
    weather: Arc<dyn WeatherProvider>,
    places: Option<Arc<PlacesRepository>>,
    store: Option<Arc<StateStore>>,
    dispatcher: Arc<dyn Dispatcher>,
    initial_city: String,
    fallback: Coordinate,
    overlap: OverlapPolicy,
}

impl OrchestratorBuilder {
    pub fn places(mut self, places: Arc<PlacesRepository>) -> Self {
        self.places = Some(places);
        self
    }

    /// Use an existing store. Its city wins over [`Self::initial_city`].
    pub fn store(mut self, store: Arc<StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn initial_city(mut self, city: impl Into<String>) -> Self {
        self.initial_city = city.into();
        self
    }

    pub fn fallback(mut self, coordinate: Coordinate) -> Self {
        self.fallback = coordinate;
        self
    }

    pub fn overlap(mut self, policy: OverlapPolicy) -> Self {
        self.overlap = policy;
        self
    }

    pub fn build(self) -> CityOrchestrator {
        let initial_city = self.initial_city;
        CityOrchestrator {
            inner: Arc::new(Inner {
                geocoder: self.geocoder,
                weather: self.weather,
                places: self.places.unwrap_or_default(),
                store: self
                    .store
                    .unwrap_or_else(|| Arc::new(StateStore::new(PublishedState::new(initial_city)))),
                dispatcher: self.dispatcher,
                fallback: self.fallback,
                overlap: self.overlap,
                latest_run: Arc::new(Mutex::new(0)),
            }),
        }
    }
}

impl CityOrchestrator {
    pub fn builder(
        geocoder: Arc<dyn Geocoder>,
        weather: Arc<dyn WeatherProvider>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            geocoder,
            weather,
            places: None,
            store: None,
            dispatcher: Arc::new(Immediate),
            initial_city: DEFAULT_CITY.to_string(),
            fallback: FALLBACK_COORDINATE,
            overlap: OverlapPolicy::default(),
        }
    }

    /// Live clients, places source, initial city and overlap policy from config.
    pub fn builder_from_config(config: &Config) -> anyhow::Result<OrchestratorBuilder> {
        let providers = providers_from_config(config)?;
        let source = match &config.places_file {
            Some(path) => PlacesSource::File(path.clone()),
            None => PlacesSource::Bundled,
        };

        Ok(Self::builder(providers.geocoder, providers.weather)
            .places(Arc::new(PlacesRepository::new(source)))
            .initial_city(config.default_city())
            .overlap(config.overlap))
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.inner.store
    }

    pub fn snapshot(&self) -> PublishedState {
        self.inner.store.snapshot()
    }

    /// Callbacks must not start runs; a city change notifies while its
    /// generation is being assigned.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PublishedState) + Send + Sync + 'static,
    {
        self.inner.store.subscribe(callback)
    }

    pub fn city(&self) -> String {
        self.inner.store.city()
    }

    /// Run the pipeline for the initial city.
    pub fn start(&self) -> RunHandle {
        self.set_city(self.city())
    }

    /// Store `city` and spawn a full pipeline run for it on the Tokio runtime.
    ///
    /// Setting the same name again still re-runs everything, and an
    /// in-flight run is neither cancelled nor awaited.
    pub fn set_city(&self, city: impl Into<String>) -> RunHandle {
        let city = city.into();
        let run = self.begin(&city);
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move { inner.run(city, run).await });
        RunHandle { task }
    }

    /// Store `city` and run the pipeline on the current task.
    pub async fn run(&self, city: impl Into<String>) -> RunReport {
        let city = city.into();
        let run = self.begin(&city);
        self.inner.run(city, run).await
    }

    fn begin(&self, city: &str) -> u64 {
        // The newest generation always belongs to the published city.
        let mut latest = self.inner.latest_run.lock();
        *latest += 1;
        self.inner.store.set_city(city);
        *latest
    }
}

impl Inner {
    async fn run(&self, city: String, run: u64) -> RunReport {
        debug!(%city, run, phase = ?RunPhase::Resolving, "Pipeline run started");

        let resolution = match self.geocoder.resolve(&city).await {
            Ok(coordinate) => {
                debug!(%city, run, phase = ?RunPhase::ResolvedOk, %coordinate);
                self.publish(run, move |store| store.set_coordinate(coordinate));
                Resolution::Resolved(coordinate)
            }
            Err(e) => {
                warn!(
                    "Geocoding '{}' failed, fetching weather for {} instead: {}",
                    city, self.fallback, e
                );
                debug!(%city, run, phase = ?RunPhase::ResolvedFallback);
                Resolution::Fallback(self.fallback)
            }
        };

        debug!(%city, run, phase = ?RunPhase::Fetching);
        let (weather, places) = tokio::join!(self.weather.fetch(resolution.coordinate()), async {
            self.places.filter_by_city(&city)
        });

        let places_updated = match places {
            Ok(places) => {
                info!("Publishing {} places for '{}'", places.len(), city);
                self.publish(run, move |store| store.set_places(places));
                true
            }
            Err(e) => {
                warn!("Error loading places data for '{}': {}", city, e);
                false
            }
        };

        let weather_updated = match weather {
            Ok(snapshot) => {
                info!(
                    "Publishing weather for '{}' at ({:.4}, {:.4})",
                    city, snapshot.latitude, snapshot.longitude
                );
                self.publish(run, move |store| store.set_weather(snapshot));
                true
            }
            Err(e) => {
                warn!("Error loading weather data for '{}': {}", city, e);
                false
            }
        };

        let outcome = if resolution.is_resolved() || weather_updated {
            RunOutcome::Published
        } else {
            RunOutcome::PartialFailure
        };
        let phase = match outcome {
            RunOutcome::Published => RunPhase::Published,
            RunOutcome::PartialFailure => RunPhase::PartialFailure,
        };
        debug!(%city, run, ?phase, "Pipeline run finished");

        RunReport {
            city,
            resolution,
            weather_updated,
            places_updated,
            outcome,
        }
    }

    fn publish(&self, run: u64, apply: impl FnOnce(&StateStore) + Send + 'static) {
        let store = Arc::clone(&self.store);
        let latest_run = Arc::clone(&self.latest_run);
        let overlap = self.overlap;

        // The check happens when the job runs, on the consuming side.
        self.dispatcher.dispatch(Box::new(move || {
            if overlap == OverlapPolicy::LatestRunOnly && *latest_run.lock() != run {
                debug!(run, "Dropping update from superseded run");
                return;
            }
            apply(&store);
        }));
    }
}
