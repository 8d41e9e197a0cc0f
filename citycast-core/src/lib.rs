//! Core library for the `citycast` viewer.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Geocoding and weather provider clients
//! - The bundled tourist places dataset
//! - The city orchestrator and the state it publishes
//!
//! It is used by `citycast-cli`, but any other front-end can subscribe to the
//! same published state.

pub mod config;
pub mod error;
pub mod format;
pub mod model;
pub mod orchestrator;
pub mod places;
pub mod provider;
pub mod state;

pub use config::Config;
pub use error::{GeocodeError, PlacesError, WeatherError};
pub use model::{
    Condition, Coordinate, DayWeather, MapViewport, PlaceOfInterest, WeatherPoint,
    WeatherSnapshot,
};
pub use orchestrator::{CityOrchestrator, OverlapPolicy, RunHandle, RunOutcome, RunReport};
pub use places::PlacesRepository;
pub use provider::{Geocoder, WeatherProvider};
pub use state::{Dispatcher, MainLoop, MainQueue, PublishedState, StateStore};
