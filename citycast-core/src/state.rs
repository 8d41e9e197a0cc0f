//! Published state surface read by the screens.
//!
//! The orchestrator is the only writer. Observers either poll
//! [`StateStore::snapshot`] or register a callback with
//! [`StateStore::subscribe`]; every mutation notifies all callbacks.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
    mpsc,
};

use parking_lot::{Mutex, ReentrantMutex, RwLock};
use serde::Serialize;

use crate::model::{
    Coordinate, MapViewport, PlaceOfInterest, TOURIST_MAP_HOME, WeatherSnapshot,
};

/// City shown at process start.
pub const DEFAULT_CITY: &str = "London";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublishedState {
    pub city: String,
    pub coordinate: Option<Coordinate>,
    pub weather: Option<WeatherSnapshot>,
    pub places: Option<Vec<PlaceOfInterest>>,
    /// Detail-screen region; follows `coordinate`.
    pub viewport: MapViewport,
    /// Tourist-map region; follows `coordinate`.
    pub tourist_viewport: MapViewport,
}

impl PublishedState {
    pub fn new(city: impl Into<String>) -> Self {
        Self {
            city: city.into(),
            coordinate: None,
            weather: None,
            places: None,
            viewport: MapViewport::default(),
            tourist_viewport: MapViewport::tourist(TOURIST_MAP_HOME),
        }
    }
}

impl Default for PublishedState {
    fn default() -> Self {
        Self::new(DEFAULT_CITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&PublishedState) + Send + Sync>;

pub struct StateStore {
    state: RwLock<PublishedState>,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
    next_id: AtomicU64,
    /// Held from mutation until the last callback returns.
    sequence: ReentrantMutex<()>,
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("state", &*self.state.read())
            .field("subscribers", &self.subscribers.lock().len())
            .finish()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new(PublishedState::default())
    }
}

impl StateStore {
    pub fn new(initial: PublishedState) -> Self {
        Self {
            state: RwLock::new(initial),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            sequence: ReentrantMutex::new(()),
        }
    }

    pub fn snapshot(&self) -> PublishedState {
        self.state.read().clone()
    }

    pub fn city(&self) -> String {
        self.state.read().city.clone()
    }

    /// Register `callback`; it runs after every mutation with the new state.
    ///
    /// Notifications arrive in the order the mutations were applied, so the
    /// last state a callback sees is the one [`Self::snapshot`] returns.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PublishedState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    pub fn set_city(&self, city: impl Into<String>) {
        let city = city.into();
        self.update(|state| state.city = city);
    }

    /// Stores the coordinate of record and recomputes both viewports.
    pub fn set_coordinate(&self, coordinate: Coordinate) {
        self.update(|state| {
            state.coordinate = Some(coordinate);
            state.viewport = MapViewport::detail(coordinate);
            state.tourist_viewport = MapViewport::tourist(coordinate);
        });
    }

    pub fn set_weather(&self, weather: WeatherSnapshot) {
        self.update(|state| state.weather = Some(weather));
    }

    pub fn set_places(&self, places: Vec<PlaceOfInterest>) {
        self.update(|state| state.places = Some(places));
    }

    fn update(&self, mutate: impl FnOnce(&mut PublishedState)) {
        let _sequence = self.sequence.lock();
        let snapshot = {
            let mut state = self.state.write();
            mutate(&mut state);
            state.clone()
        };

        // Only the reentrant sequence lock is held here, so callbacks may read
        // the store, (un)subscribe or write to it from the same thread.
        let subscribers: Vec<Callback> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in subscribers {
            callback(&snapshot);
        }
    }
}

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Moves a state write onto the context observers read from.
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Runs every job inline on the calling task.
#[derive(Debug, Default, Clone, Copy)]
pub struct Immediate;

impl Dispatcher for Immediate {
    fn dispatch(&self, job: Job) {
        job();
    }
}

/// Sending half of a job queue drained by the consuming thread.
#[derive(Debug, Clone)]
pub struct MainQueue {
    tx: mpsc::Sender<Job>,
}

/// Receiving half, owned by the thread that renders.
#[derive(Debug)]
pub struct MainLoop {
    rx: mpsc::Receiver<Job>,
}

impl MainQueue {
    pub fn new() -> (MainQueue, MainLoop) {
        let (tx, rx) = mpsc::channel();
        (MainQueue { tx }, MainLoop { rx })
    }
}

impl Dispatcher for MainQueue {
    fn dispatch(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::debug!("Main loop is gone; dropping state update");
        }
    }
}

impl MainLoop {
    /// Run every queued job without blocking. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}
