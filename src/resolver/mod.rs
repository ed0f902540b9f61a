//! Session-scoped location resolution
//!
//! A [`LocationResolver`] races a device source against an IP estimate and
//! keeps a single best-known coordinate. Device fixes always win, IP estimates
//! only fill gaps, and a fresh cache entry bridges the wait at startup.
//!
//! Construct one resolver per session and hand clones to consumers; clones
//! share state. Observers subscribe to a `watch` channel and see every change.

mod state;

pub use state::{DeviceErrorOutcome, LocationSnapshot};

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::cache::{CacheManager, LocationCache, DEFAULT_LOCATION_TTL};
use crate::data::{Coordinate, IpLocationClient, IpLookupError};
use crate::device::{DeviceEvent, DeviceLocationSource, DeviceReading, LocationError};

/// Default IP lookup endpoint, as served by `andago-geo serve`
pub const DEFAULT_IP_ENDPOINT: &str = "http://127.0.0.1:3000/api/geo/ip";

/// Settings for a resolver session
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// URL of the IP lookup endpoint
    pub ip_endpoint: String,
    /// Timeout for the IP lookup request
    pub request_timeout: Duration,
    /// How long a cached fix stays usable
    pub cache_ttl: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            ip_endpoint: DEFAULT_IP_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(3),
            cache_ttl: DEFAULT_LOCATION_TTL,
        }
    }
}

/// Resolves and tracks the session's best-known coordinate
#[derive(Clone)]
pub struct LocationResolver {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<LocationSnapshot>,
    cache: Option<LocationCache>,
    ip_client: IpLocationClient,
    device: Mutex<Option<Box<dyn DeviceLocationSource>>>,
    ip_task: Mutex<Option<JoinHandle<()>>>,
    started: AtomicBool,
}

impl LocationResolver {
    /// Creates an inert resolver
    ///
    /// Nothing is read or requested until [`LocationResolver::initialize`].
    pub fn new(
        ip_client: IpLocationClient,
        cache: Option<LocationCache>,
        device: Box<dyn DeviceLocationSource>,
    ) -> Self {
        let (state, _) = watch::channel(LocationSnapshot::new(device.is_supported()));
        Self {
            inner: Arc::new(Inner {
                state,
                cache,
                ip_client,
                device: Mutex::new(Some(device)),
                ip_task: Mutex::new(None),
                started: AtomicBool::new(false),
            }),
        }
    }

    /// Builds a resolver from configuration
    ///
    /// # Errors
    /// Returns `IpLookupError` if the IP endpoint or HTTP client is invalid.
    pub fn from_config(
        config: &ResolverConfig,
        cache_manager: Option<CacheManager>,
        device: Box<dyn DeviceLocationSource>,
    ) -> Result<Self, IpLookupError> {
        let ip_client = IpLocationClient::new(&config.ip_endpoint, config.request_timeout)?;
        let cache = cache_manager.map(|manager| LocationCache::new(manager, config.cache_ttl));
        Ok(Self::new(ip_client, cache, device))
    }

    /// Starts the session
    ///
    /// Adopts a fresh cache entry synchronously, then fires off the IP lookup
    /// and resumes the device source without waiting for either. Later calls
    /// are no-ops. Must be called from within a tokio runtime.
    pub fn initialize(&self) {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("location resolver already initialized");
            return;
        }

        if let Some(coordinate) = self
            .inner
            .cache
            .as_ref()
            .and_then(|cache| cache.load_fresh(Utc::now()))
        {
            tracing::info!(
                latitude = coordinate.latitude(),
                longitude = coordinate.longitude(),
                "using cached location"
            );
            self.inner
                .state
                .send_if_modified(|state| state.adopt_cached(coordinate));
        }

        self.inner.state.send_if_modified(LocationSnapshot::begin_loading);

        let inner = Arc::clone(&self.inner);
        let ip_task = tokio::spawn(async move { inner.run_ip_lookup().await });
        *self
            .inner
            .ip_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(ip_task);

        let device = self
            .inner
            .device
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(device) = device {
            let events = device.resume();
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { inner.run_device_events(events).await });
        }
    }

    /// Waits for the IP lookup started by `initialize` to settle
    ///
    /// Returns immediately if the session was never started or the lookup has
    /// already been awaited.
    pub async fn ip_lookup_finished(&self) {
        let handle = self
            .inner
            .ip_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "IP lookup task did not complete");
            }
        }
    }

    /// Current state of the session
    pub fn snapshot(&self) -> LocationSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Observes every state change from now on
    pub fn subscribe(&self) -> watch::Receiver<LocationSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn coordinate(&self) -> Option<Coordinate> {
        self.inner.state.borrow().coordinate
    }

    pub fn is_supported(&self) -> bool {
        self.inner.state.borrow().is_supported
    }

    pub fn last_error(&self) -> Option<LocationError> {
        self.inner.state.borrow().last_error
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading
    }

    pub fn is_using_low_confidence_source(&self) -> bool {
        self.inner.state.borrow().is_using_low_confidence_source()
    }
}

impl Inner {
    async fn run_ip_lookup(&self) {
        let response = match self.ip_client.fetch_ip_location().await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "IP location lookup failed");
                return;
            }
        };

        let Some(coordinate) = response.coordinate() else {
            tracing::debug!("IP location lookup returned no estimate");
            return;
        };

        if self
            .state
            .send_if_modified(|state| state.apply_ip(coordinate))
        {
            tracing::info!(
                latitude = coordinate.latitude(),
                longitude = coordinate.longitude(),
                city = response.city.as_deref().unwrap_or_default(),
                "using IP location estimate"
            );
        } else {
            tracing::debug!("IP location estimate ignored, a better fix is already held");
        }
    }

    async fn run_device_events(&self, mut events: mpsc::Receiver<DeviceEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                DeviceEvent::Position(reading) => self.handle_device_reading(reading),
                DeviceEvent::Error(error) => self.handle_device_error(error),
            }
        }
        tracing::debug!("device location stream closed");
    }

    fn handle_device_reading(&self, reading: DeviceReading) {
        let mut accepted = None;
        self.state.send_if_modified(|state| {
            accepted = state.apply_device_reading(reading);
            accepted.is_some()
        });

        let Some(coordinate) = accepted else {
            tracing::debug!(
                latitude = reading.latitude,
                longitude = reading.longitude,
                "ignoring device reading without a fix"
            );
            return;
        };

        tracing::info!(
            latitude = coordinate.latitude(),
            longitude = coordinate.longitude(),
            "using device location"
        );

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(coordinate, Utc::now()) {
                tracing::warn!(error = %e, "failed to cache device location");
            }
        }
    }

    fn handle_device_error(&self, error: LocationError) {
        let mut outcome = DeviceErrorOutcome::Suppressed;
        self.state.send_if_modified(|state| {
            outcome = state.apply_device_error(error);
            true
        });

        match outcome {
            DeviceErrorOutcome::Suppressed => {
                tracing::warn!(error = %error, "device location failed, keeping existing estimate");
            }
            DeviceErrorOutcome::Surfaced => {
                tracing::warn!(error = %error, "device location failed with no fallback");
            }
        }
    }
}
