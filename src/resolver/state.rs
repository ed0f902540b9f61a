//! Resolver state and the precedence rules that mutate it
//!
//! Every transition returns whether it changed anything so the resolver can
//! notify observers only on real changes.

use serde::Serialize;

use crate::data::{Coordinate, Provenance};
use crate::device::{DeviceReading, LocationError};

/// The observable state of a resolver session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSnapshot {
    /// Best-known coordinate, if any
    pub coordinate: Option<Coordinate>,
    /// Source of `coordinate`; `None` exactly when `coordinate` is `None`
    pub provenance: Option<Provenance>,
    /// True from initialization until the first terminal update
    pub is_loading: bool,
    /// Set only while no coordinate is available
    pub last_error: Option<LocationError>,
    /// Device capability flag, informational only
    pub is_supported: bool,
}

/// What the device error handler did with an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceErrorOutcome {
    /// No estimate existed, so the error is now `last_error`
    Surfaced,
    /// An estimate already existed; the error was only logged
    Suppressed,
}

impl LocationSnapshot {
    /// A fresh, inert session
    pub fn new(is_supported: bool) -> Self {
        Self {
            coordinate: None,
            provenance: None,
            is_loading: false,
            last_error: None,
            is_supported,
        }
    }

    /// True iff the current coordinate came from the IP source
    pub fn is_using_low_confidence_source(&self) -> bool {
        self.provenance.is_some_and(Provenance::is_low_confidence)
    }

    fn accept(&mut self, coordinate: Coordinate, provenance: Provenance) {
        self.coordinate = Some(coordinate);
        self.provenance = Some(provenance);
        self.is_loading = false;
        self.last_error = None;
    }

    /// Adopts a fresh cache entry as a provisional high-confidence estimate
    ///
    /// Does not touch `is_loading`: a cached value bridges the wait for live
    /// sources but does not end it.
    pub fn adopt_cached(&mut self, coordinate: Coordinate) -> bool {
        if self.provenance == Some(Provenance::Device) {
            return false;
        }
        self.coordinate = Some(coordinate);
        self.provenance = Some(Provenance::Cache);
        self.last_error = None;
        true
    }

    pub fn begin_loading(&mut self) -> bool {
        let changed = !self.is_loading;
        self.is_loading = true;
        changed
    }

    /// Applies an IP estimate; it only fills an empty or IP-sourced estimate
    pub fn apply_ip(&mut self, coordinate: Coordinate) -> bool {
        match self.provenance {
            None | Some(Provenance::Ip) => {
                self.accept(coordinate, Provenance::Ip);
                true
            }
            Some(Provenance::Cache) | Some(Provenance::Device) => false,
        }
    }

    /// Applies a device reading; valid readings always win
    ///
    /// Returns the accepted coordinate so the caller can persist it.
    pub fn apply_device_reading(&mut self, reading: DeviceReading) -> Option<Coordinate> {
        let coordinate = reading.coordinate()?;
        self.accept(coordinate, Provenance::Device);
        Some(coordinate)
    }

    /// Applies a device failure
    pub fn apply_device_error(&mut self, error: LocationError) -> DeviceErrorOutcome {
        self.is_loading = false;
        if self.coordinate.is_some() {
            DeviceErrorOutcome::Suppressed
        } else {
            self.last_error = Some(error);
            DeviceErrorOutcome::Surfaced
        }
    }
}
