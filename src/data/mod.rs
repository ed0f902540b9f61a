//! Core data models for location resolution
//!
//! This module contains the coordinate type shared by every source, the
//! provenance tag the resolver uses for precedence, and the IP lookup wire
//! format.

pub mod ip_location;

pub use ip_location::{IpLocationClient, IpLookupError};

use serde::{Deserialize, Serialize};

/// A best-known estimate of the user's position
///
/// Can only be built through [`Coordinate::new`], which rejects readings that
/// are not real fixes. Precision is implied by the source it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinate {
    latitude: f64,
    longitude: f64,
}

impl Coordinate {
    /// Validates a raw latitude/longitude pair
    ///
    /// Returns `None` for non-finite components (this covers the
    /// `(Infinity, 0)` "no fix yet" marker), for out-of-range values, and for
    /// the `(0, 0)` unset marker some platform layers report.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return None;
        }
        if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
            return None;
        }
        if latitude == 0.0 && longitude == 0.0 {
            return None;
        }
        Some(Self {
            latitude,
            longitude,
        })
    }

    /// Latitude in decimal degrees
    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in decimal degrees
    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Where the currently accepted coordinate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Restored from a fresh cache entry written by an earlier device fix
    Cache,
    /// Server-side estimate from the requester's network address
    Ip,
    /// Live fix from the platform geolocation source
    Device,
}

impl Provenance {
    /// Whether this source counts as low confidence
    pub fn is_low_confidence(self) -> bool {
        matches!(self, Provenance::Ip)
    }
}

/// Body returned by the IP lookup endpoint
///
/// `latitude`/`longitude` are `null` and `error` is `true` when every upstream
/// provider failed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpLocationResponse {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<bool>,
}

impl IpLocationResponse {
    /// The shape returned when no provider could place the address
    pub fn unavailable() -> Self {
        Self {
            latitude: None,
            longitude: None,
            city: None,
            country: None,
            error: Some(true),
        }
    }

    /// Extracts a usable coordinate, treating the error shape as "no estimate"
    pub fn coordinate(&self) -> Option<Coordinate> {
        if self.error == Some(true) {
            return None;
        }
        Coordinate::new(self.latitude?, self.longitude?)
    }
}
