//! Platform geolocation adapters
//!
//! A device source is inert until resumed. Resuming hands back a channel that
//! carries position readings and errors in the order the platform produced
//! them, for as long as the platform keeps the subscription open.

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::data::Coordinate;

/// Buffer size for pending device events
const DEVICE_CHANNEL_CAPACITY: usize = 32;

/// Reasons the device source could not produce a fix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationError {
    /// The user or platform refused location access
    #[error("Location permission denied")]
    PermissionDenied,

    /// The platform could not determine a position
    #[error("Position unavailable")]
    PositionUnavailable,

    /// The platform gave up waiting for a fix
    #[error("Timed out waiting for a position")]
    Timeout,

    /// This platform has no geolocation capability
    #[error("Geolocation is not supported on this platform")]
    Unsupported,
}

/// A raw reading as reported by the platform
///
/// Platforms report "no fix yet" with a placeholder rather than an absent
/// value; [`DeviceReading::coordinate`] is the only way to get a usable
/// position out of a reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceReading {
    pub latitude: f64,
    pub longitude: f64,
}

impl DeviceReading {
    /// The platform's "no fix yet" placeholder
    pub const UNSET: DeviceReading = DeviceReading {
        latitude: f64::INFINITY,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The reading as a coordinate, or `None` if it is not a real fix
    pub fn coordinate(&self) -> Option<Coordinate> {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Notifications emitted by a resumed device source
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// A new reading arrived
    Position(DeviceReading),
    /// The platform reported a failure
    Error(LocationError),
}

/// A platform geolocation capability
pub trait DeviceLocationSource: Send + 'static {
    /// Whether the platform exposes geolocation at all
    fn is_supported(&self) -> bool;

    /// Begins emission and returns the event stream
    ///
    /// Nothing is delivered before this is called.
    fn resume(self: Box<Self>) -> mpsc::Receiver<DeviceEvent>;
}

/// A device source fed by a [`DeviceFeed`] handle
///
/// Events sent before [`DeviceLocationSource::resume`] are held back and
/// delivered in order once resumed.
#[derive(Debug)]
pub struct ChannelDeviceSource {
    receiver: mpsc::Receiver<DeviceEvent>,
    supported: bool,
}

impl ChannelDeviceSource {
    /// Creates a supported source and the handle that feeds it
    pub fn new() -> (Self, DeviceFeed) {
        let (sender, receiver) = mpsc::channel(DEVICE_CHANNEL_CAPACITY);
        (
            Self {
                receiver,
                supported: true,
            },
            DeviceFeed { sender },
        )
    }
}

impl DeviceLocationSource for ChannelDeviceSource {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn resume(self: Box<Self>) -> mpsc::Receiver<DeviceEvent> {
        self.receiver
    }
}

/// Sending half of a [`ChannelDeviceSource`]
///
/// Dropping every feed closes the device stream.
#[derive(Debug, Clone)]
pub struct DeviceFeed {
    sender: mpsc::Sender<DeviceEvent>,
}

impl DeviceFeed {
    /// Reports a raw reading; returns `false` once the source is gone
    pub async fn send_reading(&self, reading: DeviceReading) -> bool {
        self.sender.send(DeviceEvent::Position(reading)).await.is_ok()
    }

    /// Reports a platform failure; returns `false` once the source is gone
    pub async fn send_error(&self, error: LocationError) -> bool {
        self.sender.send(DeviceEvent::Error(error)).await.is_ok()
    }
}

/// Stand-in for platforms without geolocation
///
/// Resuming emits a single [`LocationError::Unsupported`] and closes.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedDeviceSource;

impl DeviceLocationSource for UnsupportedDeviceSource {
    fn is_supported(&self) -> bool {
        false
    }

    fn resume(self: Box<Self>) -> mpsc::Receiver<DeviceEvent> {
        let (sender, receiver) = mpsc::channel(1);
        // Capacity 1 and a fresh channel: this cannot fail.
        let _ = sender.try_send(DeviceEvent::Error(LocationError::Unsupported));
        receiver
    }
}
