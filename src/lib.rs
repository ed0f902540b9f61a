//! andago-geo library
//!
//! Session-scoped location hints for tour search defaults: a resolver that
//! reconciles a device fix, an IP estimate and a short-lived cache, plus the
//! IP lookup endpoint it consumes.

pub mod cache;
pub mod cli;
pub mod data;
pub mod device;
pub mod resolver;
pub mod server;

pub use data::{Coordinate, Provenance};
pub use device::{DeviceLocationSource, LocationError};
pub use resolver::{LocationResolver, LocationSnapshot, ResolverConfig};
