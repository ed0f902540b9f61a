//! Command-line interface parsing for andago-geo
//!
//! `locate` runs one resolver session and prints the outcome; `serve` hosts
//! the IP lookup endpoint. Arguments are validated here and turned into
//! plain configuration structs before anything touches the network.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::cache::DEFAULT_LOCATION_TTL;
use crate::data::Coordinate;
use crate::resolver::{ResolverConfig, DEFAULT_IP_ENDPOINT};
use crate::server::UpstreamConfig;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The `--device` value is not a usable `LAT,LNG` fix
    #[error("Invalid device fix: '{0}'. Expected LAT,LNG with finite values, e.g. 21.03,105.85")]
    InvalidDeviceFix(String),
}

/// Andago tour location hints
#[derive(Parser, Debug)]
#[command(name = "andago-geo")]
#[command(about = "Resolve a session location hint from device, IP and cache sources")]
#[command(version)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, env = "ANDAGO_GEO_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one resolver session and print the resulting location as JSON
    Locate(LocateArgs),
    /// Serve the IP lookup endpoint
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct LocateArgs {
    /// IP lookup endpoint
    #[arg(long, env = "ANDAGO_GEO_ENDPOINT", default_value = DEFAULT_IP_ENDPOINT)]
    pub endpoint: String,

    /// Device fix to report, as LAT,LNG
    ///
    /// Without this (or --deny-device) the device source is treated as unsupported.
    #[arg(long, value_name = "LAT,LNG", allow_hyphen_values = true)]
    pub device: Option<String>,

    /// Report a permission-denied error from the device source
    #[arg(long, conflicts_with = "device")]
    pub deny_device: bool,

    /// Directory for the location cache (defaults to the XDG cache dir)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Do not read or write the location cache
    #[arg(long, conflicts_with = "cache_dir")]
    pub no_cache: bool,

    /// Seconds to wait for sources to settle
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    pub wait: u64,

    /// Seconds before the IP lookup request is abandoned
    #[arg(long, value_name = "SECS", default_value_t = 3)]
    pub timeout: u64,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "ANDAGO_GEO_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Seconds before each upstream provider request is abandoned
    #[arg(long, value_name = "SECS", default_value_t = 3)]
    pub upstream_timeout: u64,
}

/// What the device source will report during `locate`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeviceMode {
    /// Emit one fix
    Fix(Coordinate),
    /// Emit a permission-denied error
    Denied,
    /// No device capability
    Unsupported,
}

/// Where the location cache lives during `locate`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLocation {
    /// The XDG cache directory
    Default,
    /// An explicit directory
    Dir(PathBuf),
    /// No cache at all
    Disabled,
}

/// Configuration derived from `locate` arguments
#[derive(Debug, Clone)]
pub struct LocateConfig {
    pub resolver: ResolverConfig,
    pub device: DeviceMode,
    pub cache: CacheLocation,
    pub wait: Duration,
}

/// Parses a `LAT,LNG` pair into a coordinate
///
/// # Returns
/// * `Ok(Coordinate)` if both parts parse and form a real fix
/// * `Err(CliError::InvalidDeviceFix)` otherwise
pub fn parse_device_fix(s: &str) -> Result<Coordinate, CliError> {
    let invalid = || CliError::InvalidDeviceFix(s.to_string());
    let (lat, lng) = s.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    Coordinate::new(lat, lng).ok_or_else(invalid)
}

impl LocateConfig {
    /// Creates a LocateConfig from parsed `locate` arguments
    ///
    /// # Returns
    /// * `Err(CliError)` if `--device` is not a usable fix
    pub fn from_args(args: &LocateArgs) -> Result<Self, CliError> {
        let device = match (&args.device, args.deny_device) {
            (Some(fix), _) => DeviceMode::Fix(parse_device_fix(fix)?),
            (None, true) => DeviceMode::Denied,
            (None, false) => DeviceMode::Unsupported,
        };

        let cache = match (&args.cache_dir, args.no_cache) {
            (_, true) => CacheLocation::Disabled,
            (Some(dir), false) => CacheLocation::Dir(dir.clone()),
            (None, false) => CacheLocation::Default,
        };

        Ok(Self {
            resolver: ResolverConfig {
                ip_endpoint: args.endpoint.clone(),
                request_timeout: Duration::from_secs(args.timeout),
                cache_ttl: DEFAULT_LOCATION_TTL,
            },
            device,
            cache,
            wait: Duration::from_secs(args.wait),
        })
    }
}

impl ServeArgs {
    /// Upstream provider settings for this server
    pub fn upstream_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            timeout: Duration::from_secs(self.upstream_timeout),
            ..UpstreamConfig::default()
        }
    }
}
