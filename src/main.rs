//! andago-geo - resolve and serve session location hints
//!
//! `locate` runs a single resolver session and prints the outcome as JSON on
//! stdout. `serve` hosts the IP lookup endpoint the resolver consumes.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use andago_geo::cache::CacheManager;
use andago_geo::cli::{CacheLocation, Cli, Command, DeviceMode, LocateConfig, ServeArgs};
use andago_geo::device::{
    ChannelDeviceSource, DeviceLocationSource, DeviceReading, LocationError,
    UnsupportedDeviceSource,
};
use andago_geo::server::{build_app, AppState, UpstreamLookup};
use andago_geo::{LocationResolver, LocationSnapshot};

/// What `locate` prints
#[derive(Debug, Serialize)]
struct LocateReport {
    #[serde(flatten)]
    snapshot: LocationSnapshot,
    is_using_low_confidence_source: bool,
}

/// Sets up logging to stderr so stdout stays machine-readable
fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Builds the device source for a `locate` run
async fn device_source(mode: DeviceMode) -> Box<dyn DeviceLocationSource> {
    match mode {
        DeviceMode::Fix(coordinate) => {
            let (source, feed) = ChannelDeviceSource::new();
            feed.send_reading(DeviceReading::new(
                coordinate.latitude(),
                coordinate.longitude(),
            ))
            .await;
            Box::new(source)
        }
        DeviceMode::Denied => {
            let (source, feed) = ChannelDeviceSource::new();
            feed.send_error(LocationError::PermissionDenied).await;
            Box::new(source)
        }
        DeviceMode::Unsupported => Box::new(UnsupportedDeviceSource),
    }
}

async fn locate(config: LocateConfig) -> anyhow::Result<()> {
    let cache_manager = match &config.cache {
        CacheLocation::Default => CacheManager::new(),
        CacheLocation::Dir(dir) => Some(CacheManager::with_dir(dir.clone())),
        CacheLocation::Disabled => None,
    };
    if matches!(config.cache, CacheLocation::Default) && cache_manager.is_none() {
        tracing::warn!("no cache directory available, running without a location cache");
    }

    let device = device_source(config.device).await;
    let resolver = LocationResolver::from_config(&config.resolver, cache_manager, device)
        .context("invalid resolver configuration")?;

    let mut updates = resolver.subscribe();
    resolver.initialize();

    let settled = futures::future::join(resolver.ip_lookup_finished(), async {
        let _ = updates.wait_for(|state| !state.is_loading).await;
    });
    if tokio::time::timeout(config.wait, settled).await.is_err() {
        tracing::warn!(wait = ?config.wait, "sources did not settle in time, reporting current state");
    }

    let snapshot = resolver.snapshot();
    let report = LocateReport {
        is_using_low_confidence_source: snapshot.is_using_low_confidence_source(),
        snapshot,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let upstream = UpstreamLookup::new(args.upstream_config())?;
    let app = build_app(AppState {
        upstream: Arc::new(upstream),
    });

    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    tracing::info!(bind = %args.bind, "serving IP lookup endpoint");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Locate(args) => locate(LocateConfig::from_args(&args)?).await,
        Command::Serve(args) => serve(args).await,
    }
}
