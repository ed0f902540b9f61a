//! Integration tests for CLI argument handling
//!
//! Runs the `locate` subcommand against an unreachable IP endpoint so the
//! outcome depends only on the device flags and the cache directory.

use std::process::Command;

use tempfile::TempDir;

/// Nothing listens on the discard port, so the IP lookup fails fast
const DEAD_ENDPOINT: &str = "http://127.0.0.1:9/api/geo/ip";

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_andago-geo"))
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("ANDAGO_GEO_ENDPOINT")
        .output()
        .expect("Failed to execute andago-geo")
}

fn locate_json(extra: &[&str], cache_dir: &TempDir) -> serde_json::Value {
    let cache_dir = cache_dir.path().to_string_lossy().into_owned();
    let mut args = vec![
        "locate",
        "--endpoint",
        DEAD_ENDPOINT,
        "--timeout",
        "1",
        "--cache-dir",
        cache_dir.as_str(),
    ];
    args.extend_from_slice(extra);

    let output = run_cli(&args);
    assert!(
        output.status.success(),
        "locate should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("andago-geo"), "Help should mention andago-geo");
    assert!(stdout.contains("locate"), "Help should mention locate");
    assert!(stdout.contains("serve"), "Help should mention serve");
}

#[test]
fn test_invalid_device_fix_prints_error_and_exits() {
    let output = run_cli(&["locate", "--device", "nowhere", "--no-cache"]);
    assert!(!output.status.success(), "Expected invalid fix to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Invalid device fix"),
        "Should print error message about invalid fix: {}",
        stderr
    );
}

#[test]
fn test_locate_with_device_fix_reports_and_caches_it() {
    let cache_dir = TempDir::new().expect("Failed to create temp directory");

    let json = locate_json(&["--device", "21.03,105.85"], &cache_dir);

    assert_eq!(json["coordinate"]["latitude"], 21.03);
    assert_eq!(json["coordinate"]["longitude"], 105.85);
    assert_eq!(json["provenance"], "device");
    assert_eq!(json["is_loading"], false);
    assert_eq!(json["is_using_low_confidence_source"], false);
    assert!(json["last_error"].is_null());
    assert!(cache_dir.path().join("andago_geo_cache.json").exists());
}

#[test]
fn test_second_run_starts_from_cache() {
    let cache_dir = TempDir::new().expect("Failed to create temp directory");
    locate_json(&["--device", "16.05,108.2"], &cache_dir);

    let json = locate_json(&["--deny-device"], &cache_dir);

    assert_eq!(json["coordinate"]["latitude"], 16.05);
    assert_eq!(json["provenance"], "cache");
    assert!(json["last_error"].is_null(), "cached fix suppresses the error");
}

#[test]
fn test_locate_with_denied_device_reports_error() {
    let cache_dir = TempDir::new().expect("Failed to create temp directory");

    let json = locate_json(&["--deny-device"], &cache_dir);

    assert!(json["coordinate"].is_null());
    assert_eq!(json["last_error"], "permission_denied");
    assert_eq!(json["is_loading"], false);
}

#[cfg(test)]
mod unit_tests {
    //! Unit tests for CLI parsing that don't require running the binary

    use andago_geo::cli::{parse_device_fix, Cli, Command, DeviceMode, LocateConfig};
    use clap::Parser;

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["andago-geo"]).is_err());
    }

    #[test]
    fn test_cli_locate_endpoint_flag() {
        let cli = Cli::parse_from([
            "andago-geo",
            "locate",
            "--endpoint",
            "https://andago.example/api/geo/ip",
        ]);
        let Command::Locate(args) = cli.command else {
            panic!("expected locate");
        };
        let config = LocateConfig::from_args(&args).unwrap();
        assert_eq!(
            config.resolver.ip_endpoint,
            "https://andago.example/api/geo/ip"
        );
        assert_eq!(config.device, DeviceMode::Unsupported);
    }

    #[test]
    fn test_parse_device_fix_invalid_returns_error() {
        assert!(parse_device_fix("inf,0").is_err());
    }

    #[test]
    fn test_cli_log_level_is_global() {
        let cli = Cli::parse_from(["andago-geo", "serve", "--log-level", "debug"]);
        assert_eq!(cli.log_level, "debug");
    }
}
