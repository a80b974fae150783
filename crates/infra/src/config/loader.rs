//! Configuration loader
//!
//! Loads engine configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the environment if one exists
//! 2. Attempts to load from environment variables
//! 3. If `COSTSYNC_DB_PATH` is missing or a value is invalid, falls back to a
//!    config file found by [`probe_config_paths`]
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `COSTSYNC_DB_PATH`: Database file path (required for env loading)
//! - `COSTSYNC_DB_POOL_SIZE`: Connection pool size
//! - `COSTSYNC_BATCH_INTERVAL`: Window width in seconds
//! - `COSTSYNC_POLL_INTERVAL`: Delay between runner iterations in seconds
//! - `COSTSYNC_STATS_CACHE_TTL`: Usage stats cache TTL in seconds (0 disables)
//! - `COSTSYNC_DEFER_FUTURE_WINDOWS`: Skip windows ending in the future
//!   (true/false)
//!
//! Unset optional variables keep their defaults.
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./costsync.json` or `./costsync.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use costsync_domain::{Config, CostSyncError, DatabaseConfig, Result, SyncConfig};

/// Load configuration with automatic fallback strategy
///
/// # Errors
/// Returns `CostSyncError::Config` if configuration cannot be loaded from
/// either source or the file format is invalid.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CostSyncError::Config` if `COSTSYNC_DB_PATH` is missing or any
/// set variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let path = env_var("COSTSYNC_DB_PATH")?;
    let pool_size =
        env_parse("COSTSYNC_DB_POOL_SIZE", "pool size", defaults.database.pool_size)?;

    let sync = SyncConfig {
        batch_interval_seconds: env_parse(
            "COSTSYNC_BATCH_INTERVAL",
            "batch interval",
            defaults.sync.batch_interval_seconds,
        )?,
        poll_interval_seconds: env_parse(
            "COSTSYNC_POLL_INTERVAL",
            "poll interval",
            defaults.sync.poll_interval_seconds,
        )?,
        stats_cache_ttl_seconds: env_parse(
            "COSTSYNC_STATS_CACHE_TTL",
            "stats cache TTL",
            defaults.sync.stats_cache_ttl_seconds,
        )?,
        defer_future_windows: env_bool(
            "COSTSYNC_DEFER_FUTURE_WINDOWS",
            defaults.sync.defer_future_windows,
        ),
    };

    Ok(Config { database: DatabaseConfig { path, pool_size }, sync })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations.
///
/// # Errors
/// Returns `CostSyncError::Config` if the file is missing, unreadable, or
/// not valid JSON/TOML for [`Config`].
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CostSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CostSyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CostSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration text; format is chosen by file extension.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CostSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CostSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(CostSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe the standard locations for a config file
///
/// Returns the first existing candidate.
pub fn probe_config_paths() -> Option<PathBuf> {
    const NAMES: [&str; 4] = ["config.json", "config.toml", "costsync.json", "costsync.toml"];

    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(NAMES.iter().map(|name| cwd.join(name)));
        candidates.push(cwd.join("../config.json"));
        candidates.push(cwd.join("../config.toml"));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(NAMES.iter().map(|name| exe_dir.join(name)));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CostSyncError::Config(format!("Missing required environment variable: {key}"))
    })
}

/// Parse an optional numeric variable, keeping `default` when unset.
fn env_parse<T>(key: &str, label: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| CostSyncError::Config(format!("Invalid {label}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map_or(default, |s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use parking_lot::Mutex;
    use tempfile::Builder;

    use super::*;

    static ENV_LOCK: Mutex<()> = parking_lot::const_mutex(());

    const ALL_VARS: [&str; 6] = [
        "COSTSYNC_DB_PATH",
        "COSTSYNC_DB_POOL_SIZE",
        "COSTSYNC_BATCH_INTERVAL",
        "COSTSYNC_POLL_INTERVAL",
        "COSTSYNC_STATS_CACHE_TTL",
        "COSTSYNC_DEFER_FUTURE_WINDOWS",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = ENV_LOCK.lock();

        std::env::set_var("COSTSYNC_TEST_BOOL_TRUE", "Yes");
        std::env::set_var("COSTSYNC_TEST_BOOL_FALSE", "off");
        std::env::remove_var("COSTSYNC_TEST_BOOL_MISSING");

        assert!(env_bool("COSTSYNC_TEST_BOOL_TRUE", false));
        assert!(!env_bool("COSTSYNC_TEST_BOOL_FALSE", true));
        assert!(env_bool("COSTSYNC_TEST_BOOL_MISSING", true));
        assert!(!env_bool("COSTSYNC_TEST_BOOL_MISSING", false));

        std::env::remove_var("COSTSYNC_TEST_BOOL_TRUE");
        std::env::remove_var("COSTSYNC_TEST_BOOL_FALSE");
    }

    #[test]
    fn test_load_from_env_full() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        std::env::set_var("COSTSYNC_DB_PATH", "/tmp/costsync.db");
        std::env::set_var("COSTSYNC_DB_POOL_SIZE", "8");
        std::env::set_var("COSTSYNC_BATCH_INTERVAL", "86400");
        std::env::set_var("COSTSYNC_POLL_INTERVAL", "10");
        std::env::set_var("COSTSYNC_STATS_CACHE_TTL", "0");
        std::env::set_var("COSTSYNC_DEFER_FUTURE_WINDOWS", "true");

        let config = load_from_env().expect("env config loads");

        assert_eq!(config.database.path, "/tmp/costsync.db");
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.sync.batch_interval_seconds, 86_400);
        assert_eq!(config.sync.poll_interval_seconds, 10);
        assert_eq!(config.sync.stats_cache_ttl_seconds, 0);
        assert!(config.sync.defer_future_windows);

        clear_env();
    }

    #[test]
    fn test_load_from_env_uses_defaults_for_optional_vars() {
        let _guard = ENV_LOCK.lock();
        clear_env();
        std::env::set_var("COSTSYNC_DB_PATH", "/tmp/costsync.db");

        let config = load_from_env().expect("env config loads");

        assert_eq!(config.sync, SyncConfig::default());
        assert_eq!(config.database.pool_size, DatabaseConfig::default().pool_size);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, CostSyncError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock();
        clear_env();

        std::env::set_var("COSTSYNC_DB_PATH", "/tmp/test.db");
        std::env::set_var("COSTSYNC_POLL_INTERVAL", "soon");

        let err = load_from_env().unwrap_err();
        assert!(err.to_string().contains("poll interval"));

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let mut file = Builder::new().suffix(".toml").tempfile().expect("temp file");
        write!(
            file,
            r#"
[database]
path = "usage.db"

[sync]
batch_interval_seconds = 3600
"#
        )
        .expect("write toml");

        let config = load_from_file(Some(file.path().to_path_buf())).expect("toml loads");

        assert_eq!(config.database.path, "usage.db");
        assert_eq!(config.database.pool_size, DatabaseConfig::default().pool_size);
        assert_eq!(config.sync.batch_interval_seconds, 3_600);
        assert_eq!(config.sync.poll_interval_seconds, SyncConfig::default().poll_interval_seconds);
    }

    #[test]
    fn test_load_from_file_json() {
        let mut file = Builder::new().suffix(".json").tempfile().expect("temp file");
        write!(
            file,
            r#"{{"database": {{"path": "usage.db", "pool_size": 2}}, "sync": {{"defer_future_windows": true}}}}"#
        )
        .expect("write json");

        let config = load_from_file(Some(file.path().to_path_buf())).expect("json loads");

        assert_eq!(config.database.pool_size, 2);
        assert!(config.sync.defer_future_windows);
    }

    #[test]
    fn test_load_from_file_rejects_unknown_extension() {
        let file = Builder::new().suffix(".yaml").tempfile().expect("temp file");

        let err = load_from_file(Some(file.path().to_path_buf())).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));
    }

    #[test]
    fn test_load_from_file_missing() {
        let err = load_from_file(Some(PathBuf::from("/nonexistent/costsync.toml"))).unwrap_err();
        assert!(matches!(err, CostSyncError::Config(_)));
    }
}
