//! Configuration loader
//!
//! Loads adapter configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required variables are missing, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `ROAMSYNC_PARTNER_BASE_URL`: Partner API base URL
//! - `ROAMSYNC_PARTNER_ID`: Identifier the adapter authenticates as
//! - `ROAMSYNC_OPERATOR_ID`: Operator the pushed entities belong to
//!
//! Optional (defaults apply when unset):
//! - `ROAMSYNC_API_TOKEN`: Bearer token for partner requests
//! - `ROAMSYNC_REQUEST_TIMEOUT_SECS`, `ROAMSYNC_MAX_BATCH_SIZE`
//! - `ROAMSYNC_FLUSH_QUIET_INTERVAL`, `ROAMSYNC_FAST_STATUS_INTERVAL`,
//!   `ROAMSYNC_HEARTBEAT_INTERVAL`, `ROAMSYNC_RECORD_FLUSH_INTERVAL`
//!   (all in seconds)
//! - `ROAMSYNC_HEARTBEAT_ENABLED`, `ROAMSYNC_DATA_PUSH_ENABLED`,
//!   `ROAMSYNC_STATUS_PUSH_ENABLED`, `ROAMSYNC_CHARGE_RECORD_PUSH_ENABLED`,
//!   `ROAMSYNC_RETRY_FAILED_PUSHES` (true/false)
//!
//! ## File Locations
//! The loader probes `roamsync.{toml,json}` and `config.{toml,json}` in the
//! current working directory, up to two parent directories, and next to the
//! executable.

use std::path::{Path, PathBuf};

use roamsync_domain::constants::CONFIG_FILE_CANDIDATES;
use roamsync_domain::{AdapterConfig, PartnerConfig, Result, RoamsyncError, SyncSettings};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `RoamsyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Validation fails
pub fn load() -> Result<AdapterConfig> {
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
/// The partner connection variables are required; everything else falls back
/// to the documented defaults.
///
/// # Errors
/// Returns `RoamsyncError::Config` if required variables are missing, values
/// fail to parse, or the assembled configuration fails validation.
pub fn load_from_env() -> Result<AdapterConfig> {
    let defaults_partner = PartnerConfig::default();
    let defaults_sync = SyncSettings::default();

    let partner = PartnerConfig {
        base_url: env_var("ROAMSYNC_PARTNER_BASE_URL")?,
        partner_id: env_var("ROAMSYNC_PARTNER_ID")?,
        operator_id: env_var("ROAMSYNC_OPERATOR_ID")?,
        api_token: std::env::var("ROAMSYNC_API_TOKEN").ok(),
        request_timeout_secs: env_u64(
            "ROAMSYNC_REQUEST_TIMEOUT_SECS",
            defaults_partner.request_timeout_secs,
        )?,
        max_batch_size: env_u64("ROAMSYNC_MAX_BATCH_SIZE", defaults_partner.max_batch_size as u64)?
            as usize,
    };

    let sync = SyncSettings {
        flush_quiet_interval_secs: env_u64(
            "ROAMSYNC_FLUSH_QUIET_INTERVAL",
            defaults_sync.flush_quiet_interval_secs,
        )?,
        fast_status_interval_secs: env_u64(
            "ROAMSYNC_FAST_STATUS_INTERVAL",
            defaults_sync.fast_status_interval_secs,
        )?,
        heartbeat_interval_secs: env_u64(
            "ROAMSYNC_HEARTBEAT_INTERVAL",
            defaults_sync.heartbeat_interval_secs,
        )?,
        record_flush_interval_secs: env_u64(
            "ROAMSYNC_RECORD_FLUSH_INTERVAL",
            defaults_sync.record_flush_interval_secs,
        )?,
        heartbeat_enabled: env_bool("ROAMSYNC_HEARTBEAT_ENABLED", true),
        data_push_enabled: env_bool("ROAMSYNC_DATA_PUSH_ENABLED", true),
        status_push_enabled: env_bool("ROAMSYNC_STATUS_PUSH_ENABLED", true),
        charge_record_push_enabled: env_bool("ROAMSYNC_CHARGE_RECORD_PUSH_ENABLED", true),
        retry_failed_pushes: env_bool("ROAMSYNC_RETRY_FAILED_PUSHES", true),
    };

    let config = AdapterConfig { partner, sync };
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RoamsyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Validation fails
pub fn load_from_file(path: Option<PathBuf>) -> Result<AdapterConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RoamsyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RoamsyncError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| RoamsyncError::Config(format!("Failed to read config file: {e}")))?;

    let config = parse_config(&contents, &config_path)?;
    config.validate()?;
    Ok(config)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<AdapterConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| RoamsyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| RoamsyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(RoamsyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, up to two parent directories,
/// and the executable's directory, in that order.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        for base in ["", "..", "../.."] {
            for name in CONFIG_FILE_CANDIDATES {
                candidates.push(cwd.join(base).join(name));
            }
        }
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            for name in CONFIG_FILE_CANDIDATES {
                candidates.push(exe_dir.join(name));
            }
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| RoamsyncError::Config(format!("Missing required environment variable: {key}")))
}

/// Parse an unsigned integer from an environment variable, falling back to
/// `default` when unset.
fn env_u64(key: &str, default: u64) -> Result<u64> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map_err(|e| RoamsyncError::Config(format!("Invalid value for {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const REQUIRED_VARS: &[&str] =
        &["ROAMSYNC_PARTNER_BASE_URL", "ROAMSYNC_PARTNER_ID", "ROAMSYNC_OPERATOR_ID"];

    const OPTIONAL_VARS: &[&str] = &[
        "ROAMSYNC_API_TOKEN",
        "ROAMSYNC_REQUEST_TIMEOUT_SECS",
        "ROAMSYNC_MAX_BATCH_SIZE",
        "ROAMSYNC_FLUSH_QUIET_INTERVAL",
        "ROAMSYNC_FAST_STATUS_INTERVAL",
        "ROAMSYNC_HEARTBEAT_INTERVAL",
        "ROAMSYNC_RECORD_FLUSH_INTERVAL",
        "ROAMSYNC_HEARTBEAT_ENABLED",
        "ROAMSYNC_DATA_PUSH_ENABLED",
        "ROAMSYNC_STATUS_PUSH_ENABLED",
        "ROAMSYNC_CHARGE_RECORD_PUSH_ENABLED",
        "ROAMSYNC_RETRY_FAILED_PUSHES",
    ];

    fn clear_env() {
        for key in REQUIRED_VARS.iter().chain(OPTIONAL_VARS) {
            std::env::remove_var(key);
        }
    }

    fn set_required() {
        std::env::set_var("ROAMSYNC_PARTNER_BASE_URL", "https://partner.example/api");
        std::env::set_var("ROAMSYNC_PARTNER_ID", "CPO-DE-ABC");
        std::env::set_var("ROAMSYNC_OPERATOR_ID", "DE*ABC");
    }

    #[test]
    fn env_bool_parsing() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");

        std::env::set_var("TEST_BOOL_TRUE", "YES");
        std::env::set_var("TEST_BOOL_FALSE", "off");
        assert!(env_bool("TEST_BOOL_TRUE", false));
        assert!(!env_bool("TEST_BOOL_FALSE", true));

        std::env::remove_var("TEST_BOOL_MISSING");
        assert!(env_bool("TEST_BOOL_MISSING", true));
        assert!(!env_bool("TEST_BOOL_MISSING", false));

        std::env::remove_var("TEST_BOOL_TRUE");
        std::env::remove_var("TEST_BOOL_FALSE");
    }

    #[test]
    fn load_from_env_with_only_required_vars_uses_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();

        let config = load_from_env().expect("required vars suffice");
        assert_eq!(config.partner.base_url, "https://partner.example/api");
        assert_eq!(config.partner.api_token, None);
        assert_eq!(config.sync, SyncSettings::default());

        clear_env();
    }

    #[test]
    fn load_from_env_honors_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("ROAMSYNC_API_TOKEN", "secret");
        std::env::set_var("ROAMSYNC_HEARTBEAT_INTERVAL", "120");
        std::env::set_var("ROAMSYNC_MAX_BATCH_SIZE", "25");
        std::env::set_var("ROAMSYNC_DATA_PUSH_ENABLED", "false");

        let config = load_from_env().expect("overrides parse");
        assert_eq!(config.partner.api_token.as_deref(), Some("secret"));
        assert_eq!(config.partner.max_batch_size, 25);
        assert_eq!(config.sync.heartbeat_interval_secs, 120);
        assert!(!config.sync.data_push_enabled);

        clear_env();
    }

    #[test]
    fn load_from_env_missing_required_var_fails() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("ROAMSYNC_PARTNER_BASE_URL", "https://partner.example/api");

        let err = load_from_env().expect_err("partner id missing");
        assert!(matches!(err, RoamsyncError::Config(_)));

        clear_env();
    }

    #[test]
    fn load_from_env_invalid_number_fails() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("ROAMSYNC_HEARTBEAT_INTERVAL", "not-a-number");

        let err = load_from_env().expect_err("invalid interval rejected");
        assert!(matches!(err, RoamsyncError::Config(_)));

        clear_env();
    }

    #[test]
    fn load_from_env_validates_the_result() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_required();
        std::env::set_var("ROAMSYNC_HEARTBEAT_INTERVAL", "0");

        let err = load_from_env().expect_err("zero interval rejected");
        assert!(matches!(err, RoamsyncError::Config(_)));

        clear_env();
    }

    #[test]
    fn load_from_file_toml() {
        let toml_content = r#"
[partner]
base_url = "https://partner.example/api"
partner_id = "CPO-DE-ABC"
operator_id = "DE*ABC"
api_token = "secret"

[sync]
fast_status_interval_secs = 5
heartbeat_enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("TOML loads");
        assert_eq!(config.partner.partner_id, "CPO-DE-ABC");
        assert_eq!(config.sync.fast_status_interval_secs, 5);
        assert!(!config.sync.heartbeat_enabled);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn load_from_file_json() {
        let json_content = r#"{
            "partner": {
                "base_url": "https://partner.example/api",
                "partner_id": "CPO-DE-ABC",
                "operator_id": "DE*ABC",
                "max_batch_size": 10
            },
            "sync": {
                "flush_quiet_interval_secs": 45
            }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let config = load_from_file(Some(path.clone())).expect("JSON loads");
        assert_eq!(config.partner.max_batch_size, 10);
        assert_eq!(config.sync.flush_quiet_interval_secs, 45);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/roamsync.toml")));
        assert!(matches!(result, Err(RoamsyncError::Config(_))));
    }

    #[test]
    fn load_from_file_rejects_invalid_partner_section() {
        // Parses fine but fails validation: no partner_id.
        let toml_content = r#"
[partner]
base_url = "https://partner.example/api"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(matches!(result, Err(RoamsyncError::Config(_))));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn parse_config_unsupported_format() {
        let result = parse_config("partner: {}", &PathBuf::from("roamsync.yaml"));
        assert!(matches!(result, Err(RoamsyncError::Config(_))));
    }
}
