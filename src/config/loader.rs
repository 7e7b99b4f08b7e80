//! Configuration loader with TOML parsing and environment overrides
//!
//! Loading performs, in order: read the TOML file, substitute `${VAR}`
//! references from the environment, parse, apply `BEACON_*` environment
//! overrides, and validate. Secrets therefore never need to live in the
//! config file itself.
//!
//! # Environment Variables
//!
//! `${VAR_NAME}` inside the TOML file is replaced with the variable's
//! value and fails the load when the variable is unset:
//!
//! ```toml
//! [database]
//! connection_string = "${BEACON_DATABASE_URL}"
//! ```
//!
//! `BEACON_<SECTION>_<KEY>` variables override individual values after
//! parsing, e.g. `BEACON_APPLICATION_LOG_LEVEL=debug` or
//! `BEACON_DATABASE_CONNECTION_STRING=postgres://...`.

use regex::Regex;
use std::path::Path;

use crate::config::schema::BeaconConfig;
use crate::config::secret::secret_string;
use crate::domain::errors::BeaconError;
use crate::domain::result::Result;

/// Loads configuration from a TOML file
///
/// # Errors
///
/// Returns an error if the file cannot be read, a `${VAR}` reference is
/// unset, the TOML does not parse, or validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<BeaconConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(BeaconError::Configuration(format!(
            "configuration file not found: {}",
            path.display()
        )));
    }

    let raw = std::fs::read_to_string(path)
        .map_err(|e| BeaconError::Configuration(format!("reading {}: {e}", path.display())))?;

    let substituted = substitute_env_vars(&raw)?;
    let mut config: BeaconConfig = toml::from_str(&substituted)?;
    apply_env_overrides(&mut config)?;

    config.validate().map_err(BeaconError::Configuration)?;

    tracing::debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}

/// Replaces `${VAR_NAME}` references with environment variable values.
fn substitute_env_vars(input: &str) -> Result<String> {
    // Compiled per load; configuration loading is not hot.
    let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| BeaconError::Configuration(format!("invalid substitution pattern: {e}")))?;

    let mut missing = Vec::new();
    let substituted = pattern.replace_all(input, |caps: &regex::Captures<'_>| {
        let name = &caps[1];
        match std::env::var(name) {
            Ok(value) => value,
            Err(_) => {
                missing.push(name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = missing.first() {
        return Err(BeaconError::Configuration(format!(
            "environment variable {name} referenced in configuration is not set"
        )));
    }
    Ok(substituted.into_owned())
}

/// Applies `BEACON_*` overrides onto a parsed configuration.
fn apply_env_overrides(config: &mut BeaconConfig) -> Result<()> {
    if let Ok(value) = std::env::var("BEACON_APPLICATION_LOG_LEVEL") {
        config.application.log_level = value;
    }
    if let Ok(value) = std::env::var("BEACON_APPLICATION_DRY_RUN") {
        config.application.dry_run = parse_bool("BEACON_APPLICATION_DRY_RUN", &value)?;
    }
    if let Ok(value) = std::env::var("BEACON_DATABASE_CONNECTION_STRING") {
        config.database.connection_string = secret_string(value);
    }
    if let Ok(value) = std::env::var("BEACON_DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections =
            parse_number("BEACON_DATABASE_MAX_CONNECTIONS", &value)?;
    }
    if let Ok(value) = std::env::var("BEACON_PUBLISH_MAX_EXPOSURE_KEYS") {
        config.publish.max_exposure_keys =
            parse_number("BEACON_PUBLISH_MAX_EXPOSURE_KEYS", &value)?;
    }
    if let Ok(value) = std::env::var("BEACON_PUBLISH_DEBUG_RELEASE_SAME_DAY_KEYS") {
        config.publish.debug_release_same_day_keys =
            parse_bool("BEACON_PUBLISH_DEBUG_RELEASE_SAME_DAY_KEYS", &value)?;
    }
    if let Ok(value) = std::env::var("BEACON_FEDERATION_LOCK_TTL_SECONDS") {
        config.federation.lock_ttl_seconds =
            parse_number("BEACON_FEDERATION_LOCK_TTL_SECONDS", &value)?;
    }
    if let Ok(value) = std::env::var("BEACON_IMPORT_EXPORT_IMPORT_ID") {
        config.import.export_import_id = parse_number("BEACON_IMPORT_EXPORT_IMPORT_ID", &value)?;
    }
    if let Ok(value) = std::env::var("BEACON_STORAGE_ROOT") {
        config.storage.root = value;
    }
    Ok(())
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(BeaconError::Configuration(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.parse().map_err(|_| {
        BeaconError::Configuration(format!("{name} must be a number, got '{value}'"))
    })
}
