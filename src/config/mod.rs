//! Configuration management for Beacon.
//!
//! TOML-based configuration with environment variable substitution,
//! `BEACON_*` overrides, and validation on load.
//!
//! # Example Configuration
//!
//! ```toml
//! [database]
//! connection_string = "${BEACON_DATABASE_URL}"
//!
//! [publish]
//! max_exposure_keys = 30
//! max_same_day_keys = 3
//!
//! [import]
//! export_import_id = 7
//! default_report_type = "confirmed"
//!
//! [logging]
//! local_enabled = true
//! local_path = "/var/log/beacon"
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::load_config;
pub use schema::{
    ApplicationConfig, BeaconConfig, DatabaseConfig, Environment, FederationConfig, ImportConfig,
    LoggingConfig, PublishConfig, StorageConfig,
};
pub use secret::{secret_string, SecretString, SecretValue};
