// Beacon - Exposure Notifications Key Server
// Copyright (c) 2025 Beacon Contributors
// Licensed under the MIT License

//! # Beacon - Exposure Notifications key server core
//!
//! Beacon implements the publish-and-revise pipeline for Temporary
//! Exposure Keys (TEKs): it receives user-uploaded keys from mobile
//! clients, validates them against a strict temporal and cryptographic
//! policy, enriches them with verified health-authority claims, and
//! merges them with existing state under a one-shot revision protocol.
//! The same data model and revision discipline is reused when importing
//! keys from peer federation servers.
//!
//! ## Architecture
//!
//! Beacon follows a layered architecture:
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Business logic (publish transform, revision merge, export import)
//! - [`adapters`] - External integrations (PostgreSQL, federation ledger, blob storage)
//! - [`domain`] - Core domain types and models
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust
//! use beacon::core::publish::{Transformer, TransformerConfig};
//! use beacon::domain::{Publish, PublishExposureKey, Result};
//! use beacon::domain::interval::interval_number;
//! use base64::engine::general_purpose::STANDARD;
//! use base64::Engine as _;
//! use chrono::{Duration, Utc};
//!
//! fn main() -> Result<()> {
//!     let transformer = Transformer::new(TransformerConfig {
//!         max_exposure_keys: 30,
//!         max_same_day_keys: 3,
//!         max_interval_start_age: std::time::Duration::from_secs(15 * 24 * 3600),
//!         truncate_window: std::time::Duration::from_secs(3600),
//!         max_symptom_onset_days: 14,
//!         max_valid_symptom_onset_report_days: 28,
//!         default_symptom_onset_days_ago: 4,
//!         debug_release_same_day_keys: false,
//!     })?;
//!
//!     let publish = Publish {
//!         keys: vec![PublishExposureKey {
//!             key: STANDARD.encode([0u8; 16]),
//!             interval_number: interval_number(Utc::now() - Duration::days(2)),
//!             interval_count: 144,
//!             transmission_risk: 0,
//!         }],
//!         health_authority_id: "gov.example.health".to_string(),
//!         ..Publish::default()
//!     };
//!
//!     let response =
//!         transformer.transform_publish(&publish, &["US".to_string()], None, Utc::now())?;
//!     assert_eq!(response.exposures.len(), 1);
//!     Ok(())
//! }
//! ```
//!
//! The produced exposures are merged against stored state by
//! [`adapters::exposure::ExposureStore::insert_and_revise_exposures`],
//! which applies the revision lattice inside one ReadCommitted
//! transaction.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
