//! Import command implementation
//!
//! Reads a peer export payload from blob storage, decodes it under the
//! configured import policy, and merges the keys through the revision
//! engine into the exposure table.

use chrono::Utc;
use clap::Args;

use crate::adapters::database::Db;
use crate::adapters::exposure::ExposureStore;
use crate::adapters::storage::{Blobstore, FilesystemStorage};
use crate::config::load_config;
use crate::core::export_import::{decode_export_payload, exposures_from_export};
use crate::domain::interval::truncate_window;

/// Arguments for the import command
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Object name of the export payload
    #[arg(long)]
    pub object: String,

    /// Container to read from (defaults to storage.container)
    #[arg(long)]
    pub container: Option<String>,
}

impl ImportArgs {
    /// Execute the import command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let container = self
            .container
            .clone()
            .unwrap_or_else(|| config.storage.container.clone());
        let storage = FilesystemStorage::new(config.storage.root.clone());
        let payload = match storage.get_object(&container, &self.object).await {
            Ok(p) => p,
            Err(e) => {
                println!("❌ Failed to read export payload {container}/{}", self.object);
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let export = match decode_export_payload(&payload) {
            Ok(e) => e,
            Err(e) => {
                println!("❌ Failed to decode export payload");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let import_config = match config.import.export_import_config() {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Invalid import policy");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        // Imported keys share one created_at per batch window, like
        // locally published ones.
        let received_at = truncate_window(
            Utc::now(),
            std::time::Duration::from_secs(config.publish.truncate_window_seconds),
        );
        let (exposures, key_errors) = exposures_from_export(&export, &import_config, received_at);

        for error in &key_errors {
            println!("⚠️  {error}");
        }

        println!(
            "Decoded {} keys ({} skipped) from {}",
            exposures.len(),
            key_errors.len(),
            self.object
        );

        if config.application.dry_run {
            println!("Dry run: skipping database writes");
            return Ok(0);
        }

        let db = match Db::new(&config.database).await {
            Ok(db) => db,
            Err(e) => {
                println!("❌ Failed to connect to database");
                println!("   Error: {e}");
                return Ok(4);
            }
        };
        let store = ExposureStore::new(db);

        match store.insert_and_revise_exposures(exposures).await {
            Ok(outcome) => {
                println!(
                    "✅ Imported: {} inserted, {} revised, {} unchanged",
                    outcome.inserted, outcome.revised, outcome.unchanged
                );
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to merge imported keys");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}
