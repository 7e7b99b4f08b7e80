//! Init command implementation
//!
//! Connects to the configured database and applies the schema migration.

use clap::Args;

use crate::adapters::database::Db;
use crate::config::load_config;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let db = match Db::new(&config.database).await {
            Ok(db) => db,
            Err(e) => {
                println!("❌ Failed to create database client");
                println!("   Error: {e}");
                return Ok(4);
            }
        };

        if let Err(e) = db.test_connection().await {
            println!("❌ Failed to connect to database");
            println!("   Error: {e}");
            return Ok(4);
        }

        if let Err(e) = db.ensure_schema().await {
            println!("❌ Failed to apply schema migration");
            println!("   Error: {e}");
            return Ok(5);
        }

        println!("✅ Database schema initialized");
        Ok(0)
    }
}
