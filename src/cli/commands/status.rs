//! Status command implementation
//!
//! Displays federation query bookmarks and their recent sync history.

use clap::Args;

use crate::adapters::database::Db;
use crate::adapters::federation::FederationInStore;
use crate::config::load_config;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show only this query
    #[arg(long)]
    pub query_id: Option<String>,

    /// Number of sync records to show per query
    #[arg(long, default_value_t = 5)]
    pub syncs: i64,
}

impl StatusArgs {
    /// Execute the status command
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
                println!("❌ Failed to connect to database");
                println!("   Error: {e}");
                return Ok(4);
            }
        };
        let store = FederationInStore::new(db);

        let queries = match store.list_queries().await {
            Ok(q) => q,
            Err(e) => {
                println!("❌ Failed to load federation queries");
                println!("   Error: {e}");
                return Ok(5);
            }
        };

        let queries: Vec<_> = queries
            .into_iter()
            .filter(|q| {
                self.query_id
                    .as_ref()
                    .map_or(true, |wanted| &q.query_id == wanted)
            })
            .collect();

        if queries.is_empty() {
            println!("No federation queries configured.");
            return Ok(0);
        }

        for query in queries {
            println!("📡 {} ({})", query.query_id, query.server_addr);
            println!(
                "   regions: include {:?} exclude {:?}",
                query.include_regions, query.exclude_regions
            );
            match &query.last_timestamp {
                Some(ts) => println!("   bookmark: {}", ts.format("%Y-%m-%d %H:%M:%S")),
                None => println!("   bookmark: never synced"),
            }

            let syncs = match store.list_syncs(&query.query_id, self.syncs).await {
                Ok(s) => s,
                Err(e) => {
                    println!("   ⚠️  failed to load sync history: {e}");
                    continue;
                }
            };

            for sync in syncs {
                let completed = sync
                    .completed
                    .map(|c| c.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| "in flight".to_string());
                println!(
                    "   sync {}: started {} completed {} insertions {}",
                    sync.sync_id,
                    sync.started.format("%Y-%m-%d %H:%M:%S"),
                    completed,
                    sync.insertions.unwrap_or(0)
                );
            }
            println!();
        }

        Ok(0)
    }
}
