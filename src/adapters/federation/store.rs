//! Federation-in ledger store
//!
//! Persists the per-query bookmark and the per-run sync history. A sync
//! worker acquires the query's named lock, calls [`FederationInStore::start_sync`],
//! pulls and merges keys, and finalizes through the returned
//! [`SyncHandle`] on every exit path.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio_postgres::Row;

use crate::adapters::database::{read_committed, Db, LockHandle};
use crate::adapters::federation::model::{
    unix_to_timestamp, FederationInQuery, FederationInSync, FetchState,
};
use crate::domain::errors::BeaconError;
use crate::domain::result::Result;
use std::time::Duration;

/// Store for federation-in queries and sync records
#[derive(Clone)]
pub struct FederationInStore {
    db: Db,
}

impl FederationInStore {
    /// Creates a store on the shared client.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Acquires the named advisory lock guarding one query's sync.
    ///
    /// The TTL bounds the worst case: if a worker dies without releasing,
    /// another may assume the sync once the TTL lapses.
    pub async fn lock(&self, lock_id: &str, ttl: Duration) -> Result<LockHandle> {
        self.db.try_lock(lock_id, ttl).await
    }

    /// Loads a query bookmark by id.
    pub async fn get_query(&self, query_id: &str) -> Result<Option<FederationInQuery>> {
        let conn = self.db.get_connection().await?;
        let row = conn
            .query_opt(
                "SELECT query_id, server_addr, audience, include_regions, exclude_regions, \
                     only_local_provenance, only_travelers, last_timestamp, primary_cursor, \
                     last_revised_timestamp, revised_cursor
                 FROM federation_in_query WHERE query_id = $1",
                &[&query_id],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("get federation in query: {e}")))?;
        Ok(row.map(|r| query_from_row(&r)))
    }

    /// Lists all query bookmarks.
    pub async fn list_queries(&self) -> Result<Vec<FederationInQuery>> {
        let conn = self.db.get_connection().await?;
        let rows = conn
            .query(
                "SELECT query_id, server_addr, audience, include_regions, exclude_regions, \
                     only_local_provenance, only_travelers, last_timestamp, primary_cursor, \
                     last_revised_timestamp, revised_cursor
                 FROM federation_in_query ORDER BY query_id",
                &[],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("listing federation in queries: {e}")))?;
        Ok(rows.iter().map(query_from_row).collect())
    }

    /// Upserts a query bookmark.
    ///
    /// Overwrites the peer coordinates of an existing query with the same
    /// id; the cursor pair is only ever advanced by a finalized sync.
    pub async fn upsert_query(&self, query: &FederationInQuery) -> Result<()> {
        let mut conn = self.db.get_connection().await?;
        let tx = read_committed(&mut conn).await?;
        tx.execute(
            "INSERT INTO federation_in_query
                 (query_id, server_addr, audience, include_regions, exclude_regions, \
                  only_local_provenance, only_travelers)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (query_id) DO UPDATE
                 SET server_addr = $2, audience = $3, include_regions = $4, \
                     exclude_regions = $5, only_local_provenance = $6, only_travelers = $7",
            &[
                &query.query_id,
                &query.server_addr,
                &query.audience,
                &query.include_regions,
                &query.exclude_regions,
                &query.only_local_provenance,
                &query.only_travelers,
            ],
        )
        .await
        .map_err(|e| BeaconError::Database(format!("upserting federation query: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| BeaconError::Database(format!("committing query upsert: {e}")))?;
        Ok(())
    }

    /// Loads a sync record by id.
    pub async fn get_sync(&self, sync_id: i64) -> Result<Option<FederationInSync>> {
        let conn = self.db.get_connection().await?;
        let row = conn
            .query_opt(
                "SELECT sync_id, query_id, started, completed, insertions, max_timestamp, \
                     max_revised_timestamp
                 FROM federation_in_sync WHERE sync_id = $1",
                &[&sync_id],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("get federation in sync: {e}")))?;
        Ok(row.map(|r| sync_from_row(&r)))
    }

    /// Lists the most recent sync records for a query, newest first.
    pub async fn list_syncs(&self, query_id: &str, limit: i64) -> Result<Vec<FederationInSync>> {
        let conn = self.db.get_connection().await?;
        let rows = conn
            .query(
                "SELECT sync_id, query_id, started, completed, insertions, max_timestamp, \
                     max_revised_timestamp
                 FROM federation_in_sync WHERE query_id = $1
                 ORDER BY started DESC LIMIT $2",
                &[&query_id, &limit],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("listing federation syncs: {e}")))?;
        Ok(rows.iter().map(sync_from_row).collect())
    }

    /// Records that a sync of `query` started at `started`.
    ///
    /// Returns a [`SyncHandle`] whose
    /// [`finalize`](SyncHandle::finalize) must be invoked on every exit
    /// path to close the historical record.
    pub async fn start_sync(
        &self,
        query: &FederationInQuery,
        started: DateTime<Utc>,
    ) -> Result<SyncHandle> {
        let conn = self.db.get_connection().await?;
        let row = conn
            .query_one(
                "INSERT INTO federation_in_sync (query_id, started) VALUES ($1, $2) \
                 RETURNING sync_id",
                &[&query.query_id, &started],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("inserting federation sync: {e}")))?;

        Ok(SyncHandle {
            sync_id: row.get(0),
            started,
            // Measures wall time between start and finalize so the
            // finalizer need not be handed a clock.
            started_timer: Instant::now(),
            db: self.db.clone(),
        })
    }
}

/// In-flight sync record
///
/// Carries the sync row id and the timer needed to finalize the record;
/// unlike a captured closure, the state is inspectable by the caller.
pub struct SyncHandle {
    sync_id: i64,
    started: DateTime<Utc>,
    started_timer: Instant,
    db: Db,
}

impl SyncHandle {
    /// Row id of the sync record.
    pub fn sync_id(&self) -> i64 {
        self.sync_id
    }

    /// Finalizes the sync record and, when keys were inserted, advances
    /// the query bookmark — both in one transaction.
    ///
    /// A sync that inserted nothing leaves the bookmark untouched: an
    /// empty fetch state must not move the cursors past keys a transient
    /// upstream failure withheld.
    pub async fn finalize(
        self,
        state: &FetchState,
        query: &mut FederationInQuery,
        total_inserted: i64,
    ) -> Result<()> {
        let elapsed = chrono::Duration::from_std(self.started_timer.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let completed = self.started + elapsed;

        let mut conn = self.db.get_connection().await?;
        let tx = read_committed(&mut conn).await?;

        if total_inserted > 0 {
            query.update_fetch_state(state);
            tx.execute(
                "UPDATE federation_in_query
                 SET last_timestamp = $1, primary_cursor = $2, \
                     last_revised_timestamp = $3, revised_cursor = $4
                 WHERE query_id = $5",
                &[
                    &query.last_timestamp,
                    &query.primary_cursor,
                    &query.last_revised_timestamp,
                    &query.revised_cursor,
                    &query.query_id,
                ],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("updating federation query state: {e}")))?;
        }

        let (max_timestamp, max_revised_timestamp) = if total_inserted > 0 {
            (
                Some(unix_to_timestamp(state.key_cursor.timestamp)),
                Some(unix_to_timestamp(state.revised_key_cursor.timestamp)),
            )
        } else {
            (None, None)
        };

        let insertions = i32::try_from(total_inserted).unwrap_or(i32::MAX);
        tx.execute(
            "UPDATE federation_in_sync
             SET completed = $1, insertions = $2, max_timestamp = $3, max_revised_timestamp = $4
             WHERE sync_id = $5",
            &[
                &completed,
                &insertions,
                &max_timestamp,
                &max_revised_timestamp,
                &self.sync_id,
            ],
        )
        .await
        .map_err(|e| BeaconError::Database(format!("updating federation sync: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| BeaconError::Database(format!("committing sync finalize: {e}")))?;

        tracing::info!(
            sync_id = self.sync_id,
            insertions = total_inserted,
            "finalized federation sync"
        );
        Ok(())
    }
}

fn query_from_row(row: &Row) -> FederationInQuery {
    FederationInQuery {
        query_id: row.get("query_id"),
        server_addr: row.get("server_addr"),
        audience: row.get("audience"),
        include_regions: row.get("include_regions"),
        exclude_regions: row.get("exclude_regions"),
        only_local_provenance: row.get("only_local_provenance"),
        only_travelers: row.get("only_travelers"),
        last_timestamp: row.get("last_timestamp"),
        primary_cursor: row.get("primary_cursor"),
        last_revised_timestamp: row.get("last_revised_timestamp"),
        revised_cursor: row.get("revised_cursor"),
    }
}

fn sync_from_row(row: &Row) -> FederationInSync {
    FederationInSync {
        sync_id: row.get("sync_id"),
        query_id: row.get("query_id"),
        started: row.get("started"),
        completed: row.get("completed"),
        insertions: row.get("insertions"),
        max_timestamp: row.get("max_timestamp"),
        max_revised_timestamp: row.get("max_revised_timestamp"),
    }
}
