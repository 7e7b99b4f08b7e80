//! Federation-in bookmark models
//!
//! A [`FederationInQuery`] is the durable per-peer bookmark: which server
//! to pull from, which regions to include, and the cursor pair recording
//! how far the last successful sync got. Each sync run is recorded as a
//! [`FederationInSync`] row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable bookmark for one federation pull query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FederationInQuery {
    /// Unique name of this query
    pub query_id: String,

    /// Address of the peer federation server
    pub server_addr: String,

    /// OIDC audience presented to the peer
    pub audience: String,

    /// Regions to request
    pub include_regions: Vec<String>,

    /// Regions to drop from the response
    pub exclude_regions: Vec<String>,

    /// Only pull keys the peer itself ingested locally
    pub only_local_provenance: bool,

    /// Only pull keys marked as travelers
    pub only_travelers: bool,

    /// Timestamp of the newest primary key fetched so far
    pub last_timestamp: Option<DateTime<Utc>>,

    /// Opaque resumption cursor for primary keys
    pub primary_cursor: Option<String>,

    /// Timestamp of the newest revised key fetched so far
    pub last_revised_timestamp: Option<DateTime<Utc>>,

    /// Opaque resumption cursor for revised keys
    pub revised_cursor: Option<String>,
}

impl FederationInQuery {
    /// Advances the bookmark to the state reached by a completed fetch.
    pub fn update_fetch_state(&mut self, state: &FetchState) {
        self.last_timestamp = Some(unix_to_timestamp(state.key_cursor.timestamp));
        self.primary_cursor = Some(state.key_cursor.next_token.clone());
        self.last_revised_timestamp = Some(unix_to_timestamp(state.revised_key_cursor.timestamp));
        self.revised_cursor = Some(state.revised_key_cursor.next_token.clone());
    }
}

/// Historical record of one sync run for a query
#[derive(Debug, Clone, PartialEq)]
pub struct FederationInSync {
    /// Row id of this sync
    pub sync_id: i64,

    /// Query the sync ran for
    pub query_id: String,

    /// When the sync started
    pub started: DateTime<Utc>,

    /// When the sync finalized, None while in flight
    pub completed: Option<DateTime<Utc>>,

    /// Number of keys inserted by the sync
    pub insertions: Option<i32>,

    /// Newest primary-key timestamp seen
    pub max_timestamp: Option<DateTime<Utc>>,

    /// Newest revised-key timestamp seen
    pub max_revised_timestamp: Option<DateTime<Utc>>,
}

/// Cursor over one key stream of the peer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchCursor {
    /// UNIX seconds of the newest key seen on this stream
    pub timestamp: i64,

    /// Opaque continuation token returned by the peer
    pub next_token: String,
}

/// Where a fetch stopped, for both key streams
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
    /// Cursor over newly published keys
    pub key_cursor: FetchCursor,

    /// Cursor over revised keys
    pub revised_key_cursor: FetchCursor,
}

/// Converts UNIX seconds to a second-truncated UTC timestamp.
pub(crate) fn unix_to_timestamp(unix: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(unix, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_fetch_state() {
        let mut query = FederationInQuery {
            query_id: "peer-a".to_string(),
            ..FederationInQuery::default()
        };

        let state = FetchState {
            key_cursor: FetchCursor {
                timestamp: 1_583_020_800,
                next_token: "token-1".to_string(),
            },
            revised_key_cursor: FetchCursor {
                timestamp: 1_583_024_400,
                next_token: "token-2".to_string(),
            },
        };

        query.update_fetch_state(&state);

        assert_eq!(query.last_timestamp, Some(unix_to_timestamp(1_583_020_800)));
        assert_eq!(query.primary_cursor.as_deref(), Some("token-1"));
        assert_eq!(
            query.last_revised_timestamp,
            Some(unix_to_timestamp(1_583_024_400))
        );
        assert_eq!(query.revised_cursor.as_deref(), Some("token-2"));
    }

    #[test]
    fn test_unix_to_timestamp_truncates_to_seconds() {
        let ts = unix_to_timestamp(1_583_020_800);
        assert_eq!(ts.timestamp(), 1_583_020_800);
        assert_eq!(ts.timestamp_subsec_nanos(), 0);
    }
}
