//! Exposure persistence
//!
//! Reads and writes exposure rows and runs the revision merge inside one
//! ReadCommitted transaction: the current rows for the incoming TEKs are
//! read and locked, the merge is applied in memory, and insertions and
//! revisions are written atomically. Cancelling the future aborts the
//! transaction; partial results are never persisted.

use std::collections::HashMap;

use tokio_postgres::Row;

use crate::adapters::database::{read_committed, Db};
use crate::core::revision::revise_keys;
use crate::domain::errors::BeaconError;
use crate::domain::exposure::Exposure;
use crate::domain::report::ReportType;
use crate::domain::result::Result;

const EXPOSURE_COLUMNS: &str = "exposure_key, transmission_risk, app_package_name, regions, \
     interval_number, interval_count, created_at, local_provenance, federation_query_id, \
     export_import_id, report_type, health_authority_id, days_since_symptom_onset, \
     revised_at, revised_report_type, revised_transmission_risk, revised_days_since_symptom_onset";

/// Outcome of one merge of an incoming batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Rows newly inserted
    pub inserted: usize,

    /// Existing rows that accepted a revision
    pub revised: usize,

    /// Incoming keys that required no change
    pub unchanged: usize,
}

impl MergeOutcome {
    /// Total rows written.
    pub fn written(&self) -> usize {
        self.inserted + self.revised
    }
}

/// Store for exposure rows
#[derive(Clone)]
pub struct ExposureStore {
    db: Db,
}

impl ExposureStore {
    /// Creates a store on the shared client.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Merges an incoming batch against the stored rows.
    ///
    /// Inserts keys never seen before and applies accepted revisions,
    /// all inside one transaction. The first revision refusal aborts the
    /// merge and rolls everything back.
    pub async fn insert_and_revise_exposures(
        &self,
        incoming: Vec<Exposure>,
    ) -> Result<MergeOutcome> {
        if incoming.is_empty() {
            return Ok(MergeOutcome::default());
        }
        let total = incoming.len();

        let mut conn = self.db.get_connection().await?;
        let tx = read_committed(&mut conn).await?;

        let keys: Vec<&[u8]> = incoming.iter().map(|e| e.exposure_key.as_slice()).collect();
        let rows = tx
            .query(
                &format!(
                    "SELECT {EXPOSURE_COLUMNS} FROM exposure WHERE exposure_key = ANY($1) FOR UPDATE"
                ),
                &[&keys],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("reading existing exposures: {e}")))?;

        let mut existing: HashMap<String, Exposure> = HashMap::with_capacity(rows.len());
        for row in rows {
            let exposure = exposure_from_row(&row)?;
            existing.insert(exposure.exposure_key_base64(), exposure);
        }

        let output = revise_keys(&existing, incoming)?;

        let mut outcome = MergeOutcome {
            unchanged: total - output.len(),
            ..MergeOutcome::default()
        };
        for exposure in &output {
            if existing.contains_key(&exposure.exposure_key_base64()) {
                self.apply_revision(&tx, exposure).await?;
                outcome.revised += 1;
            } else {
                self.insert_exposure(&tx, exposure).await?;
                outcome.inserted += 1;
            }
        }

        tx.commit()
            .await
            .map_err(|e| BeaconError::Database(format!("committing exposure merge: {e}")))?;

        tracing::info!(
            inserted = outcome.inserted,
            revised = outcome.revised,
            unchanged = outcome.unchanged,
            "merged exposure batch"
        );
        Ok(outcome)
    }

    /// Loads one exposure by key bytes.
    pub async fn get_exposure(&self, exposure_key: &[u8]) -> Result<Option<Exposure>> {
        let conn = self.db.get_connection().await?;
        let row = conn
            .query_opt(
                &format!("SELECT {EXPOSURE_COLUMNS} FROM exposure WHERE exposure_key = $1"),
                &[&exposure_key],
            )
            .await
            .map_err(|e| BeaconError::Database(format!("reading exposure: {e}")))?;
        row.map(|r| exposure_from_row(&r)).transpose()
    }

    async fn insert_exposure(
        &self,
        tx: &tokio_postgres::Transaction<'_>,
        exposure: &Exposure,
    ) -> Result<()> {
        tx.execute(
            "INSERT INTO exposure (exposure_key, transmission_risk, app_package_name, regions, \
                 interval_number, interval_count, created_at, local_provenance, \
                 federation_query_id, export_import_id, report_type, health_authority_id, \
                 days_since_symptom_onset)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (exposure_key) DO NOTHING",
            &[
                &exposure.exposure_key,
                &exposure.transmission_risk,
                &exposure.app_package_name,
                &exposure.regions,
                &exposure.interval_number,
                &exposure.interval_count,
                &exposure.created_at,
                &exposure.local_provenance,
                &exposure.federation_query_id,
                &exposure.export_import_id,
                &exposure.report_type.as_str(),
                &exposure.health_authority_id,
                &exposure.days_since_symptom_onset,
            ],
        )
        .await
        .map_err(|e| BeaconError::Database(format!("inserting exposure: {e}")))?;
        Ok(())
    }

    async fn apply_revision(
        &self,
        tx: &tokio_postgres::Transaction<'_>,
        exposure: &Exposure,
    ) -> Result<()> {
        let revised_report_type = exposure.revised_report_type.map(|rt| rt.as_str());
        tx.execute(
            "UPDATE exposure SET regions = $2, health_authority_id = $3, revised_at = $4, \
                 revised_report_type = $5, revised_transmission_risk = $6, \
                 revised_days_since_symptom_onset = $7
             WHERE exposure_key = $1",
            &[
                &exposure.exposure_key,
                &exposure.regions,
                &exposure.health_authority_id,
                &exposure.revised_at,
                &revised_report_type,
                &exposure.revised_transmission_risk,
                &exposure.revised_days_since_symptom_onset,
            ],
        )
        .await
        .map_err(|e| BeaconError::Database(format!("applying exposure revision: {e}")))?;
        Ok(())
    }
}

fn exposure_from_row(row: &Row) -> Result<Exposure> {
    let report_type: String = row.get("report_type");
    let revised_report_type: Option<String> = row.get("revised_report_type");
    Ok(Exposure {
        exposure_key: row.get("exposure_key"),
        transmission_risk: row.get("transmission_risk"),
        app_package_name: row.get("app_package_name"),
        regions: row.get("regions"),
        interval_number: row.get("interval_number"),
        interval_count: row.get("interval_count"),
        created_at: row.get("created_at"),
        local_provenance: row.get("local_provenance"),
        federation_query_id: row.get("federation_query_id"),
        export_import_id: row.get("export_import_id"),
        report_type: ReportType::parse(&report_type)?,
        health_authority_id: row.get("health_authority_id"),
        days_since_symptom_onset: row.get("days_since_symptom_onset"),
        revised_at: row.get("revised_at"),
        revised_report_type: revised_report_type
            .as_deref()
            .map(ReportType::parse)
            .transpose()?,
        revised_transmission_risk: row.get("revised_transmission_risk"),
        revised_days_since_symptom_onset: row.get("revised_days_since_symptom_onset"),
    })
}
