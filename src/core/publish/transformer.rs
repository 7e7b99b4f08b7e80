//! Publish transformer
//!
//! Validates an uploaded key batch against the temporal and cryptographic
//! policy and normalizes it into [`Exposure`] records ready for the
//! revision merge. The transformer is pure and reentrant: it takes only
//! the batch, the configured limits, the verified claims and the batch
//! time, so concurrent batches need no coordination.

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::domain::errors::BeaconError;
use crate::domain::exposure::{Exposure, KEY_LENGTH};
use crate::domain::interval::{
    days_between_intervals, interval_number, sub_days, time_for_interval, truncate_window,
    MAX_INTERVAL_COUNT, MIN_INTERVAL_COUNT,
};
use crate::domain::publish::{decode_exposure_key, Publish, PublishExposureKey, VerifiedClaims};
use crate::domain::report::{
    effective_transmission_risk, ReportType, MAX_TRANSMISSION_RISK, MIN_TRANSMISSION_RISK,
};
use crate::domain::result::Result;

/// Limits and policy knobs for the publish transformer
#[derive(Debug, Clone)]
pub struct TransformerConfig {
    /// Maximum number of keys accepted in one publish
    pub max_exposure_keys: u32,

    /// Maximum number of keys sharing one start interval
    pub max_same_day_keys: u32,

    /// Oldest allowed age of a key's validity window
    pub max_interval_start_age: Duration,

    /// Window `created_at` timestamps are truncated to
    pub truncate_window: Duration,

    /// Largest absolute per-key symptom onset delta, in days
    pub max_symptom_onset_days: u32,

    /// Oldest acceptable reported onset, in days before the batch
    pub max_valid_symptom_onset_report_days: u32,

    /// Onset fallback when neither claim nor user supplied one
    pub default_symptom_onset_days_ago: u32,

    /// Debug only: release still-valid keys without embargo
    pub debug_release_same_day_keys: bool,
}

/// Batch-level statistics produced alongside the exposures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishInfo {
    /// Truncated batch timestamp shared by all exposures
    pub created_at: DateTime<Utc>,

    /// Largest day-age among the accepted keys
    pub oldest_days: i32,

    /// Days between the resolved onset and the batch, when resolvable
    pub onset_days_ago: Option<i32>,

    /// True when neither the claim nor the user supplied a usable onset
    pub missing_onset: bool,
}

/// Result of transforming one publish batch
#[derive(Debug, Clone)]
pub struct TransformResponse {
    /// Normalized exposures, sorted by start interval
    pub exposures: Vec<Exposure>,

    /// Per-key warnings for keys dropped without failing the batch
    pub warnings: Vec<String>,

    /// Batch-level statistics
    pub publish_info: PublishInfo,
}

/// Transforms publish batches into exposure records
#[derive(Debug)]
pub struct Transformer {
    config: TransformerConfig,
    max_interval_start_age: chrono::Duration,
    truncate_window_chrono: chrono::Duration,
}

impl Transformer {
    /// Creates a transformer, validating the configured limits.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `max_exposure_keys` is 0 or
    /// `max_same_day_keys` is below 1.
    pub fn new(config: TransformerConfig) -> Result<Self> {
        if config.max_exposure_keys == 0 {
            return Err(BeaconError::Configuration(
                "max_exposure_keys must be > 0".to_string(),
            ));
        }
        if config.max_same_day_keys < 1 {
            return Err(BeaconError::Configuration(format!(
                "max_same_day_keys must be >= 1, got {}",
                config.max_same_day_keys
            )));
        }
        let max_interval_start_age = chrono::Duration::from_std(config.max_interval_start_age)
            .map_err(|e| {
                BeaconError::Configuration(format!("max_interval_start_age out of range: {e}"))
            })?;
        let truncate_window_chrono =
            chrono::Duration::from_std(config.truncate_window).map_err(|e| {
                BeaconError::Configuration(format!("truncate_window out of range: {e}"))
            })?;
        Ok(Self {
            config,
            max_interval_start_age,
            truncate_window_chrono,
        })
    }

    /// Validates and normalizes one publish batch.
    ///
    /// Any per-key validation failure aborts the whole batch with that
    /// error; a key whose symptom-onset delta is out of range is the one
    /// exception, dropped with a warning while the batch continues.
    ///
    /// `regions` is the resolved region list for the publishing
    /// application; it is upper-cased and deduplicated here.
    pub fn transform_publish(
        &self,
        publish: &Publish,
        regions: &[String],
        claims: Option<&VerifiedClaims>,
        batch_time: DateTime<Utc>,
    ) -> Result<TransformResponse> {
        if publish.keys.is_empty() {
            return Err(BeaconError::Validation(
                "no exposure keys in publish request".to_string(),
            ));
        }
        if publish.keys.len() > self.config.max_exposure_keys as usize {
            return Err(BeaconError::Validation(format!(
                "too many exposure keys in publish: {}, max of {}",
                publish.keys.len(),
                self.config.max_exposure_keys
            )));
        }

        let created_at = truncate_window(batch_time, self.config.truncate_window);
        let current_interval = interval_number(batch_time);
        let min_start_interval = interval_number(batch_time - self.max_interval_start_age);

        let mut upcased: Vec<String> = Vec::with_capacity(regions.len());
        for region in regions {
            let region = region.to_uppercase();
            if !upcased.contains(&region) {
                upcased.push(region);
            }
        }

        let (onset_interval, missing_onset) = self.resolve_symptom_onset(publish, claims, batch_time);

        let report_type = claims.map(|c| c.report_type).unwrap_or_default();
        let health_authority_id =
            claims.and_then(|c| (c.health_authority_id != 0).then_some(c.health_authority_id));

        let mut exposures: Vec<Exposure> = Vec::with_capacity(publish.keys.len());
        let mut warnings: Vec<String> = Vec::new();
        let mut oldest_days = 0i32;

        for (i, key) in publish.keys.iter().enumerate() {
            let mut exposure = self
                .transform_exposure_key(
                    key,
                    &publish.health_authority_id,
                    &upcased,
                    report_type,
                    health_authority_id,
                    created_at,
                    current_interval,
                    min_start_interval,
                )
                .map_err(|e| {
                    BeaconError::Validation(format!("key {i} cannot be imported: {e}"))
                })?;

            let days = days_between_intervals(onset_interval, exposure.interval_number);
            if days.unsigned_abs() > self.config.max_symptom_onset_days {
                tracing::warn!(key_index = i, days, "dropping key with out-of-range onset");
                warnings.push(format!(
                    "key {i} symptom onset is too large, {} > {} - saving without this key",
                    days.abs(),
                    self.config.max_symptom_onset_days
                ));
                continue;
            }
            exposure.days_since_symptom_onset = Some(days);

            let age = days_between_intervals(exposure.interval_number, current_interval);
            if age > oldest_days {
                oldest_days = age;
            }
            exposures.push(exposure);
        }

        exposures.sort_by_key(|e| e.interval_number);
        self.check_interval_alignment(&exposures)?;

        let publish_info = PublishInfo {
            created_at,
            oldest_days,
            onset_days_ago: (!missing_onset)
                .then(|| days_between_intervals(onset_interval, current_interval)),
            missing_onset,
        };

        Ok(TransformResponse {
            exposures,
            warnings,
            publish_info,
        })
    }

    /// Resolves the symptom onset interval: verified claim first, then the
    /// user-supplied value, then the configured default relative to the
    /// batch time. An onset older than the valid reporting window (or in
    /// the future) is discarded and the policy falls through.
    fn resolve_symptom_onset(
        &self,
        publish: &Publish,
        claims: Option<&VerifiedClaims>,
        batch_time: DateTime<Utc>,
    ) -> (i32, bool) {
        let current_interval = interval_number(batch_time);

        if let Some(claims) = claims {
            if claims.symptom_onset_interval > 0 {
                let onset = claims.symptom_onset_interval as i32;
                if self.valid_reported_onset(onset, current_interval) {
                    return (onset, false);
                }
            }
        }

        if publish.symptom_onset_interval > 0
            && self.valid_reported_onset(publish.symptom_onset_interval, current_interval)
        {
            return (publish.symptom_onset_interval, false);
        }

        let onset = interval_number(sub_days(
            batch_time,
            self.config.default_symptom_onset_days_ago,
        ));
        (onset, true)
    }

    fn valid_reported_onset(&self, onset_interval: i32, current_interval: i32) -> bool {
        let days = days_between_intervals(onset_interval, current_interval);
        days >= 0 && days as u32 <= self.config.max_valid_symptom_onset_report_days
    }

    #[allow(clippy::too_many_arguments)]
    fn transform_exposure_key(
        &self,
        key: &PublishExposureKey,
        app_package_name: &str,
        regions: &[String],
        report_type: ReportType,
        health_authority_id: Option<i64>,
        created_at: DateTime<Utc>,
        current_interval: i32,
        min_start_interval: i32,
    ) -> Result<Exposure> {
        let binary = decode_exposure_key(&key.key)
            .map_err(|e| BeaconError::Validation(e.to_string()))?;
        if binary.len() != KEY_LENGTH {
            return Err(BeaconError::Validation(format!(
                "invalid key length, {}, must be {}",
                binary.len(),
                KEY_LENGTH
            )));
        }

        let risk = key.transmission_risk;
        if !(MIN_TRANSMISSION_RISK..=MAX_TRANSMISSION_RISK).contains(&risk) {
            return Err(BeaconError::Validation(format!(
                "invalid transmission risk: {risk}, must be >= {MIN_TRANSMISSION_RISK} && <= {MAX_TRANSMISSION_RISK}"
            )));
        }

        let count = key.interval_count;
        if !(MIN_INTERVAL_COUNT..=MAX_INTERVAL_COUNT).contains(&count) {
            return Err(BeaconError::Validation(format!(
                "invalid interval count, {count}, must be >= {MIN_INTERVAL_COUNT} && <= {MAX_INTERVAL_COUNT}"
            )));
        }

        let end_interval = i64::from(key.interval_number) + i64::from(count);
        if end_interval < i64::from(min_start_interval) {
            return Err(BeaconError::Validation(format!(
                "key expires before minimum window; {} + {} = {} which is too old, must be >= {}",
                key.interval_number, count, end_interval, min_start_interval
            )));
        }
        if key.interval_number > current_interval {
            return Err(BeaconError::Validation(format!(
                "interval number {} is in the future, must be <= {}",
                key.interval_number, current_interval
            )));
        }

        // A key that is still valid at batch time is embargoed: its
        // created_at moves to the window after the key expires so it is
        // not exported while still active.
        let mut created_at = created_at;
        if end_interval > i64::from(current_interval) && !self.config.debug_release_same_day_keys {
            let release = time_for_interval(end_interval as i32);
            created_at =
                truncate_window(release, self.config.truncate_window) + self.truncate_window_chrono;
        }

        Ok(Exposure {
            exposure_key: binary,
            transmission_risk: effective_transmission_risk(report_type, risk),
            app_package_name: app_package_name.to_string(),
            regions: regions.to_vec(),
            interval_number: key.interval_number,
            interval_count: count,
            created_at,
            local_provenance: true,
            report_type,
            health_authority_id,
            ..Exposure::default()
        })
    }

    /// Checks the sorted batch for start-interval class sizes and
    /// non-aligned overlaps. Multiple keys may share one start interval
    /// (up to the configured limit, with any period lengths); keys with
    /// different starts must not overlap at all.
    fn check_interval_alignment(&self, exposures: &[Exposure]) -> Result<()> {
        let Some(first) = exposures.first() else {
            return Ok(());
        };

        let mut last_interval = first.interval_number;
        let mut next_interval = i64::from(first.interval_number) + i64::from(first.interval_count);
        let mut same_interval_count: u32 = 1;

        for exposure in &exposures[1..] {
            let end = i64::from(exposure.interval_number) + i64::from(exposure.interval_count);
            if exposure.interval_number == last_interval {
                same_interval_count += 1;
                if same_interval_count > self.config.max_same_day_keys {
                    return Err(BeaconError::Validation(format!(
                        "too many overlapping keys for start interval: {} want: <= {}, got: {}",
                        last_interval, self.config.max_same_day_keys, same_interval_count
                    )));
                }
                next_interval = next_interval.max(end);
                continue;
            }
            if i64::from(exposure.interval_number) < next_interval {
                return Err(BeaconError::Validation(
                    "exposure keys have non aligned overlapping intervals".to_string(),
                ));
            }
            last_interval = exposure.interval_number;
            next_interval = end;
            same_interval_count = 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> TransformerConfig {
        TransformerConfig {
            max_exposure_keys: 10,
            max_same_day_keys: 1,
            max_interval_start_age: Duration::from_secs(24 * 3600),
            truncate_window: Duration::from_secs(3600),
            max_symptom_onset_days: 14,
            max_valid_symptom_onset_report_days: 28,
            default_symptom_onset_days_ago: 4,
            debug_release_same_day_keys: false,
        }
    }

    #[test]
    fn test_new_rejects_zero_max_keys() {
        let config = TransformerConfig {
            max_exposure_keys: 0,
            ..test_config()
        };
        let err = Transformer::new(config).unwrap_err();
        assert!(err.to_string().contains("max_exposure_keys must be > 0"));
    }

    #[test]
    fn test_new_rejects_zero_same_day_keys() {
        let config = TransformerConfig {
            max_same_day_keys: 0,
            ..test_config()
        };
        let err = Transformer::new(config).unwrap_err();
        assert!(err.to_string().contains("max_same_day_keys must be >= 1, got 0"));
    }

    #[test]
    fn test_new_accepts_valid_config() {
        assert!(Transformer::new(test_config()).is_ok());
    }

    #[test]
    fn test_empty_batch() {
        let transformer = Transformer::new(test_config()).unwrap();
        let err = transformer
            .transform_publish(&Publish::default(), &[], None, Utc::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "no exposure keys in publish request");
    }

    #[test]
    fn test_valid_onset_window() {
        let transformer = Transformer::new(test_config()).unwrap();
        let now = interval_number(Utc::now());

        // Today and 28 days ago are fine, 29 days ago and tomorrow are not.
        assert!(transformer.valid_reported_onset(now, now));
        assert!(transformer.valid_reported_onset(now - 28 * 144, now));
        assert!(!transformer.valid_reported_onset(now - 29 * 144, now));
        assert!(!transformer.valid_reported_onset(now + 144, now));
    }
}
