/// End-to-end flash-flood risk inference for one station.
///
/// One invocation moves through these states, never revisiting one:
///
/// ```text
/// Acquiring -> FeatureComputing -> Aligning -> Sanitizing -> Normalizing -> Classifying -> Done
///     |               |               |                                        |
///     +-- empty       +-- empty       +-- miss / stale                         +-- non-finite
///                         \___________________ Undetermined(reason) ___________/
/// ```
///
/// Per-request conditions never surface as errors: the caller always gets a
/// `Prediction`. Only artifact loading (at startup) can fail.

use crate::acquire::Acquirer;
use crate::analysis::alignment::Alignment;
use crate::analysis::features::{compute_features, FeatureConfig};
use crate::analysis::sanitize::sanitize;
use crate::inference::ModelArtifacts;
use crate::model::{Prediction, RiskLevel, UndeterminedReason};
use crate::stations::is_valid_site_code;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::mpsc;
use std::sync::Arc;
use threadpool::ThreadPool;
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Minimum days of observations requested before the target instant.
    /// The fetch is widened by `acquisition_days` when the window and
    /// carry-forward need more history.
    pub lookback_days: u32,
    pub features: FeatureConfig,
    /// Oldest a feature row may be, relative to the target, and still be
    /// used. `None` carries the last row forward without limit.
    pub max_carry_forward: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lookback_days: 7,
            features: FeatureConfig::default(),
            max_carry_forward: Some(Duration::days(7)),
        }
    }
}

impl PipelineConfig {
    /// Days actually fetched for one request.
    ///
    /// A row that is `max_carry_forward` older than the target still needs a
    /// full window behind it, and daily archives end a day early, so the span
    /// is `window + carry + 1 day` (carry defaults to `lookback_days` when
    /// unbounded), and never shorter than `lookback_days`.
    pub fn acquisition_days(&self) -> u32 {
        let carry = self
            .max_carry_forward
            .unwrap_or_else(|| Duration::days(i64::from(self.lookback_days)));
        let needed = self.features.window.max(Duration::zero()) + carry.max(Duration::zero()) + Duration::days(1);
        let days = (needed.num_seconds() + 86_399) / 86_400;
        u32::try_from(days).unwrap_or(u32::MAX).max(self.lookback_days)
    }
}

// ---------------------------------------------------------------------------
// Target resolution
// ---------------------------------------------------------------------------

/// Parses a `YYYY-MM-DD` request date.
pub fn parse_target_date(raw: &str) -> Result<NaiveDate, UndeterminedReason> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        UndeterminedReason::InvalidRequest(format!("date '{}' is not YYYY-MM-DD", raw))
    })
}

/// Instant a request refers to: `now` when no date is given or the date is
/// today (UTC), otherwise that day at 00:00 UTC. Future days are rejected.
pub fn resolve_target(date: Option<NaiveDate>, now: DateTime<Utc>) -> Result<DateTime<Utc>, UndeterminedReason> {
    let today = now.date_naive();
    match date {
        None => Ok(now),
        Some(d) if d == today => Ok(now),
        Some(d) if d > today => Err(UndeterminedReason::InvalidRequest(format!(
            "date {} is in the future",
            d
        ))),
        Some(d) => d
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| UndeterminedReason::InvalidRequest(format!("date {} out of range", d))),
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline {
    acquirer: Acquirer,
    artifacts: Arc<ModelArtifacts>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(acquirer: Acquirer, artifacts: Arc<ModelArtifacts>, config: PipelineConfig) -> Self {
        Self {
            acquirer,
            artifacts,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Flood probability for `site_code` as of `date` (default: now).
    pub fn predict(&self, site_code: &str, date: Option<NaiveDate>) -> Prediction {
        self.predict_at(site_code, date, Utc::now())
    }

    /// `predict` with an explicit clock.
    pub fn predict_at(&self, site_code: &str, date: Option<NaiveDate>, now: DateTime<Utc>) -> Prediction {
        if !is_valid_site_code(site_code) {
            let reason = UndeterminedReason::InvalidRequest(format!("site code '{}' is malformed", site_code));
            return undetermined(site_code, "resolving", reason);
        }
        match resolve_target(date, now) {
            Ok(target) => self.run(site_code, target, now),
            Err(reason) => undetermined(site_code, "resolving", reason),
        }
    }

    /// Runs every stage for an already-resolved target instant.
    pub fn run(&self, site_code: &str, target: DateTime<Utc>, now: DateTime<Utc>) -> Prediction {
        // Acquiring
        let acquisition = self
            .acquirer
            .acquire(site_code, self.config.acquisition_days(), target, now);
        if acquisition.series.is_empty() {
            return undetermined(site_code, "acquiring", UndeterminedReason::InsufficientData);
        }

        // FeatureComputing
        let table = compute_features(&acquisition.series, &self.config.features);
        if table.is_empty() {
            debug!(
                site = site_code,
                observations = acquisition.series.len(),
                "series too short for a complete feature row"
            );
            return undetermined(site_code, "feature_computing", UndeterminedReason::InsufficientData);
        }

        // Aligning
        let row = match table.as_of_within(target, self.config.max_carry_forward) {
            Alignment::Aligned(row) => row,
            Alignment::Miss => {
                return undetermined(site_code, "aligning", UndeterminedReason::NoAlignedRow);
            }
            Alignment::Stale { age, .. } => {
                let reason = UndeterminedReason::StaleFeatures {
                    age_hours: age.num_hours(),
                };
                return undetermined(site_code, "aligning", reason);
            }
        };

        // Sanitizing
        let features = sanitize(&row.features);

        // Normalizing + Classifying
        match self.artifacts.probability(&features) {
            Ok(probability) => {
                let risk = RiskLevel::from_probability(probability);
                info!(
                    site = site_code,
                    probability,
                    risk = %risk,
                    as_of = %row.timestamp,
                    strategy = ?acquisition.strategy,
                    "prediction complete"
                );
                Prediction::Probability {
                    probability,
                    risk,
                    as_of: row.timestamp,
                }
            }
            Err(reason) => undetermined(site_code, "classifying", reason),
        }
    }
}

fn undetermined(site_code: &str, stage: &'static str, reason: UndeterminedReason) -> Prediction {
    match &reason {
        UndeterminedReason::DimensionMismatch { .. } | UndeterminedReason::NonFiniteProbability => {
            warn!(site = site_code, stage, reason = %reason, "prediction undetermined");
        }
        _ => info!(site = site_code, stage, reason = %reason, "prediction undetermined"),
    }
    Prediction::Undetermined(reason)
}

// ---------------------------------------------------------------------------
// Batch prediction
// ---------------------------------------------------------------------------

/// Predicts for every site concurrently on `workers` threads. Results come
/// back in the order of `sites`.
pub fn predict_batch(
    pipeline: &Arc<Pipeline>,
    sites: &[String],
    date: Option<NaiveDate>,
    workers: usize,
) -> Vec<(String, Prediction)> {
    let now = Utc::now();
    let pool = ThreadPool::new(workers.max(1));
    let (tx, rx) = mpsc::channel();

    for (idx, site) in sites.iter().enumerate() {
        let tx = tx.clone();
        let pipeline = Arc::clone(pipeline);
        let site = site.clone();
        pool.execute(move || {
            let prediction = pipeline.predict_at(&site, date, now);
            // Receiver outlives the pool; a send failure means the caller
            // has already given up on the batch.
            let _ = tx.send((idx, prediction));
        });
    }
    drop(tx);

    let mut slots: Vec<Option<Prediction>> = vec![None; sites.len()];
    for (idx, prediction) in rx {
        slots[idx] = Some(prediction);
    }
    pool.join();

    sites
        .iter()
        .cloned()
        .zip(slots)
        .map(|(site, slot)| {
            let prediction = slot.unwrap_or_else(|| {
                warn!(site = %site, "prediction worker exited without a result");
                Prediction::Undetermined(UndeterminedReason::InvalidRequest(
                    "prediction worker failed".to_string(),
                ))
            });
            (site, prediction)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
