/// Feature engineering over a raw streamflow series.
///
/// Produces one `FeatureRow` per observation whose trailing window is fully
/// covered by the series:
///
/// | index | feature                 | definition                               |
/// |-------|-------------------------|------------------------------------------|
/// | 0     | `log_streamflow`        | `ln(q)`                                  |
/// | 1..=3 | `streamflow_p10/50/90`  | percentiles of q over `(t - window, t]`  |
/// | 4     | `streamflow_diff`       | `q[i] - q[i-1]`                          |
/// | 5     | `streamflow_pct_change` | `(q[i] - q[i-1]) / q[i-1]`               |
///
/// The window is measured in elapsed time, not rows, so irregular sampling
/// is handled. Arithmetic that leaves the reals (ln 0, division by a zero
/// baseline) is kept as NaN/±Inf in the row; `sanitize` repairs it later.

use crate::model::{FeatureRow, RawSeries, FEATURE_COUNT};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureConfig {
    /// Length of the trailing rolling window.
    pub window: Duration,
    /// How much of the oldest part of the window may be uncovered by data
    /// before a row is considered incomplete. Absorbs sampling jitter and
    /// reporting lag at the start of a fetched range.
    pub coverage_tolerance: Duration,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window: Duration::days(7),
            coverage_tolerance: Duration::hours(6),
        }
    }
}

/// Timestamp-ordered feature rows for one series. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Builds a table from rows; rows are sorted by timestamp.
    pub fn from_rows(mut rows: Vec<FeatureRow>) -> Self {
        rows.sort_by_key(|r| r.timestamp);
        Self { rows }
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Percentile with linear interpolation between order statistics.
/// `sorted` must be ascending. An empty slice yields NaN.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Computes the feature table for `series`.
///
/// Returns an empty table when no observation has both a predecessor and a
/// fully covered window. That is an expected outcome for short series.
/// A non-positive window yields an empty table.
pub fn compute_features(series: &RawSeries, config: &FeatureConfig) -> FeatureTable {
    if config.window <= Duration::zero() {
        return FeatureTable::default();
    }
    let obs = series.observations();
    let Some(first) = series.first_timestamp() else {
        return FeatureTable::default();
    };

    // Latest timestamp whose window is covered: first + window - tolerance.
    let earliest_complete: DateTime<Utc> = first + config.window - config.coverage_tolerance;

    let mut rows = Vec::new();
    let mut window_start = 0usize;
    let mut scratch: Vec<f64> = Vec::new();

    for i in 0..obs.len() {
        let t = obs[i].timestamp;
        let cutoff = t - config.window;
        while obs[window_start].timestamp <= cutoff {
            window_start += 1;
        }

        if i == 0 || t < earliest_complete {
            continue;
        }

        scratch.clear();
        scratch.extend(obs[window_start..=i].iter().map(|o| o.value));
        scratch.sort_by(|a, b| a.total_cmp(b));

        let q = obs[i].value;
        let prev = obs[i - 1].value;
        let diff = q - prev;

        let features: [f64; FEATURE_COUNT] = [
            q.ln(),
            percentile(&scratch, 0.10),
            percentile(&scratch, 0.50),
            percentile(&scratch, 0.90),
            diff,
            diff / prev,
        ];

        rows.push(FeatureRow { timestamp: t, features });
    }

    FeatureTable { rows }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
