/// Core data types for the flash-flood risk service.
///
/// This module defines the shared domain model imported by all other modules:
/// raw streamflow observations, the fixed feature contract between the
/// feature engine and the classifier, and the per-request prediction outcome.
/// It contains no I/O.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Parameter codes
// ---------------------------------------------------------------------------

/// USGS parameter code for discharge (streamflow), in cubic feet per second.
pub const PARAM_DISCHARGE: &str = "00060";

// ---------------------------------------------------------------------------
// Observation types
// ---------------------------------------------------------------------------

/// A single streamflow reading (cfs) for one station.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawObservation {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Ordered streamflow readings for one station over a bounded date range.
///
/// Construction through `RawSeries::new` sorts by timestamp and collapses
/// duplicate timestamps, keeping the last reading supplied for each instant.
/// Non-finite readings are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSeries {
    site_code: String,
    observations: Vec<RawObservation>,
}

impl RawSeries {
    pub fn new(site_code: impl Into<String>, mut observations: Vec<RawObservation>) -> Self {
        // Unparsable readings never reach the feature window.
        observations.retain(|o| o.value.is_finite());

        // Stable sort keeps input order among equal timestamps, so the
        // last-supplied duplicate is the one that survives below.
        observations.sort_by_key(|o| o.timestamp);

        let mut normalized: Vec<RawObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match normalized.last_mut() {
                Some(prev) if prev.timestamp == obs.timestamp => *prev = obs,
                _ => normalized.push(obs),
            }
        }

        Self {
            site_code: site_code.into(),
            observations: normalized,
        }
    }

    pub fn empty(site_code: impl Into<String>) -> Self {
        Self::new(site_code, Vec::new())
    }

    pub fn site_code(&self) -> &str {
        &self.site_code
    }

    pub fn observations(&self) -> &[RawObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.first().map(|o| o.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.last().map(|o| o.timestamp)
    }
}

// ---------------------------------------------------------------------------
// Feature contract
// ---------------------------------------------------------------------------

/// Number of features consumed by the classifier.
pub const FEATURE_COUNT: usize = 6;

/// Feature names in the exact order the classifier was trained on.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "log_streamflow",
    "streamflow_p10",
    "streamflow_p50",
    "streamflow_p90",
    "streamflow_diff",
    "streamflow_pct_change",
];

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Engineered features valid as of `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub features: FeatureVector,
}

// ---------------------------------------------------------------------------
// Prediction outcome
// ---------------------------------------------------------------------------

/// Coarse risk band shown alongside a probability.
///
/// Low < 30%, Moderate < 70%, High >= 70%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability < 0.3 {
            RiskLevel::Low
        } else if probability < 0.7 {
            RiskLevel::Moderate
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low Risk"),
            RiskLevel::Moderate => write!(f, "Moderate Risk"),
            RiskLevel::High => write!(f, "High Risk"),
        }
    }
}

/// Why a request produced no probability. None of these are faults.
#[derive(Debug, Clone, PartialEq)]
pub enum UndeterminedReason {
    /// Empty series, or too short to produce a complete feature row.
    InsufficientData,
    /// Every feature row is later than the requested instant.
    NoAlignedRow,
    /// The newest row at or before the requested instant is older than the
    /// configured carry-forward tolerance.
    StaleFeatures { age_hours: i64 },
    /// Feature vector length disagrees with the normalizer.
    DimensionMismatch { expected: usize, actual: usize },
    /// The classifier produced NaN or infinity.
    NonFiniteProbability,
    /// Malformed station id or target date.
    InvalidRequest(String),
}

impl fmt::Display for UndeterminedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndeterminedReason::InsufficientData => write!(f, "insufficient data"),
            UndeterminedReason::NoAlignedRow => {
                write!(f, "insufficient data: no observations at or before the requested date")
            }
            UndeterminedReason::StaleFeatures { age_hours } => write!(
                f,
                "insufficient data: latest observation is {} hours older than the requested date",
                age_hours
            ),
            UndeterminedReason::DimensionMismatch { expected, actual } => write!(
                f,
                "feature dimension mismatch: expected {}, got {}",
                expected, actual
            ),
            UndeterminedReason::NonFiniteProbability => {
                write!(f, "classifier produced a non-finite probability")
            }
            UndeterminedReason::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
        }
    }
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Probability {
        probability: f64,
        risk: RiskLevel,
        /// Timestamp of the feature row the probability was computed from.
        as_of: DateTime<Utc>,
    },
    Undetermined(UndeterminedReason),
}

impl Prediction {
    pub fn probability(&self) -> Option<f64> {
        match self {
            Prediction::Probability { probability, .. } => Some(*probability),
            Prediction::Undetermined(_) => None,
        }
    }

    pub fn is_undetermined(&self) -> bool {
        matches!(self, Prediction::Undetermined(_))
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from a single attempt against an observation source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Non-2xx HTTP response from the source.
    #[error("HTTP error: {0}")]
    Http(u16),
    /// Connection failure, timeout, or unreadable body.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The response body could not be deserialized.
    #[error("Parse error: {0}")]
    Parse(String),
    /// The source answered but returned no usable readings.
    #[error("No data available: {0}")]
    NoData(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, day, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_raw_series_sorts_by_timestamp() {
        let series = RawSeries::new(
            "08166250",
            vec![
                RawObservation { timestamp: at(3, 0), value: 3.0 },
                RawObservation { timestamp: at(1, 0), value: 1.0 },
                RawObservation { timestamp: at(2, 0), value: 2.0 },
            ],
        );
        let values: Vec<f64> = series.observations().iter().map(|o| o.value).collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
        assert_eq!(series.first_timestamp(), Some(at(1, 0)));
        assert_eq!(series.last_timestamp(), Some(at(3, 0)));
    }

    #[test]
    fn test_raw_series_duplicate_timestamp_last_write_wins() {
        let series = RawSeries::new(
            "08166250",
            vec![
                RawObservation { timestamp: at(1, 0), value: 10.0 },
                RawObservation { timestamp: at(2, 0), value: 20.0 },
                RawObservation { timestamp: at(1, 0), value: 11.0 },
            ],
        );
        assert_eq!(series.len(), 2, "duplicate timestamp should collapse");
        assert_eq!(series.observations()[0].value, 11.0, "later duplicate should win");
    }

    #[test]
    fn test_raw_series_drops_non_finite_readings() {
        let series = RawSeries::new(
            "08166250",
            vec![
                RawObservation { timestamp: at(1, 0), value: 10.0 },
                RawObservation { timestamp: at(2, 0), value: f64::NAN },
                RawObservation { timestamp: at(3, 0), value: f64::INFINITY },
                RawObservation { timestamp: at(4, 0), value: 40.0 },
            ],
        );
        let values: Vec<f64> = series.observations().iter().map(|o| o.value).collect();
        assert_eq!(values, vec![10.0, 40.0], "NaN and Inf readings should be dropped");
    }

    #[test]
    fn test_empty_series() {
        let series = RawSeries::empty("08166250");
        assert!(series.is_empty());
        assert_eq!(series.site_code(), "08166250");
        assert!(series.first_timestamp().is_none());
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_probability(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.29), RiskLevel::Low);
        assert_eq!(RiskLevel::from_probability(0.3), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.69), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_probability(0.7), RiskLevel::High);
        assert_eq!(RiskLevel::from_probability(1.0), RiskLevel::High);
    }

    #[test]
    fn test_insufficient_data_reason_text() {
        assert_eq!(UndeterminedReason::InsufficientData.to_string(), "insufficient data");
    }

    #[test]
    fn test_feature_names_match_feature_count() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        let unique: std::collections::HashSet<_> = FEATURE_NAMES.iter().collect();
        assert_eq!(unique.len(), FEATURE_COUNT, "feature names must be distinct");
    }

    #[test]
    fn test_source_error_display() {
        assert_eq!(SourceError::Http(503).to_string(), "HTTP error: 503");
        assert!(SourceError::NoData("08166250".into()).to_string().contains("No data"));
    }
}
