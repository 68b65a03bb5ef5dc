/// Observation acquisition with source fallback.
///
/// The fallback policy is an ordered list of strategies sharing one timeout
/// budget. Each strategy is attempted at most once, sequentially; the first
/// one that yields a non-empty series wins. The low-latency strategy is only
/// planned when the target instant falls on the current UTC day.
///
/// Acquisition never fails: when every planned attempt comes back empty or
/// errors, or the request itself is invalid, the result carries an empty
/// series and the caller treats that as insufficient data.

use crate::ingest::source::ObservationSource;
use crate::logging;
use crate::model::{RawSeries, SourceError};
use crate::stations::is_valid_site_code;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionStrategy {
    /// Low-latency trailing window (`fetch_recent`).
    Recent,
    /// Archival explicit date range (`fetch_range`).
    Archival,
}

impl fmt::Display for AcquisitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStrategy::Recent => write!(f, "recent"),
            AcquisitionStrategy::Archival => write!(f, "archival"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FallbackPolicy {
    pub strategies: Vec<AcquisitionStrategy>,
    /// Total time shared by all attempts of one acquisition.
    pub budget: Duration,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            strategies: vec![AcquisitionStrategy::Recent, AcquisitionStrategy::Archival],
            budget: Duration::from_secs(30),
        }
    }
}

impl FallbackPolicy {
    pub fn with_budget(budget: Duration) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    /// Strategies to attempt for `target`, in order, each at most once.
    pub fn plan(&self, target: DateTime<Utc>, now: DateTime<Utc>) -> Vec<AcquisitionStrategy> {
        let is_today = target.date_naive() == now.date_naive();
        let mut planned = Vec::with_capacity(self.strategies.len());
        for &strategy in &self.strategies {
            if strategy == AcquisitionStrategy::Recent && !is_today {
                continue;
            }
            if !planned.contains(&strategy) {
                planned.push(strategy);
            }
        }
        planned
    }
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Observations(usize),
    Empty,
    Failed(SourceError),
    /// Not attempted because the shared budget was spent.
    BudgetExhausted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub strategy: AcquisitionStrategy,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
pub struct Acquisition {
    pub series: RawSeries,
    /// The strategy that produced `series`, if any did.
    pub strategy: Option<AcquisitionStrategy>,
    pub attempts: Vec<Attempt>,
}

impl Acquisition {
    fn empty(site_code: &str, attempts: Vec<Attempt>) -> Self {
        Self {
            series: RawSeries::empty(site_code),
            strategy: None,
            attempts,
        }
    }
}

// ---------------------------------------------------------------------------
// Acquirer
// ---------------------------------------------------------------------------

pub struct Acquirer {
    source: Arc<dyn ObservationSource>,
    policy: FallbackPolicy,
}

impl Acquirer {
    pub fn new(source: Arc<dyn ObservationSource>, policy: FallbackPolicy) -> Self {
        Self { source, policy }
    }

    pub fn policy(&self) -> &FallbackPolicy {
        &self.policy
    }

    /// Fetches readings covering `[target - lookback_days, target]`.
    pub fn acquire(
        &self,
        site_code: &str,
        lookback_days: u32,
        target: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Acquisition {
        if !is_valid_site_code(site_code) {
            warn!(site = site_code, "rejecting acquisition for malformed site code");
            return Acquisition::empty(site_code, Vec::new());
        }
        if lookback_days == 0 {
            warn!(site = site_code, "rejecting acquisition with zero-day lookback");
            return Acquisition::empty(site_code, Vec::new());
        }
        if target.date_naive() > now.date_naive() {
            warn!(site = site_code, target = %target, "rejecting acquisition for a future date");
            return Acquisition::empty(site_code, Vec::new());
        }

        let start = (target - ChronoDuration::days(i64::from(lookback_days))).date_naive();
        let end = target.date_naive();
        let deadline = Instant::now() + self.policy.budget;
        let mut attempts = Vec::new();

        for strategy in self.policy.plan(target, now) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(site = site_code, %strategy, "acquisition budget exhausted");
                attempts.push(Attempt {
                    strategy,
                    outcome: AttemptOutcome::BudgetExhausted,
                });
                continue;
            }

            let result = match strategy {
                AcquisitionStrategy::Recent => {
                    self.source.fetch_recent(site_code, lookback_days, remaining)
                }
                AcquisitionStrategy::Archival => {
                    self.source.fetch_range(site_code, start, end, remaining)
                }
            };

            match result {
                Ok(series) if !series.is_empty() => {
                    info!(
                        site = site_code,
                        %strategy,
                        observations = series.len(),
                        "acquired observations"
                    );
                    attempts.push(Attempt {
                        strategy,
                        outcome: AttemptOutcome::Observations(series.len()),
                    });
                    return Acquisition {
                        series,
                        strategy: Some(strategy),
                        attempts,
                    };
                }
                Ok(_) => {
                    debug!(site = site_code, %strategy, "source returned an empty series");
                    attempts.push(Attempt {
                        strategy,
                        outcome: AttemptOutcome::Empty,
                    });
                }
                Err(e) => {
                    logging::log_source_failure(site_code, strategy, &e);
                    attempts.push(Attempt {
                        strategy,
                        outcome: AttemptOutcome::Failed(e),
                    });
                }
            }
        }

        Acquisition::empty(site_code, attempts)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
