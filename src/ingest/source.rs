/// Observation sources consumed by the acquirer.
///
/// A source answers two questions for one station: "what happened over the
/// trailing N days" (low-latency) and "what happened between these two
/// dates" (archival). `UsgsSource` maps those onto the NWIS IV and DV
/// services respectively.

use crate::ingest::usgs::{build_dv_url, build_iv_url, iv_period, parse_discharge_response};
use crate::model::{RawSeries, SourceError, PARAM_DISCHARGE};
use chrono::NaiveDate;
use std::time::Duration;
use tracing::debug;

/// A provider of streamflow readings for a station.
///
/// Every call carries the time it may spend; implementations must return
/// within it (or fail with `SourceError::Transport`).
pub trait ObservationSource: Send + Sync {
    /// Readings for the trailing `lookback_days` days.
    fn fetch_recent(
        &self,
        site_code: &str,
        lookback_days: u32,
        timeout: Duration,
    ) -> Result<RawSeries, SourceError>;

    /// Readings for the inclusive date range `[start, end]`.
    fn fetch_range(
        &self,
        site_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
    ) -> Result<RawSeries, SourceError>;
}

// ---------------------------------------------------------------------------
// USGS NWIS
// ---------------------------------------------------------------------------

/// Time allowed to establish a connection, separate from the per-call
/// timeout that bounds the whole request.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Blocking HTTP client for the USGS NWIS IV (recent) and DV (archival)
/// services.
pub struct UsgsSource {
    client: reqwest::blocking::Client,
}

impl UsgsSource {
    pub fn new() -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("flashflood_service/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn get(&self, site_code: &str, url: &str, timeout: Duration) -> Result<RawSeries, SourceError> {
        debug!(site = site_code, url, "fetching USGS observations");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .timeout(timeout)
            .send()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Http(status.as_u16()));
        }

        let body = response
            .text()
            .map_err(|e| SourceError::Transport(format!("failed to read body: {}", e)))?;

        let observations = parse_discharge_response(&body)?;
        Ok(RawSeries::new(site_code, observations))
    }
}

impl ObservationSource for UsgsSource {
    fn fetch_recent(
        &self,
        site_code: &str,
        lookback_days: u32,
        timeout: Duration,
    ) -> Result<RawSeries, SourceError> {
        let url = build_iv_url(&[site_code], &[PARAM_DISCHARGE], &iv_period(lookback_days));
        self.get(site_code, &url, timeout)
    }

    fn fetch_range(
        &self,
        site_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        timeout: Duration,
    ) -> Result<RawSeries, SourceError> {
        let url = build_dv_url(&[site_code], &[PARAM_DISCHARGE], start, end);
        self.get(site_code, &url, timeout)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
