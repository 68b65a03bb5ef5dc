/// USGS NWIS Instantaneous Values (IV) and Daily Values (DV) API support.
///
/// Handles URL construction and JSON response parsing for:
///   https://waterservices.usgs.gov/nwis/iv/  — low-latency, trailing period
///   https://waterservices.usgs.gov/nwis/dv/  — archival, explicit date range
///
/// Both services return WaterML rendered as JSON. See `fixtures.rs` for
/// annotated examples of the response structure.

use crate::model::{RawObservation, SourceError, PARAM_DISCHARGE};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::debug;

// ---------------------------------------------------------------------------
// Serde structures for WaterML JSON deserialization
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct WaterMlResponse {
    value: ValueWrapper,
}

#[derive(Deserialize)]
struct ValueWrapper {
    #[serde(rename = "timeSeries")]
    time_series: Vec<TimeSeries>,
}

#[derive(Deserialize)]
struct TimeSeries {
    variable: Variable,
    #[serde(default)]
    values: Vec<Values>,
}

#[derive(Deserialize)]
struct Variable {
    #[serde(rename = "variableCode", default)]
    variable_code: Vec<VariableCode>,
    #[serde(rename = "noDataValue", default = "default_no_data_value")]
    no_data_value: f64,
}

#[derive(Deserialize)]
struct VariableCode {
    value: String,
}

#[derive(Deserialize)]
struct Values {
    #[serde(default)]
    value: Vec<ValueEntry>,
}

#[derive(Deserialize)]
struct ValueEntry {
    value: String,  // USGS returns as string!
    #[serde(rename = "dateTime")]
    date_time: String,
}

fn default_no_data_value() -> f64 {
    NO_DATA_SENTINEL
}

// ---------------------------------------------------------------------------
// URL construction
// ---------------------------------------------------------------------------

const IV_BASE_URL: &str = "https://waterservices.usgs.gov/nwis/iv/";
const DV_BASE_URL: &str = "https://waterservices.usgs.gov/nwis/dv/";

/// USGS sentinel for a missing measurement.
pub const NO_DATA_SENTINEL: f64 = -999_999.0;

/// Builds a USGS IV API URL for the given site codes, parameter codes,
/// and ISO 8601 period (e.g. `"P7D"` for the trailing seven days).
///
/// The returned URL always requests JSON format and filters to active
/// sites only.
pub fn build_iv_url(sites: &[&str], param_codes: &[&str], period: &str) -> String {
    format!(
        "{}?sites={}&parameterCd={}&period={}&format=json&siteStatus=active",
        IV_BASE_URL,
        encode_list(sites),
        encode_list(param_codes),
        period,
    )
}

/// Builds a USGS DV API URL for an explicit inclusive date range.
///
/// Unlike the IV API which uses ISO 8601 periods, the DV API uses
/// explicit start and end dates in YYYY-MM-DD format.
pub fn build_dv_url(sites: &[&str], param_codes: &[&str], start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "{}?sites={}&parameterCd={}&startDT={}&endDT={}&format=json&siteStatus=active",
        DV_BASE_URL,
        encode_list(sites),
        encode_list(param_codes),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d"),
    )
}

/// ISO 8601 period covering the trailing `days` days.
pub fn iv_period(days: u32) -> String {
    format!("P{}D", days)
}

fn encode_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Parses a USGS timestamp. IV timestamps carry an offset and are converted
/// to UTC; DV timestamps (and bare dates) have none and are taken as UTC.
pub fn parse_usgs_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parses an IV or DV JSON response body into every discharge observation it
/// contains, in response order.
///
/// Individual records that cannot be used (non-numeric value codes such as
/// "Ice", unparsable timestamps, the `-999999` sentinel) are skipped; only
/// an unreadable envelope fails the whole response.
///
/// # Errors
/// - `SourceError::Parse` — malformed or unexpected JSON envelope.
/// - `SourceError::NoData` — the envelope was valid but held no usable
///   discharge readings.
pub fn parse_discharge_response(json: &str) -> Result<Vec<RawObservation>, SourceError> {
    let response: WaterMlResponse = serde_json::from_str(json)
        .map_err(|e| SourceError::Parse(format!("JSON deserialization failed: {}", e)))?;

    if response.value.time_series.is_empty() {
        return Err(SourceError::NoData("No timeSeries entries in response".to_string()));
    }

    let mut observations = Vec::new();
    let mut skipped = 0usize;

    for series in &response.value.time_series {
        let is_discharge = series
            .variable
            .variable_code
            .first()
            .is_some_and(|code| code.value == PARAM_DISCHARGE);
        if !is_discharge {
            continue;
        }

        let no_data_value = series.variable.no_data_value;

        for entry in series.values.iter().flat_map(|v| v.value.iter()) {
            let Ok(value) = entry.value.trim().parse::<f64>() else {
                skipped += 1;
                continue;
            };
            if !value.is_finite() || (value - no_data_value).abs() < 0.1 {
                skipped += 1;
                continue;
            }
            let Some(timestamp) = parse_usgs_datetime(&entry.date_time) else {
                skipped += 1;
                continue;
            };
            observations.push(RawObservation { timestamp, value });
        }
    }

    if skipped > 0 {
        debug!(skipped, kept = observations.len(), "skipped unusable USGS records");
    }

    if observations.is_empty() {
        return Err(SourceError::NoData(
            "All timeSeries entries were empty or contained sentinel values".to_string(),
        ));
    }

    Ok(observations)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
