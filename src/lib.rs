/// flashflood_service: flash-flood risk inference for USGS streamflow stations.
///
/// # Module structure
///
/// ```text
/// flashflood_service
/// ├── model       — shared data types (RawSeries, FeatureRow, Prediction, SourceError, …)
/// ├── config      — service configuration loader (flood_risk.toml + FLOOD_* env)
/// ├── logging     — tracing subscriber setup and source failure classification
/// ├── stations    — station registry (stations.toml) and site code validation
/// ├── ingest
/// │   ├── usgs    — USGS NWIS IV/DV API: URL construction + JSON parsing
/// │   ├── source  — ObservationSource trait and the blocking USGS client
/// │   └── fixtures (test only) — representative API response payloads
/// ├── acquire     — recent → archival fallback under a shared time budget
/// ├── analysis
/// │   ├── features  — rolling-window feature engine (6 features per reading)
/// │   ├── alignment — as-of lookup of the feature row for a target instant
/// │   └── sanitize  — Inf → NaN → 0 replacement before scaling
/// ├── inference
/// │   ├── scaler     — per-feature standardization parameters
/// │   └── classifier — dense feed-forward probability model
/// ├── pipeline    — per-request state machine and batch prediction
/// └── endpoint    — HTTP API (health, stations, predictions)
/// ```

/// Public modules
pub mod acquire;
pub mod analysis;
pub mod config;
pub mod endpoint;
pub mod inference;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod stations;
