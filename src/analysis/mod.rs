/// Streamflow analysis stages of the risk pipeline.
///
/// Submodules:
/// - `features`  — rolling-window feature engineering (`FeatureTable`)
/// - `alignment` — as-of lookup of the row valid at a requested instant
/// - `sanitize`  — non-finite repair ahead of normalization

pub mod alignment;
pub mod features;
pub mod sanitize;
