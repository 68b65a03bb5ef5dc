/// Observation ingest.
///
/// - `usgs`   — NWIS IV/DV URL construction and WaterML-JSON parsing
/// - `source` — the `ObservationSource` seam and its USGS implementation

pub mod source;
pub mod usgs;

#[cfg(test)]
pub(crate) mod fixtures;
