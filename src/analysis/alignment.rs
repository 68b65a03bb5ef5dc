/// As-of lookup of feature rows.
///
/// The row valid at instant T is the last row with `timestamp <= T`: values
/// are carried forward, never interpolated, and never taken from the future.

use crate::analysis::features::FeatureTable;
use crate::model::FeatureRow;
use chrono::{DateTime, Duration, Utc};

/// Result of an as-of lookup bounded by a carry-forward tolerance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alignment<'a> {
    Aligned(&'a FeatureRow),
    /// Every row is later than the requested instant (or there are none).
    Miss,
    /// A row exists but is older than the tolerance allows.
    Stale { row: &'a FeatureRow, age: Duration },
}

impl FeatureTable {
    /// Last row with `timestamp <= at`, or `None`.
    pub fn as_of(&self, at: DateTime<Utc>) -> Option<&FeatureRow> {
        let rows = self.rows();
        let idx = rows.partition_point(|r| r.timestamp <= at);
        idx.checked_sub(1).map(|i| &rows[i])
    }

    /// `as_of`, additionally rejecting a row carried forward further than
    /// `max_carry_forward`. `None` disables the bound.
    pub fn as_of_within(&self, at: DateTime<Utc>, max_carry_forward: Option<Duration>) -> Alignment<'_> {
        let Some(row) = self.as_of(at) else {
            return Alignment::Miss;
        };
        let age = at - row.timestamp;
        match max_carry_forward {
            Some(limit) if age > limit => Alignment::Stale { row, age },
            _ => Alignment::Aligned(row),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
