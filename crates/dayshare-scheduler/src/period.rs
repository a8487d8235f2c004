//! Maps an hour of day onto the configured period partition.

use dayshare_core::config::PeriodBoundary;
use dayshare_core::error::{DayShareError, Result};
use dayshare_core::types::Period;

/// A validated partition of the 24-hour day into labelled periods.
///
/// Built once at startup; classification afterwards is a pure lookup
/// that cannot fail.
#[derive(Debug, Clone)]
pub struct PeriodTable {
    /// Sorted by `start_hour`, first entry starts at 0.
    boundaries: Vec<PeriodBoundary>,
}

impl PeriodTable {
    /// Validates that the boundaries cover every hour of `[0, 24)` with no
    /// gaps or overlaps: non-empty, first start is 0, starts strictly
    /// increasing, all below 24.
    pub fn new(mut boundaries: Vec<PeriodBoundary>) -> Result<Self> {
        if boundaries.is_empty() {
            return Err(DayShareError::Config(
                "period table must have at least one entry".into(),
            ));
        }
        boundaries.sort_by_key(|b| b.start_hour);
        if boundaries[0].start_hour != 0 {
            return Err(DayShareError::Config(format!(
                "period table must start at hour 0, got {}",
                boundaries[0].start_hour
            )));
        }
        for pair in boundaries.windows(2) {
            if pair[0].start_hour == pair[1].start_hour {
                return Err(DayShareError::Config(format!(
                    "duplicate period start hour {}",
                    pair[0].start_hour
                )));
            }
        }
        if let Some(last) = boundaries.last()
            && last.start_hour >= 24
        {
            return Err(DayShareError::Config(format!(
                "period start hour {} out of range",
                last.start_hour
            )));
        }
        Ok(Self { boundaries })
    }

    /// Returns the period containing `hour`. Hours outside `0..24` are
    /// wrapped, so a caller passing raw `DateTime::hour()` is always safe.
    pub fn classify(&self, hour: u32) -> Period {
        let hour = hour % 24;
        let mut current = self.boundaries[0].label;
        for b in &self.boundaries {
            if b.start_hour <= hour {
                current = b.label;
            } else {
                break;
            }
        }
        current
    }
}
