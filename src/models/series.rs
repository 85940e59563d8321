use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{BUCKET_MINUTES, CSV_TIMESTAMP_FORMAT, WINDOW_END, WINDOW_START};
use crate::utils::time::parse_hst_timestamp;

#[derive(Debug, Clone, PartialEq)]
pub struct ResampledPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub measurement: f64,
}

/// Output row of the resampled CSV.
#[derive(Debug, Serialize)]
pub struct ResampledRow {
    pub hst_timestamp: String,
    pub measurement: f64,
}

impl From<&ResampledPoint> for ResampledRow {
    fn from(point: &ResampledPoint) -> Self {
        Self {
            hst_timestamp: point.timestamp.format(CSV_TIMESTAMP_FORMAT).to_string(),
            measurement: point.measurement,
        }
    }
}

/// Bucket means for one station, ordered by bucket start.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampledSeries {
    pub station_id: String,
    pub points: Vec<ResampledPoint>,
}

impl ResampledSeries {
    pub fn new(station_id: impl Into<String>, points: Vec<ResampledPoint>) -> Self {
        Self {
            station_id: station_id.into(),
            points,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keep only points inside the window (both ends inclusive).
    pub fn restrict_to(&self, window: &CoverageWindow) -> Self {
        let points = self
            .points
            .iter()
            .filter(|p| window.contains(&p.timestamp))
            .cloned()
            .collect();

        Self::new(self.station_id.clone(), points)
    }

    /// Fraction of the window's expected buckets that carry a value.
    pub fn coverage(&self, window: &CoverageWindow) -> f64 {
        let expected = window.expected_buckets();
        if expected == 0 {
            return 0.0;
        }
        let observed = self.points.iter().filter(|p| window.contains(&p.timestamp)).count();
        (observed as f64 / expected as f64).min(1.0)
    }
}

/// Inclusive analysis window on a fixed bucket grid.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub bucket: Duration,
}

impl CoverageWindow {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>, bucket: Duration) -> Result<Self> {
        if end < start {
            return Err(ProcessingError::Config(format!(
                "Window end {} is before start {}",
                end, start
            )));
        }
        if bucket <= Duration::zero() {
            return Err(ProcessingError::Config("Bucket width must be positive".to_string()));
        }

        Ok(Self { start, end, bucket })
    }

    /// 2008-01-01 00:00 through 2024-12-31 00:00 HST at 15 minutes.
    pub fn analysis_default() -> Result<Self> {
        Self::from_strings(WINDOW_START, WINDOW_END)
    }

    pub fn from_strings(start: &str, end: &str) -> Result<Self> {
        Self::new(
            parse_hst_timestamp(start)?,
            parse_hst_timestamp(end)?,
            Duration::minutes(BUCKET_MINUTES),
        )
    }

    pub fn contains(&self, timestamp: &DateTime<FixedOffset>) -> bool {
        *timestamp >= self.start && *timestamp <= self.end
    }

    /// Number of grid instants `start, start + bucket, ...` not after `end`.
    pub fn expected_buckets(&self) -> usize {
        let span = (self.end - self.start).num_seconds();
        let width = self.bucket.num_seconds();
        (span / width) as usize + 1
    }
}
