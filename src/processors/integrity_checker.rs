use crate::error::{ProcessingError, Result};
use crate::models::GaugeObservation;
use crate::utils::constants::{ALIGNMENT_MINUTES, MAX_MISALIGNED_READINGS, MIN_SPACING_MINUTES};
use crate::utils::time::is_aligned;
use chrono::{DateTime, Duration, FixedOffset};

/// How many readings of a station fall off the sampling grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentReport {
    pub station_id: String,
    pub total_readings: usize,
    pub misaligned_readings: usize,
}

impl AlignmentReport {
    /// The threshold is a count of readings, compared strictly.
    pub fn exceeds(&self, max_misaligned: usize) -> bool {
        self.misaligned_readings > max_misaligned
    }

    pub fn aligned_readings(&self) -> usize {
        self.total_readings - self.misaligned_readings
    }
}

pub struct IntegrityChecker {
    alignment_minutes: i64,
    min_spacing: Duration,
    max_misaligned: usize,
}

impl IntegrityChecker {
    pub fn new() -> Self {
        Self {
            alignment_minutes: ALIGNMENT_MINUTES,
            min_spacing: Duration::minutes(MIN_SPACING_MINUTES),
            max_misaligned: MAX_MISALIGNED_READINGS,
        }
    }

    pub fn with_max_misaligned(mut self, max_misaligned: usize) -> Self {
        self.max_misaligned = max_misaligned;
        self
    }

    pub fn max_misaligned(&self) -> usize {
        self.max_misaligned
    }

    pub fn is_aligned(&self, observation: &GaugeObservation) -> bool {
        is_aligned(&observation.timestamp, self.alignment_minutes)
    }

    pub fn check_alignment(&self, station_id: &str, observations: &[GaugeObservation]) -> AlignmentReport {
        let misaligned = observations.iter().filter(|o| !self.is_aligned(o)).count();

        AlignmentReport {
            station_id: station_id.to_string(),
            total_readings: observations.len(),
            misaligned_readings: misaligned,
        }
    }

    /// Consecutive timestamps must be at least the minimum spacing apart.
    ///
    /// Repeated or out-of-order timestamps fail too, since their difference is
    /// zero or negative.
    pub fn check_spacing(&self, station_id: &str, timestamps: &[DateTime<FixedOffset>]) -> Result<()> {
        check_spacing(station_id, timestamps, self.min_spacing)
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

pub fn check_spacing(
    station_id: &str,
    timestamps: &[DateTime<FixedOffset>],
    min_gap: Duration,
) -> Result<()> {
    if let Some(pair) = timestamps.windows(2).find(|w| w[1] - w[0] < min_gap) {
        return Err(ProcessingError::Integrity {
            station_id: station_id.to_string(),
            details: format!(
                "readings at {} and {} are {} s apart, minimum is {} s",
                pair[0],
                pair[1],
                (pair[1] - pair[0]).num_seconds(),
                min_gap.num_seconds()
            ),
        });
    }

    Ok(())
}
