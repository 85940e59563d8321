use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessingError, Result};
use crate::utils::constants::{APPROVED_FLAG, CSV_TIMESTAMP_FORMAT};
use crate::utils::time::parse_hst_timestamp;

/// A single instantaneous reading as reported by the service.
///
/// The measurement is kept verbatim; the service occasionally reports
/// equipment codes (`Eqp`, `Ice`) instead of numbers, and only approved
/// readings are ever interpreted as values.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeObservation {
    pub station_id: String,
    pub timestamp: DateTime<FixedOffset>,
    pub measurement: String,
    pub dqf: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityFlag {
    Approved,
    Provisional,
    Other(String),
}

impl QualityFlag {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            APPROVED_FLAG => QualityFlag::Approved,
            "P" => QualityFlag::Provisional,
            other => QualityFlag::Other(other.to_string()),
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, QualityFlag::Approved)
    }
}

/// Row layout of the raw per-station CSV files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRow {
    pub hst_timestamp: String,
    pub measurement: String,
    #[serde(rename = "DQF")]
    pub dqf: String,
    pub station_id: String,
}

impl GaugeObservation {
    pub fn quality(&self) -> QualityFlag {
        QualityFlag::from_code(&self.dqf)
    }

    /// Numeric value of the reading; `None` when the field is empty.
    pub fn value(&self) -> Result<Option<f64>> {
        let raw = self.measurement.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
            return Ok(None);
        }

        raw.parse::<f64>().map(Some).map_err(|_| {
            ProcessingError::InvalidFormat(format!(
                "Invalid measurement '{}' for station {} at {}",
                raw, self.station_id, self.timestamp
            ))
        })
    }

    pub fn to_row(&self) -> ObservationRow {
        ObservationRow {
            hst_timestamp: self.timestamp.format(CSV_TIMESTAMP_FORMAT).to_string(),
            measurement: self.measurement.clone(),
            dqf: self.dqf.clone(),
            station_id: self.station_id.clone(),
        }
    }

    pub fn from_row(row: ObservationRow) -> Result<Self> {
        Ok(Self {
            timestamp: parse_hst_timestamp(&row.hst_timestamp)?,
            station_id: row.station_id,
            measurement: row.measurement,
            dqf: row.dqf,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(measurement: &str, dqf: &str) -> GaugeObservation {
        GaugeObservation {
            station_id: "16103000".to_string(),
            timestamp: parse_hst_timestamp("2018-03-04 05:15").unwrap(),
            measurement: measurement.to_string(),
            dqf: dqf.to_string(),
        }
    }

    #[test]
    fn test_quality_flags() {
        assert!(observation("1.0", "A").quality().is_approved());
        assert_eq!(observation("1.0", "P").quality(), QualityFlag::Provisional);
        assert_eq!(
            observation("1.0", "A:e").quality(),
            QualityFlag::Other("A:e".to_string())
        );
    }

    #[test]
    fn test_value_parsing() {
        assert_eq!(observation("3.42", "A").value().unwrap(), Some(3.42));
        assert_eq!(observation("", "A").value().unwrap(), None);
        assert!(observation("Ice", "A").value().is_err());
    }

    #[test]
    fn test_row_conversion_keeps_hst() {
        let obs = observation("3.42", "A");
        let row = obs.to_row();

        assert_eq!(row.hst_timestamp, "2018-03-04 05:15:00-10:00");

        let back = GaugeObservation::from_row(row).unwrap();
        assert_eq!(back, obs);
    }
}
