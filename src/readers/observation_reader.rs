use crate::error::Result;
use crate::models::{GaugeObservation, ObservationRow, QualityFlag};
use std::path::Path;

/// Reads the raw per-station observation CSVs.
pub struct ObservationReader {
    approved_only: bool,
}

impl ObservationReader {
    pub fn new() -> Self {
        Self {
            approved_only: false,
        }
    }

    pub fn with_approved_only(approved_only: bool) -> Self {
        Self { approved_only }
    }

    /// Read observations; with `approved_only`, rows not flagged `A` are
    /// dropped before their timestamps are parsed.
    pub fn read_observations(&self, path: &Path) -> Result<Vec<GaugeObservation>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut observations = Vec::new();

        for record in reader.deserialize() {
            let row: ObservationRow = record?;
            if self.approved_only && !QualityFlag::from_code(&row.dqf).is_approved() {
                continue;
            }
            observations.push(GaugeObservation::from_row(row)?);
        }

        Ok(observations)
    }
}

impl Default for ObservationReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_file() -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "hst_timestamp,measurement,DQF,station_id").unwrap();
        writeln!(temp_file, "2018-01-01 00:00:00-10:00,1.52,A,16103000").unwrap();
        writeln!(temp_file, "2018-01-01 00:05:00-10:00,1.53,P,16103000").unwrap();
        writeln!(temp_file, "2018-01-01 00:10:00-10:00,,A,16103000").unwrap();
        temp_file
    }

    #[test]
    fn test_read_all_observations() -> Result<()> {
        let file = sample_file();
        let observations = ObservationReader::new().read_observations(file.path())?;

        assert_eq!(observations.len(), 3);
        assert_eq!(observations[1].dqf, "P");
        assert_eq!(observations[2].value()?, None);

        Ok(())
    }

    #[test]
    fn test_read_approved_only() -> Result<()> {
        let file = sample_file();
        let observations =
            ObservationReader::with_approved_only(true).read_observations(file.path())?;

        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|o| o.quality().is_approved()));
        assert_eq!(observations[0].value()?, Some(1.52));

        Ok(())
    }
}
