use crate::error::Result;
use crate::models::{GaugeObservation, ResampledRow, ResampledSeries, Station};
use crate::utils::constants::{COL_DQF, COL_MEASUREMENT, COL_STATION_ID, COL_TIMESTAMP};
use crate::writers::atomic::write_atomically;
use serde::Serialize;
use std::fs::File;
use std::path::Path;

const STATION_HEADER: [&str; 5] = ["station_id", "station_name", "island", "longitude", "latitude"];
const OBSERVATION_HEADER: [&str; 4] = [COL_TIMESTAMP, COL_MEASUREMENT, COL_DQF, COL_STATION_ID];
const RESAMPLED_HEADER: [&str; 2] = [COL_TIMESTAMP, COL_MEASUREMENT];

/// Writes the CSV outputs. Headers are always written, even with no rows.
pub struct CsvWriter;

impl CsvWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_station_metadata(&self, stations: &[Station], path: &Path) -> Result<()> {
        write_atomically(path, |file| write_rows(file, &STATION_HEADER, stations.iter()))
    }

    /// Raw observations, in the order given.
    pub fn write_observations(&self, observations: &[GaugeObservation], path: &Path) -> Result<()> {
        write_atomically(path, |file| {
            write_rows(file, &OBSERVATION_HEADER, observations.iter().map(|o| o.to_row()))
        })
    }

    pub fn write_resampled(&self, series: &ResampledSeries, path: &Path) -> Result<()> {
        write_atomically(path, |file| {
            write_rows(file, &RESAMPLED_HEADER, series.points.iter().map(ResampledRow::from))
        })
    }
}

impl Default for CsvWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn write_rows<T, I>(file: &mut File, header: &[&str], rows: I) -> Result<()>
where
    T: Serialize,
    I: Iterator<Item = T>,
{
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LocationEntry, ResampledPoint};
    use crate::readers::{MetadataReader, ObservationReader};
    use crate::utils::time::parse_hst_timestamp;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_station_metadata_columns() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("station_metadata.csv");

        let station = Station::new(
            LocationEntry {
                name: "Hanalei River".to_string(),
                island: "Kauai".to_string(),
                station_id: "16103000".to_string(),
            },
            None,
        );
        CsvWriter::new().write_station_metadata(&[station], &path)?;

        let content = fs::read_to_string(&path)?;
        assert_eq!(
            content,
            "station_id,station_name,island,longitude,latitude\n16103000,Hanalei River,Kauai,,\n"
        );

        let stations = MetadataReader::new().read_stations(&path)?;
        assert_eq!(stations[0].station_name, "Hanalei River");
        Ok(())
    }

    #[test]
    fn test_empty_observations_still_have_header() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("obs.csv");

        CsvWriter::new().write_observations(&[], &path)?;

        assert_eq!(
            fs::read_to_string(&path)?,
            "hst_timestamp,measurement,DQF,station_id\n"
        );
        assert!(ObservationReader::new().read_observations(&path)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_write_resampled() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("resampled.csv");

        let series = ResampledSeries::new(
            "16103000",
            vec![
                ResampledPoint {
                    timestamp: parse_hst_timestamp("2010-01-01 00:00")?,
                    measurement: 1.5,
                },
                ResampledPoint {
                    timestamp: parse_hst_timestamp("2010-01-01 00:15")?,
                    measurement: 2.25,
                },
            ],
        );
        CsvWriter::new().write_resampled(&series, &path)?;

        assert_eq!(
            fs::read_to_string(&path)?,
            "hst_timestamp,measurement\n\
             2010-01-01 00:00:00-10:00,1.5\n\
             2010-01-01 00:15:00-10:00,2.25\n"
        );
        Ok(())
    }
}
