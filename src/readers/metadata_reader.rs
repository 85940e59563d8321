use crate::error::Result;
use crate::models::Station;
use std::path::Path;

/// Reads `station_metadata.csv` as written by the downloader.
pub struct MetadataReader;

impl MetadataReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_stations(&self, path: &Path) -> Result<Vec<Station>> {
        let mut reader = csv::Reader::from_path(path)?;
        let mut stations = Vec::new();

        for record in reader.deserialize() {
            let station: Station = record?;
            stations.push(station);
        }

        Ok(stations)
    }

    pub fn read_station_ids(&self, path: &Path) -> Result<Vec<String>> {
        Ok(self
            .read_stations(path)?
            .into_iter()
            .map(|s| s.station_id)
            .collect())
    }
}

impl Default for MetadataReader {
    fn default() -> Self {
        Self::new()
    }
}
