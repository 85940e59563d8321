use crate::error::Result;
use crate::models::LocationEntry;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads the curated station location list.
///
/// One station per line as `name, island, ..., AGENCY-code`; lines starting
/// with `#` are comments.
pub struct LocationReader;

impl LocationReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_locations(&self, path: &Path) -> Result<Vec<LocationEntry>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if let Some(entry) = self.parse_location_line(&line) {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    fn parse_location_line(&self, line: &str) -> Option<LocationEntry> {
        if line.starts_with('#') || line.trim().is_empty() {
            return None;
        }

        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 2 {
            return None;
        }

        // The code is the last field, e.g. "USGS-16103000"
        let code = parts[parts.len() - 1].trim();
        let station_id = code.rsplit('-').next().unwrap_or(code).trim().to_string();
        if station_id.is_empty() {
            return None;
        }

        Some(LocationEntry {
            name: parts[0].to_string(),
            island: parts[1].to_string(),
            station_id,
        })
    }
}

impl Default for LocationReader {
    fn default() -> Self {
        Self::new()
    }
}
