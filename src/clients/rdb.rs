use crate::error::{ProcessingError, Result};
use crate::models::{GaugeObservation, SiteMetadata};
use crate::utils::constants::RDB_RECORD_PREFIX;
use crate::utils::time::localize_hst;
use chrono::NaiveDateTime;

const SITE_FIELDS: usize = 6;
const IV_FIELDS: usize = 6;
const IV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Data records of an RDB body. Comments, the header and the column-width
/// line never start with the agency prefix.
fn records(body: &str) -> impl Iterator<Item = Vec<&str>> {
    body.lines()
        .filter(|line| line.starts_with(RDB_RECORD_PREFIX))
        .map(|line| line.split('\t').collect())
}

/// Site number, name and coordinates from the first complete record.
pub fn parse_site_metadata(body: &str) -> Option<SiteMetadata> {
    records(body)
        .find(|fields| fields.len() >= SITE_FIELDS)
        .map(|fields| SiteMetadata {
            site_no: fields[1].trim().to_string(),
            site_name: fields[2].trim().to_string(),
            latitude: fields[4].trim().parse().ok(),
            longitude: fields[5].trim().parse().ok(),
        })
}

/// Every instantaneous-value record, timestamps taken as HST wall-clock.
pub fn parse_instantaneous_values(body: &str, station_id: &str) -> Result<Vec<GaugeObservation>> {
    records(body)
        .map(|fields| {
            if fields.len() < IV_FIELDS {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Short record for station {}: expected {} fields, got {}",
                    station_id,
                    IV_FIELDS,
                    fields.len()
                )));
            }

            let naive = NaiveDateTime::parse_from_str(fields[2].trim(), IV_TIMESTAMP_FORMAT)?;

            Ok(GaugeObservation {
                station_id: station_id.to_string(),
                timestamp: localize_hst(naive),
                measurement: fields[4].trim().to_string(),
                dqf: fields[5].trim().to_string(),
            })
        })
        .collect()
}
