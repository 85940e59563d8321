use serde::{Deserialize, Serialize};
use validator::Validate;

/// One line of the manually curated location list.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationEntry {
    pub name: String,
    pub island: String,
    pub station_id: String,
}

/// Site description returned by the water services site endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteMetadata {
    pub site_no: String,
    pub site_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Station {
    #[validate(length(min = 1))]
    pub station_id: String,

    pub station_name: String,

    pub island: String,

    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
}

impl Station {
    pub fn new(entry: LocationEntry, site: Option<&SiteMetadata>) -> Self {
        Self {
            station_id: entry.station_id,
            station_name: entry.name,
            island: entry.island,
            longitude: site.and_then(|s| s.longitude),
            latitude: site.and_then(|s| s.latitude),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LocationEntry {
        LocationEntry {
            name: "Wailuku River at Piihonua".to_string(),
            island: "Hawaii".to_string(),
            station_id: "16704000".to_string(),
        }
    }

    #[test]
    fn test_station_from_entry_and_site() {
        let site = SiteMetadata {
            site_no: "16704000".to_string(),
            site_name: "WAILUKU RIVER AT PIIHONUA, HI".to_string(),
            latitude: Some(19.7122),
            longitude: Some(-155.1519),
        };

        let station = Station::new(entry(), Some(&site));

        assert_eq!(station.station_id, "16704000");
        assert_eq!(station.station_name, "Wailuku River at Piihonua");
        assert_eq!(station.island, "Hawaii");
        assert_eq!(station.latitude, Some(19.7122));
        assert_eq!(station.longitude, Some(-155.1519));
        assert!(station.validate().is_ok());
    }

    #[test]
    fn test_station_without_site_metadata() {
        let station = Station::new(entry(), None);

        assert_eq!((station.latitude, station.longitude), (None, None));
        assert!(station.validate().is_ok());
    }

    #[test]
    fn test_invalid_coordinates() {
        let mut station = Station::new(entry(), None);
        station.latitude = Some(91.0);

        assert!(station.validate().is_err());
    }
}
