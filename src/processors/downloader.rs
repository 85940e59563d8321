use crate::clients::WaterServicesClient;
use crate::config::Settings;
use crate::error::Result;
use crate::models::{GaugeObservation, LocationEntry, Station};
use crate::readers::LocationReader;
use crate::utils::progress::ProgressReporter;
use crate::utils::time::{month_end, month_starts};
use crate::writers::CsvWriter;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::fmt;
use tracing::{debug, info, warn};
use validator::Validate;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub stations: usize,
    pub stations_skipped: usize,
    pub months_fetched: usize,
    pub months_failed: usize,
    pub rows: usize,
}

impl fmt::Display for DownloadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Download Summary")?;
        writeln!(f, "================")?;
        writeln!(f, "Stations:          {}", self.stations)?;
        writeln!(f, "Already present:   {}", self.stations_skipped)?;
        writeln!(f, "Months fetched:    {}", self.months_fetched)?;
        writeln!(f, "Months failed:     {}", self.months_failed)?;
        write!(f, "Rows written:      {}", self.rows)
    }
}

/// Observations for one station, concatenated in month order.
#[derive(Debug, Default)]
pub struct StationDownload {
    pub observations: Vec<GaugeObservation>,
    pub months_fetched: usize,
    pub months_failed: usize,
}

pub struct GaugeDownloader {
    client: WaterServicesClient,
    months: Vec<NaiveDate>,
    max_workers: usize,
    force: bool,
}

impl GaugeDownloader {
    pub fn new(client: WaterServicesClient, first_month: NaiveDate, last_month: NaiveDate) -> Self {
        Self {
            client,
            months: month_starts(first_month, last_month),
            max_workers: num_cpus::get(),
            force: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let (first, last) = settings.month_range()?;
        Ok(Self::new(WaterServicesClient::from_settings(settings)?, first, last)
            .with_max_workers(settings.max_workers))
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Download stations whose raw file already exists.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn months(&self) -> &[NaiveDate] {
        &self.months
    }

    /// Write the station metadata table, then every station's raw series.
    pub async fn run(&self, settings: &Settings, silent: bool) -> Result<DownloadSummary> {
        let entries = LocationReader::new().read_locations(&settings.location_list_path())?;
        info!(
            stations = entries.len(),
            months = self.months.len(),
            workers = self.max_workers,
            "Starting gauge download"
        );

        let mut stations = Vec::with_capacity(entries.len());
        for entry in entries {
            stations.push(self.describe_station(entry).await);
        }

        let metadata_path = settings.station_metadata_path();
        CsvWriter::new().write_station_metadata(&stations, &metadata_path)?;
        info!(path = %metadata_path.display(), "Wrote station metadata");

        let progress =
            ProgressReporter::new(stations.len() as u64, "stations", "Downloading gauges...", silent);
        let mut summary = DownloadSummary {
            stations: stations.len(),
            ..Default::default()
        };

        for station in &stations {
            let path = settings.raw_observation_path(&station.station_id);
            if path.exists() && !self.force {
                info!(station = %station.station_id, path = %path.display(), "Output exists, skipping");
                summary.stations_skipped += 1;
                progress.increment(1);
                continue;
            }

            progress.set_message(&format!("Station {}", station.station_id));
            let download = self.download_station(&station.station_id).await;
            summary.months_fetched += download.months_fetched;
            summary.months_failed += download.months_failed;
            summary.rows += download.observations.len();

            let observations = download.observations;
            let rows = observations.len();
            tokio::task::spawn_blocking(move || {
                CsvWriter::new().write_observations(&observations, &path)
            })
            .await??;

            info!(
                station = %station.station_id,
                rows,
                months_failed = download.months_failed,
                "Wrote raw observations"
            );
            progress.increment(1);
        }

        progress.finish_with_message(&format!(
            "Downloaded {} stations ({} months failed)",
            summary.stations - summary.stations_skipped,
            summary.months_failed
        ));
        Ok(summary)
    }

    /// Build a station record; coordinates stay empty if the lookup fails.
    pub async fn describe_station(&self, entry: LocationEntry) -> Station {
        let site = match self.client.fetch_site_metadata(&entry.station_id).await {
            Ok(Some(site)) => Some(site),
            Ok(None) => {
                warn!(station = %entry.station_id, "No site record in metadata response");
                None
            }
            Err(e) => {
                warn!(station = %entry.station_id, error = %e, "Metadata lookup failed");
                None
            }
        };

        let mut station = Station::new(entry, site.as_ref());
        if let Err(e) = station.validate() {
            warn!(station = %station.station_id, error = %e, "Discarding invalid coordinates");
            station.latitude = None;
            station.longitude = None;
        }
        station
    }

    /// Fetch every month concurrently; failed months are logged and left out.
    pub async fn download_station(&self, station_id: &str) -> StationDownload {
        let mut results: Vec<_> = stream::iter(self.months.iter().copied())
            .map(|month| async move { (month, self.client.fetch_month(station_id, month).await) })
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        // Completion order is arbitrary
        results.sort_by_key(|(month, _)| *month);

        let mut download = StationDownload::default();
        for (month, result) in results {
            match result {
                Ok(observations) => {
                    debug!(station = station_id, %month, rows = observations.len(), "Fetched month");
                    download.months_fetched += 1;
                    download.observations.extend(observations);
                }
                Err(e) => {
                    warn!(
                        station = station_id,
                        start = %month,
                        end = %month_end(month),
                        error = %e,
                        "Monthly fetch failed, skipping"
                    );
                    download.months_failed += 1;
                }
            }
        }

        download
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time::parse_month;

    #[test]
    fn test_month_range_and_workers() {
        let client = WaterServicesClient::with_base_urls("http://127.0.0.1:1/", "http://127.0.0.1:1/")
            .unwrap();
        let downloader = GaugeDownloader::new(
            client,
            parse_month("1970-10").unwrap(),
            parse_month("2025-09").unwrap(),
        )
        .with_max_workers(0);

        assert_eq!(downloader.months().len(), 660);
        assert_eq!(downloader.max_workers, 1);
    }

    #[test]
    fn test_summary_display() {
        let summary = DownloadSummary {
            stations: 2,
            stations_skipped: 1,
            months_fetched: 12,
            months_failed: 1,
            rows: 300,
        };

        let text = summary.to_string();
        assert!(text.contains("Months failed:     1"));
        assert!(text.contains("Rows written:      300"));
    }
}
