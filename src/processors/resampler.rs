use crate::config::Settings;
use crate::error::Result;
use crate::models::{CoverageWindow, GaugeObservation, ResampledPoint, ResampledSeries};
use crate::processors::integrity_checker::IntegrityChecker;
use crate::readers::{MetadataReader, ObservationReader};
use crate::utils::constants::{BUCKET_MINUTES, COVERAGE_THRESHOLD};
use crate::utils::progress::ProgressReporter;
use crate::utils::time::floor_to_minutes;
use crate::writers::CsvWriter;
use chrono::{DateTime, FixedOffset};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// What happened to one station.
#[derive(Debug, Clone, PartialEq)]
pub enum ResampleOutcome {
    Saved { coverage: f64, buckets: usize },
    AlreadyExists,
    NoData,
    TooManyMisaligned { misaligned: usize },
    NoAlignedReadings,
    LowCoverage { coverage: f64 },
}

/// Result of filtering and resampling one station in memory.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Qualified { series: ResampledSeries, coverage: f64 },
    Rejected(ResampleOutcome),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResampleSummary {
    pub stations: usize,
    pub saved: usize,
    pub already_present: usize,
    pub no_data: usize,
    pub misaligned: usize,
    pub low_coverage: usize,
}

impl ResampleSummary {
    pub fn record(&mut self, outcome: &ResampleOutcome) {
        self.stations += 1;
        match outcome {
            ResampleOutcome::Saved { .. } => self.saved += 1,
            ResampleOutcome::AlreadyExists => self.already_present += 1,
            ResampleOutcome::NoData | ResampleOutcome::NoAlignedReadings => self.no_data += 1,
            ResampleOutcome::TooManyMisaligned { .. } => self.misaligned += 1,
            ResampleOutcome::LowCoverage { .. } => self.low_coverage += 1,
        }
    }
}

impl fmt::Display for ResampleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Resampling Summary")?;
        writeln!(f, "==================")?;
        writeln!(f, "Stations:          {}", self.stations)?;
        writeln!(f, "Saved:             {}", self.saved)?;
        writeln!(f, "Already present:   {}", self.already_present)?;
        writeln!(f, "No usable data:    {}", self.no_data)?;
        writeln!(f, "Too misaligned:    {}", self.misaligned)?;
        write!(f, "Low coverage:      {}", self.low_coverage)
    }
}

pub struct GaugeResampler {
    checker: IntegrityChecker,
    window: CoverageWindow,
    coverage_threshold: f64,
    bucket_minutes: i64,
    force: bool,
}

impl GaugeResampler {
    pub fn new(window: CoverageWindow) -> Self {
        Self {
            checker: IntegrityChecker::new(),
            window,
            coverage_threshold: COVERAGE_THRESHOLD,
            bucket_minutes: BUCKET_MINUTES,
            force: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(settings.coverage_window()?)
            .with_coverage_threshold(settings.coverage_threshold)
            .with_max_misaligned(settings.max_misaligned))
    }

    pub fn with_coverage_threshold(mut self, threshold: f64) -> Self {
        self.coverage_threshold = threshold;
        self
    }

    pub fn with_max_misaligned(mut self, max_misaligned: usize) -> Self {
        self.checker = self.checker.with_max_misaligned(max_misaligned);
        self
    }

    /// Reprocess stations whose output already exists.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Resample every station listed in the metadata table.
    pub fn run(&self, settings: &Settings, silent: bool) -> Result<ResampleSummary> {
        let station_ids =
            MetadataReader::new().read_station_ids(&settings.station_metadata_path())?;
        info!(stations = station_ids.len(), "Resampling gauge series");

        let progress = ProgressReporter::new(
            station_ids.len() as u64,
            "stations",
            "Resampling gauges...",
            silent,
        );
        let mut summary = ResampleSummary::default();

        for station_id in &station_ids {
            progress.set_message(&format!("Station {}", station_id));
            let outcome = self.process_station(
                station_id,
                &settings.raw_observation_path(station_id),
                &settings.resampled_path(station_id),
            )?;
            summary.record(&outcome);
            progress.increment(1);
        }

        progress.finish_with_message(&format!(
            "Saved {} of {} stations",
            summary.saved, summary.stations
        ));
        Ok(summary)
    }

    /// Filter, resample and save one station.
    ///
    /// Integrity violations and unparseable approved measurements are
    /// returned as errors; every other rejection is an outcome.
    pub fn process_station(
        &self,
        station_id: &str,
        input: &Path,
        output: &Path,
    ) -> Result<ResampleOutcome> {
        if output.exists() && !self.force {
            info!(station = station_id, path = %output.display(), "Output exists, skipping");
            return Ok(ResampleOutcome::AlreadyExists);
        }

        let observations = ObservationReader::with_approved_only(true).read_observations(input)?;

        match self.evaluate(station_id, &observations)? {
            Evaluation::Qualified { series, coverage } => {
                CsvWriter::new().write_resampled(&series, output)?;
                info!(
                    station = station_id,
                    coverage,
                    buckets = series.len(),
                    "Saved resampled series"
                );
                Ok(ResampleOutcome::Saved {
                    coverage,
                    buckets: series.len(),
                })
            }
            Evaluation::Rejected(outcome) => Ok(outcome),
        }
    }

    /// Run the filtering and resampling steps on approved observations.
    pub fn evaluate(&self, station_id: &str, observations: &[GaugeObservation]) -> Result<Evaluation> {
        // Values are parsed up front so a corrupt approved reading fails fast
        let values = observations
            .iter()
            .map(|o| o.value())
            .collect::<Result<Vec<_>>>()?;

        if observations.is_empty() {
            warn!(station = station_id, "No data");
            return Ok(Evaluation::Rejected(ResampleOutcome::NoData));
        }

        let report = self.checker.check_alignment(station_id, observations);
        if report.exceeds(self.checker.max_misaligned()) {
            warn!(
                station = station_id,
                misaligned = report.misaligned_readings,
                "Too many readings off the 5-minute grid"
            );
            return Ok(Evaluation::Rejected(ResampleOutcome::TooManyMisaligned {
                misaligned: report.misaligned_readings,
            }));
        }

        let aligned: Vec<(DateTime<FixedOffset>, Option<f64>)> = observations
            .iter()
            .zip(values)
            .filter(|(o, _)| self.checker.is_aligned(o))
            .map(|(o, v)| (o.timestamp, v))
            .collect();

        if aligned.is_empty() {
            warn!(station = station_id, "No readings on the 5-minute grid");
            return Ok(Evaluation::Rejected(ResampleOutcome::NoAlignedReadings));
        }
        if report.misaligned_readings > 0 {
            debug!(
                station = station_id,
                dropped = report.misaligned_readings,
                "Dropped misaligned readings"
            );
        }

        let timestamps: Vec<_> = aligned.iter().map(|(t, _)| *t).collect();
        self.checker.check_spacing(station_id, &timestamps)?;

        let series = ResampledSeries::new(station_id, bucket_means(&aligned, self.bucket_minutes))
            .restrict_to(&self.window);
        let coverage = series.coverage(&self.window);

        if coverage > self.coverage_threshold {
            Ok(Evaluation::Qualified { series, coverage })
        } else {
            info!(
                station = station_id,
                coverage,
                threshold = self.coverage_threshold,
                "Coverage below threshold, not saved"
            );
            Ok(Evaluation::Rejected(ResampleOutcome::LowCoverage { coverage }))
        }
    }
}

/// Mean of the present values in each left-closed, left-labelled bucket.
/// Buckets without any value are omitted.
pub fn bucket_means(
    readings: &[(DateTime<FixedOffset>, Option<f64>)],
    bucket_minutes: i64,
) -> Vec<ResampledPoint> {
    let mut buckets: BTreeMap<DateTime<FixedOffset>, (f64, usize)> = BTreeMap::new();

    for (timestamp, value) in readings {
        if let Some(value) = value {
            let entry = buckets
                .entry(floor_to_minutes(timestamp, bucket_minutes))
                .or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(timestamp, (sum, count))| ResampledPoint {
            timestamp,
            measurement: sum / count as f64,
        })
        .collect()
}
