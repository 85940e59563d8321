use crate::error::{ProcessingError, Result};
use crate::models::CoverageWindow;
use crate::utils::constants::*;
use crate::utils::time::parse_month;
use crate::writers::grid_writer::parse_compression;
use chrono::NaiveDate;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "hydroprep";
pub const ENV_PREFIX: &str = "HYDROPREP";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridFormat {
    Parquet,
    Netcdf,
}

impl GridFormat {
    /// Archive format read when none is configured: NetCDF if it can be read.
    pub fn default_archive() -> Self {
        if cfg!(feature = "netcdf") {
            GridFormat::Netcdf
        } else {
            GridFormat::Parquet
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            GridFormat::Parquet => "parquet",
            GridFormat::Netcdf => "nc",
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("parquet") => Some(GridFormat::Parquet),
            Some("nc") | Some("nc4") => Some(GridFormat::Netcdf),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub base_dir: PathBuf,

    pub location_list: PathBuf,
    pub station_metadata: PathBuf,
    pub raw_observations_dir: PathBuf,
    pub resampled_dir: PathBuf,

    /// Archive path; the extension selects the reader
    pub reanalysis_archive: PathBuf,
    pub reanalysis_output_dir: PathBuf,
    pub grid_format: GridFormat,
    /// Parquet compression codec for written grids
    pub grid_compression: String,

    pub site_service_url: String,
    pub iv_service_url: String,
    pub parameter_code: String,
    pub first_month: String,
    pub last_month: String,
    pub max_workers: usize,

    pub coverage_threshold: f64,
    pub max_misaligned: usize,
    pub window_start: String,
    pub window_end: String,
}

impl Settings {
    /// Load settings, reading `config_file` if given or `hydroprep.toml` if present.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("base_dir", ".")?
            .set_default("location_list", LOCATION_LIST_FILE)?
            .set_default("station_metadata", STATION_METADATA_FILE)?
            .set_default("raw_observations_dir", RAW_OBSERVATIONS_DIR)?
            .set_default("resampled_dir", RESAMPLED_DIR)?
            .set_default(
                "reanalysis_archive",
                format!(
                    "{}.{}",
                    REANALYSIS_ARCHIVE_STEM,
                    GridFormat::default_archive().extension()
                ),
            )?
            .set_default("reanalysis_output_dir", REANALYSIS_OUTPUT_DIR)?
            .set_default("grid_format", "parquet")?
            .set_default("grid_compression", "snappy")?
            .set_default("site_service_url", SITE_SERVICE_URL)?
            .set_default("iv_service_url", IV_SERVICE_URL)?
            .set_default("parameter_code", DEFAULT_PARAMETER_CODE)?
            .set_default("first_month", FIRST_MONTH)?
            .set_default("last_month", LAST_MONTH)?
            .set_default("max_workers", num_cpus::get() as u64)?
            .set_default("coverage_threshold", COVERAGE_THRESHOLD)?
            .set_default("max_misaligned", MAX_MISALIGNED_READINGS as u64)?
            .set_default("window_start", WINDOW_START)?
            .set_default("window_end", WINDOW_END)?;

        builder = match config_file {
            Some(path) => builder.add_source(File::from(path)),
            None => builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
        };

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(ProcessingError::Config(format!(
                "coverage_threshold must lie in [0, 1], got {}",
                self.coverage_threshold
            )));
        }
        if self.max_workers == 0 {
            return Err(ProcessingError::Config("max_workers must be at least 1".to_string()));
        }
        let (first, last) = self.month_range()?;
        if last < first {
            return Err(ProcessingError::Config(format!(
                "last_month {} precedes first_month {}",
                self.last_month, self.first_month
            )));
        }
        self.coverage_window()?;
        parse_compression(&self.grid_compression)?;
        Ok(())
    }

    /// Resolve a configured path against `base_dir` unless it is absolute.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn location_list_path(&self) -> PathBuf {
        self.resolve(&self.location_list)
    }

    pub fn station_metadata_path(&self) -> PathBuf {
        self.resolve(&self.station_metadata)
    }

    pub fn raw_observation_path(&self, station_id: &str) -> PathBuf {
        self.resolve(&self.raw_observations_dir)
            .join(format!("{}.csv", station_id))
    }

    pub fn resampled_path(&self, station_id: &str) -> PathBuf {
        self.resolve(&self.resampled_dir).join(format!("{}.csv", station_id))
    }

    pub fn reanalysis_archive_path(&self) -> PathBuf {
        self.resolve(&self.reanalysis_archive)
    }

    pub fn reanalysis_output_path(&self, year: i32) -> PathBuf {
        self.resolve(&self.reanalysis_output_dir)
            .join(format!("ERA5_{}.{}", year, self.grid_format.extension()))
    }

    pub fn month_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        Ok((parse_month(&self.first_month)?, parse_month(&self.last_month)?))
    }

    pub fn coverage_window(&self) -> Result<CoverageWindow> {
        CoverageWindow::from_strings(&self.window_start, &self.window_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::load(None).unwrap();

        assert_eq!(settings.parameter_code, "00065");
        assert_eq!(settings.coverage_threshold, 0.85);
        assert_eq!(settings.max_misaligned, 10);
        assert_eq!(settings.grid_format, GridFormat::Parquet);
        assert_eq!(settings.grid_compression, "snappy");
        assert_eq!(
            GridFormat::from_path(&settings.reanalysis_archive_path()),
            Some(GridFormat::default_archive())
        );
        assert_eq!(
            settings.raw_observation_path("16103000"),
            PathBuf::from("./raw_data/gauge_observations/16103000.csv")
        );
        assert_eq!(
            settings.reanalysis_output_path(2020),
            PathBuf::from("./preprocessed_data/hourly_ERA5/ERA5_2020.parquet")
        );
    }

    #[test]
    fn test_file_overrides() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "base_dir = \"/data/flood\"")?;
        writeln!(file, "grid_format = \"netcdf\"")?;
        writeln!(file, "first_month = \"2000-01\"")?;
        writeln!(file, "last_month = \"2000-12\"")?;

        let settings = Settings::load(Some(file.path()))?;

        assert_eq!(settings.base_dir, PathBuf::from("/data/flood"));
        assert_eq!(
            settings.reanalysis_output_path(1999),
            PathBuf::from("/data/flood/preprocessed_data/hourly_ERA5/ERA5_1999.nc")
        );
        let (first, last) = settings.month_range()?;
        assert_eq!(first, NaiveDate::from_ymd_opt(2000, 1, 1).unwrap());
        assert_eq!(last, NaiveDate::from_ymd_opt(2000, 12, 1).unwrap());

        Ok(())
    }

    #[test]
    fn test_invalid_threshold_rejected() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "coverage_threshold = 1.5")?;

        assert!(Settings::load(Some(file.path())).is_err());
        Ok(())
    }

    #[test]
    fn test_unknown_compression_rejected() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(file, "grid_compression = \"brotli9000\"")?;

        assert!(matches!(
            Settings::load(Some(file.path())),
            Err(ProcessingError::Config(_))
        ));
        Ok(())
    }

    #[test]
    fn test_grid_format_from_path() {
        assert_eq!(
            GridFormat::from_path(Path::new("a/ERA5.nc")),
            Some(GridFormat::Netcdf)
        );
        assert_eq!(
            GridFormat::from_path(Path::new("ERA5.parquet")),
            Some(GridFormat::Parquet)
        );
        assert_eq!(GridFormat::from_path(Path::new("ERA5.grib")), None);
    }
}
