/// HST offset from UTC in seconds (UTC-10, no daylight saving)
pub const HST_OFFSET_SECONDS: i32 = -10 * 3600;

/// File names
pub const LOCATION_LIST_FILE: &str = "raw_data/location_list.txt";
pub const STATION_METADATA_FILE: &str = "raw_data/station_metadata.csv";
pub const REANALYSIS_ARCHIVE_STEM: &str = "raw_data/ERA5_1974_2025_hourly_pr";

/// Directory names
pub const RAW_OBSERVATIONS_DIR: &str = "raw_data/gauge_observations";
pub const RESAMPLED_DIR: &str = "preprocessed_data/selected_flowgauge_15mins";
pub const REANALYSIS_OUTPUT_DIR: &str = "preprocessed_data/hourly_ERA5";

/// USGS water services
pub const SITE_SERVICE_URL: &str = "https://waterservices.usgs.gov/nwis/site/";
pub const IV_SERVICE_URL: &str = "https://nwis.waterservices.usgs.gov/nwis/iv/";
pub const RDB_RECORD_PREFIX: &str = "USGS";
pub const AGENCY_CODE: &str = "USGS";
/// Gage height, feet
pub const DEFAULT_PARAMETER_CODE: &str = "00065";

/// Download range (first and last month, inclusive)
pub const FIRST_MONTH: &str = "1970-10";
pub const LAST_MONTH: &str = "2025-09";

/// Gauge quality constraints
pub const APPROVED_FLAG: &str = "A";
pub const ALIGNMENT_MINUTES: i64 = 5;
pub const MIN_SPACING_MINUTES: i64 = 5;
pub const BUCKET_MINUTES: i64 = 15;
pub const MAX_MISALIGNED_READINGS: usize = 10;
pub const COVERAGE_THRESHOLD: f64 = 0.85;

/// Analysis window (HST, inclusive)
pub const WINDOW_START: &str = "2008-01-01 00:00";
pub const WINDOW_END: &str = "2024-12-31 00:00";

/// Reanalysis coordinate names
pub const TIME_COORD: &str = "time";
pub const STEP_COORD: &str = "step";
pub const LATITUDE_COORD: &str = "latitude";
pub const LONGITUDE_COORD: &str = "longitude";
/// Auxiliary coordinates carried by the archive that are not data variables
pub const DROPPED_COORDS: [&str; 3] = ["number", "valid_time", "surface"];

/// Raw observation CSV columns
pub const COL_TIMESTAMP: &str = "hst_timestamp";
pub const COL_MEASUREMENT: &str = "measurement";
pub const COL_DQF: &str = "DQF";
pub const COL_STATION_ID: &str = "station_id";

/// Timestamp format written to CSV outputs (e.g. 2018-01-01 00:15:00-10:00)
pub const CSV_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Processing defaults
pub const DEFAULT_ROW_GROUP_SIZE: usize = 1024 * 1024;
pub const DEFAULT_BATCH_SIZE: usize = 8192;
