use crate::config::GridFormat;
use crate::error::{ProcessingError, Result};
use crate::models::{ForecastArchive, GridValues, GridVariable, ReanalysisGrid, ValueType};
use crate::utils::constants::{
    DEFAULT_BATCH_SIZE, DROPPED_COORDS, LATITUDE_COORD, LONGITUDE_COORD, STEP_COORD, TIME_COORD,
};
use arrow::array::*;
use arrow::compute::{cast, filter_record_batch};
use arrow::datatypes::{
    ArrowPrimitiveType, DataType, DurationMicrosecondType, DurationMillisecondType,
    DurationNanosecondType, DurationSecondType, Int64Type, Schema, SchemaRef, TimeUnit,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, Duration, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::ops::RangeInclusive;
use std::path::Path;
use tracing::{debug, info};

/// Reads the reanalysis archive (long-format Parquet, or NetCDF with the
/// `netcdf` feature) and the per-year grids written by `GridWriter`.
///
/// Archive columns are `time` (issue time), `step` (duration or integer
/// hours), `latitude`, `longitude` and one float column per variable.
/// `number`, `valid_time` and `surface` are ignored.
pub struct ArchiveReader {
    batch_size: usize,
}

impl ArchiveReader {
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Read the archive rows whose issue time lies in `window`, choosing the
    /// decoder from the file extension.
    pub fn read_archive(
        &self,
        path: &Path,
        window: &RangeInclusive<NaiveDateTime>,
    ) -> Result<ForecastArchive> {
        if !path.exists() {
            return Err(ProcessingError::MissingData(format!(
                "Reanalysis archive not found: {}",
                path.display()
            )));
        }

        match GridFormat::from_path(path) {
            Some(GridFormat::Parquet) => self.read_parquet_archive(path, window),
            #[cfg(feature = "netcdf")]
            Some(GridFormat::Netcdf) => crate::netcdf_io::read_archive(path, window),
            #[cfg(not(feature = "netcdf"))]
            Some(GridFormat::Netcdf) => Err(ProcessingError::Config(
                "NetCDF support is not enabled; rebuild with `--features netcdf`".to_string(),
            )),
            None => Err(ProcessingError::InvalidFormat(format!(
                "Unsupported archive extension: {}",
                path.display()
            ))),
        }
    }

    /// Read a long-format Parquet archive into a dense forecast archive.
    pub fn read_parquet_archive(
        &self,
        path: &Path,
        window: &RangeInclusive<NaiveDateTime>,
    ) -> Result<ForecastArchive> {
        let file = File::open(path)?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(self.batch_size);
        let mut rows = ArchiveRows::new(builder.schema());
        let reader = builder.build()?;

        for batch in reader {
            rows.extend(&batch?, window)?;
        }

        info!(
            rows = rows.issue_times.len(),
            skipped = rows.skipped,
            variables = rows.variable_names.len(),
            "Loaded reanalysis archive rows"
        );

        rows.into_archive()
    }

    /// Read a per-year grid written by `GridWriter`.
    pub fn read_grid(&self, path: &Path) -> Result<ReanalysisGrid> {
        match GridFormat::from_path(path) {
            Some(GridFormat::Parquet) => self.read_parquet_grid(path),
            #[cfg(feature = "netcdf")]
            Some(GridFormat::Netcdf) => crate::netcdf_io::read_grid(path),
            #[cfg(not(feature = "netcdf"))]
            Some(GridFormat::Netcdf) => Err(ProcessingError::Config(
                "NetCDF support is not enabled; rebuild with `--features netcdf`".to_string(),
            )),
            None => Err(ProcessingError::InvalidFormat(format!(
                "Unsupported grid extension: {}",
                path.display()
            ))),
        }
    }

    fn read_parquet_grid(&self, path: &Path) -> Result<ReanalysisGrid> {
        let file = File::open(path)?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file)?.with_batch_size(self.batch_size);
        let layout = data_variables(builder.schema());
        let reader = builder.build()?;

        let mut times = Vec::new();
        let mut latitude_axis = Axis::default();
        let mut longitude_axis = Axis::default();
        let mut columns: Vec<GridValues> =
            layout.iter().map(|(_, t)| GridValues::empty(*t)).collect();

        for batch in reader {
            let batch = batch?;
            times.extend(timestamp_column(&batch, TIME_COORD)?);
            latitude_axis.extend(&float64_column(&batch, LATITUDE_COORD)?);
            longitude_axis.extend(&float64_column(&batch, LONGITUDE_COORD)?);
            for ((name, value_type), values) in layout.iter().zip(columns.iter_mut()) {
                let column = value_column(&batch, name, *value_type)?;
                values.extend_from(&column, 0..column.len());
            }
        }

        let mut time_axis = times.clone();
        time_axis.dedup();
        let latitude_axis = latitude_axis.values;
        let longitude_axis = longitude_axis.values;

        // Rows are written time-major in grid order
        let expected = time_axis.len() * latitude_axis.len() * longitude_axis.len();
        if times.len() != expected {
            return Err(ProcessingError::InvalidFormat(format!(
                "Grid {} has {} rows, expected {}",
                path.display(),
                times.len(),
                expected
            )));
        }

        let year = time_axis
            .first()
            .map(|t| t.year())
            .ok_or_else(|| ProcessingError::MissingData(format!("Empty grid: {}", path.display())))?;

        Ok(ReanalysisGrid {
            year,
            times: time_axis,
            latitudes: latitude_axis,
            longitudes: longitude_axis,
            variables: layout
                .into_iter()
                .zip(columns)
                .map(|((name, _), values)| GridVariable { name, values })
                .collect(),
        })
    }
}

impl Default for ArchiveReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Columnar buffers collected across record batches.
struct ArchiveRows {
    issue_times: Vec<NaiveDateTime>,
    steps: Vec<Duration>,
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    latitude_axis: Axis,
    longitude_axis: Axis,
    variable_names: Vec<String>,
    variable_types: Vec<ValueType>,
    variable_values: Vec<GridValues>,
    skipped: usize,
}

impl ArchiveRows {
    fn new(schema: &SchemaRef) -> Self {
        let (variable_names, variable_types): (Vec<_>, Vec<_>) =
            data_variables(schema.as_ref()).into_iter().unzip();
        debug!(variables = ?variable_names, types = ?variable_types, "Archive data variables");

        Self {
            issue_times: Vec::new(),
            steps: Vec::new(),
            latitudes: Vec::new(),
            longitudes: Vec::new(),
            latitude_axis: Axis::default(),
            longitude_axis: Axis::default(),
            variable_values: variable_types.iter().map(|t| GridValues::empty(*t)).collect(),
            variable_names,
            variable_types,
            skipped: 0,
        }
    }

    /// Append the rows of `batch` issued inside `window`. The spatial axes
    /// are collected from every row.
    fn extend(&mut self, batch: &RecordBatch, window: &RangeInclusive<NaiveDateTime>) -> Result<()> {
        let times = timestamp_column(batch, TIME_COORD)?;
        let latitudes = float64_column(batch, LATITUDE_COORD)?;
        let longitudes = float64_column(batch, LONGITUDE_COORD)?;
        self.latitude_axis.extend(&latitudes);
        self.longitude_axis.extend(&longitudes);

        let keep: Vec<bool> = times.iter().map(|t| window.contains(t)).collect();
        let kept = keep.iter().filter(|k| **k).count();
        self.skipped += batch.num_rows() - kept;

        if kept == 0 {
            return Ok(());
        }

        self.issue_times.extend(kept_rows(times, &keep));
        self.latitudes.extend(kept_rows(latitudes, &keep));
        self.longitudes.extend(kept_rows(longitudes, &keep));

        let filtered;
        let batch = if kept < batch.num_rows() {
            filtered = filter_record_batch(batch, &BooleanArray::from(keep))?;
            &filtered
        } else {
            batch
        };

        self.steps.extend(step_column(batch, STEP_COORD)?);

        for ((name, value_type), values) in self
            .variable_names
            .iter()
            .zip(&self.variable_types)
            .zip(self.variable_values.iter_mut())
        {
            let column = value_column(batch, name, *value_type)?;
            values.extend_from(&column, 0..column.len());
        }

        Ok(())
    }

    fn into_archive(self) -> Result<ForecastArchive> {
        let mut issue_axis = self.issue_times.clone();
        issue_axis.sort();
        issue_axis.dedup();

        let mut step_axis = self.steps.clone();
        step_axis.sort();
        step_axis.dedup();

        let latitude_axis = self.latitude_axis.values;
        let longitude_axis = self.longitude_axis.values;

        let issue_index: HashMap<NaiveDateTime, usize> =
            issue_axis.iter().enumerate().map(|(i, t)| (*t, i)).collect();
        let step_index: HashMap<Duration, usize> =
            step_axis.iter().enumerate().map(|(i, s)| (*s, i)).collect();
        let lat_index: HashMap<u64, usize> = latitude_axis
            .iter()
            .enumerate()
            .map(|(i, v)| (v.to_bits(), i))
            .collect();
        let lon_index: HashMap<u64, usize> = longitude_axis
            .iter()
            .enumerate()
            .map(|(i, v)| (v.to_bits(), i))
            .collect();

        let n_lat = latitude_axis.len();
        let n_lon = longitude_axis.len();
        let size = issue_axis.len() * step_axis.len() * n_lat * n_lon;

        // Offset of every row in the dense layout
        let offsets: Vec<usize> = (0..self.issue_times.len())
            .map(|row| {
                let i = issue_index[&self.issue_times[row]];
                let s = step_index[&self.steps[row]];
                let y = lat_index[&self.latitudes[row].to_bits()];
                let x = lon_index[&self.longitudes[row].to_bits()];
                ((i * step_axis.len() + s) * n_lat + y) * n_lon + x
            })
            .collect();

        let variables = self
            .variable_names
            .into_iter()
            .zip(self.variable_values)
            .map(|(name, column)| GridVariable {
                name,
                values: column.scatter(&offsets, size),
            })
            .collect();

        ForecastArchive::new(issue_axis, step_axis, latitude_axis, longitude_axis, variables)
    }
}

fn is_data_variable(name: &str) -> bool {
    ![TIME_COORD, STEP_COORD, LATITUDE_COORD, LONGITUDE_COORD].contains(&name)
        && !DROPPED_COORDS.contains(&name)
}

/// Data variable columns and the precision they are kept in. Float64 stays
/// Float64, narrower floats become Float32, anything else is widened.
fn data_variables(schema: &Schema) -> Vec<(String, ValueType)> {
    schema
        .fields()
        .iter()
        .filter(|f| is_data_variable(f.name()))
        .map(|f| {
            let value_type = match f.data_type() {
                DataType::Float32 | DataType::Float16 => ValueType::Float32,
                _ => ValueType::Float64,
            };
            (f.name().clone(), value_type)
        })
        .collect()
}

fn kept_rows<T>(values: Vec<T>, keep: &[bool]) -> Vec<T> {
    values
        .into_iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(v, _)| v)
        .collect()
}

/// Coordinate values in the order they first appear.
#[derive(Default)]
struct Axis {
    values: Vec<f64>,
    seen: HashSet<u64>,
}

impl Axis {
    fn extend(&mut self, values: &[f64]) {
        for value in values {
            if self.seen.insert(value.to_bits()) {
                self.values.push(*value);
            }
        }
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ProcessingError::MissingData(format!("Archive column '{}' not found", name)))
}

fn timestamp_column(batch: &RecordBatch, name: &str) -> Result<Vec<NaiveDateTime>> {
    let array = cast(column(batch, name)?, &DataType::Timestamp(TimeUnit::Second, None))?;
    let seconds = array
        .as_any()
        .downcast_ref::<TimestampSecondArray>()
        .ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("Invalid {} column type", name))
        })?;

    seconds
        .values()
        .iter()
        .map(|s| {
            DateTime::from_timestamp(*s, 0)
                .map(|dt| dt.naive_utc())
                .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid timestamp: {}", s)))
        })
        .collect()
}

fn step_column(batch: &RecordBatch, name: &str) -> Result<Vec<Duration>> {
    let array = column(batch, name)?;

    match array.data_type() {
        DataType::Duration(TimeUnit::Second) => {
            duration_values::<DurationSecondType>(array, Duration::seconds)
        }
        DataType::Duration(TimeUnit::Millisecond) => {
            duration_values::<DurationMillisecondType>(array, Duration::milliseconds)
        }
        DataType::Duration(TimeUnit::Microsecond) => {
            duration_values::<DurationMicrosecondType>(array, Duration::microseconds)
        }
        DataType::Duration(TimeUnit::Nanosecond) => {
            duration_values::<DurationNanosecondType>(array, Duration::nanoseconds)
        }
        // Plain integers are lead hours
        _ => {
            let hours = cast(array, &DataType::Int64)?;
            duration_values::<Int64Type>(&hours, Duration::hours)
        }
    }
}

fn duration_values<T>(array: &ArrayRef, to_duration: fn(i64) -> Duration) -> Result<Vec<Duration>>
where
    T: ArrowPrimitiveType<Native = i64>,
{
    let typed = array
        .as_any()
        .downcast_ref::<PrimitiveArray<T>>()
        .ok_or_else(|| ProcessingError::InvalidFormat("Invalid step column type".to_string()))?;

    typed
        .iter()
        .map(|v| {
            v.map(to_duration)
                .ok_or_else(|| ProcessingError::InvalidFormat("Null lead step".to_string()))
        })
        .collect()
}

fn float64_column(batch: &RecordBatch, name: &str) -> Result<Vec<f64>> {
    let array = cast(column(batch, name)?, &DataType::Float64)?;
    let values = array
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid {} column type", name)))?;

    Ok(values.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn value_column(batch: &RecordBatch, name: &str, value_type: ValueType) -> Result<GridValues> {
    match value_type {
        ValueType::Float64 => Ok(GridValues::Float64(float64_column(batch, name)?)),
        ValueType::Float32 => {
            let array = cast(column(batch, name)?, &DataType::Float32)?;
            let values = array.as_any().downcast_ref::<Float32Array>().ok_or_else(|| {
                ProcessingError::InvalidFormat(format!("Invalid {} column type", name))
            })?;

            Ok(GridValues::Float32(
                values.iter().map(|v| v.unwrap_or(f32::NAN)).collect(),
            ))
        }
    }
}
