use crate::config::GridFormat;
use crate::error::{ProcessingError, Result};
use crate::models::{ForecastArchive, GridValues, GridVariable, ReanalysisGrid, ValueType};
use crate::utils::constants::{
    DEFAULT_ROW_GROUP_SIZE, LATITUDE_COORD, LONGITUDE_COORD, STEP_COORD, TIME_COORD,
};
use crate::writers::atomic::write_atomically;
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDateTime;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

/// Hours of grid written per record batch
const HOURS_PER_BATCH: usize = 24;

/// Writes reanalysis grids in long format, one row per (time, latitude,
/// longitude) with one column per variable in its own float type.
pub struct GridWriter {
    compression: Compression,
    row_group_size: usize,
}

impl GridWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = parse_compression(compression)?;
        Ok(self)
    }

    /// Write a grid, choosing the encoding from the file extension.
    pub fn write_grid(&self, grid: &ReanalysisGrid, path: &Path) -> Result<()> {
        match GridFormat::from_path(path) {
            Some(GridFormat::Parquet) => self.write_parquet_grid(grid, path),
            #[cfg(feature = "netcdf")]
            Some(GridFormat::Netcdf) => crate::netcdf_io::write_grid(grid, path),
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

    pub fn write_parquet_grid(&self, grid: &ReanalysisGrid, path: &Path) -> Result<()> {
        let schema = create_schema(&grid.variables, false);
        let cells = grid.cell_count();

        write_atomically(path, |file| {
            let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(self.properties()))?;

            for start in (0..grid.times.len()).step_by(HOURS_PER_BATCH) {
                let end = (start + HOURS_PER_BATCH).min(grid.times.len());
                let times = &grid.times[start..end];

                let mut columns = coordinate_columns(times, None, &grid.latitudes, &grid.longitudes);
                for variable in &grid.variables {
                    columns.push(value_array(&variable.values, start * cells..end * cells));
                }

                writer.write(&RecordBatch::try_new(schema.clone(), columns)?)?;
            }

            writer.close()?;
            Ok(())
        })
    }

    /// Write a forecast archive in the long format `ArchiveReader` expects.
    pub fn write_archive(&self, archive: &ForecastArchive, path: &Path) -> Result<()> {
        let schema = create_schema(&archive.variables, true);
        let cells = archive.cell_count();
        let stride = archive.steps.len() * cells;

        write_atomically(path, |file| {
            let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(self.properties()))?;

            for (issue, issued) in archive.issue_times.iter().enumerate() {
                let times = vec![*issued; archive.steps.len()];
                let mut columns = coordinate_columns(
                    &times,
                    Some(archive.steps.as_slice()),
                    &archive.latitudes,
                    &archive.longitudes,
                );
                for variable in &archive.variables {
                    columns.push(value_array(&variable.values, issue * stride..(issue + 1) * stride));
                }

                writer.write(&RecordBatch::try_new(schema.clone(), columns)?)?;
            }

            writer.close()?;
            Ok(())
        })
    }

    fn properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build()
    }
}

impl Default for GridWriter {
    fn default() -> Self {
        Self::new()
    }
}

pub fn parse_compression(name: &str) -> Result<Compression> {
    match name.to_lowercase().as_str() {
        "snappy" => Ok(Compression::SNAPPY),
        "gzip" => Ok(Compression::GZIP(GzipLevel::default())),
        "lz4" => Ok(Compression::LZ4),
        "zstd" => Ok(Compression::ZSTD(ZstdLevel::default())),
        "none" => Ok(Compression::UNCOMPRESSED),
        _ => Err(ProcessingError::Config(format!(
            "Unsupported compression: {}",
            name
        ))),
    }
}

fn arrow_type(value_type: ValueType) -> DataType {
    match value_type {
        ValueType::Float32 => DataType::Float32,
        ValueType::Float64 => DataType::Float64,
    }
}

fn value_array(values: &GridValues, range: Range<usize>) -> ArrayRef {
    match values {
        GridValues::Float32(v) => Arc::new(Float32Array::from(v[range].to_vec())),
        GridValues::Float64(v) => Arc::new(Float64Array::from(v[range].to_vec())),
    }
}

fn create_schema(variables: &[GridVariable], with_step: bool) -> SchemaRef {
    let mut fields = vec![Field::new(
        TIME_COORD,
        DataType::Timestamp(TimeUnit::Second, None),
        false,
    )];
    if with_step {
        fields.push(Field::new(
            STEP_COORD,
            DataType::Duration(TimeUnit::Second),
            false,
        ));
    }
    fields.push(Field::new(LATITUDE_COORD, DataType::Float64, false));
    fields.push(Field::new(LONGITUDE_COORD, DataType::Float64, false));
    fields.extend(
        variables
            .iter()
            .map(|v| Field::new(v.name.as_str(), arrow_type(v.values.value_type()), true)),
    );

    Arc::new(Schema::new(fields))
}

/// Coordinate columns for `times.len()` slabs of `lat x lon` cells. With
/// `steps`, slab `i` is `(times[i], steps[i])`.
fn coordinate_columns(
    times: &[NaiveDateTime],
    steps: Option<&[chrono::Duration]>,
    latitudes: &[f64],
    longitudes: &[f64],
) -> Vec<ArrayRef> {
    let cells = latitudes.len() * longitudes.len();
    let rows = times.len() * cells;

    let mut time_values = Vec::with_capacity(rows);
    let mut step_values = Vec::with_capacity(if steps.is_some() { rows } else { 0 });
    let mut lat_values = Vec::with_capacity(rows);
    let mut lon_values = Vec::with_capacity(rows);

    for (slab, time) in times.iter().enumerate() {
        let seconds = time.and_utc().timestamp();
        for lat in latitudes {
            for lon in longitudes {
                time_values.push(seconds);
                if let Some(steps) = steps {
                    step_values.push(steps[slab].num_seconds());
                }
                lat_values.push(*lat);
                lon_values.push(*lon);
            }
        }
    }

    let mut columns: Vec<ArrayRef> = vec![Arc::new(TimestampSecondArray::from(time_values))];
    if steps.is_some() {
        columns.push(Arc::new(DurationSecondArray::from(step_values)));
    }
    columns.push(Arc::new(Float64Array::from(lat_values)));
    columns.push(Arc::new(Float64Array::from(lon_values)));
    columns
}
