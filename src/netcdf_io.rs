use crate::error::{ProcessingError, Result};
use crate::models::{ForecastArchive, GridValues, GridVariable, ReanalysisGrid};
use crate::utils::constants::{LATITUDE_COORD, LONGITUDE_COORD, STEP_COORD, TIME_COORD};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use netcdf::types::{FloatType, NcVariableType};
use netcdf::AttributeValue;
use std::ops::{Range, RangeInclusive};
use std::path::Path;
use tracing::debug;

const OUTPUT_TIME_UNITS: &str = "hours since 1970-01-01 00:00:00";

/// Read the issues of a `(time, step, latitude, longitude)` archive that
/// fall inside `window`. Only that span of the time axis is loaded.
pub fn read_archive(path: &Path, window: &RangeInclusive<NaiveDateTime>) -> Result<ForecastArchive> {
    let file = netcdf::open(path)?;

    let all_times = read_times(&file, TIME_COORD)?;
    let span = window_span(&all_times, window);
    debug!(
        issues = span.len(),
        total = all_times.len(),
        "Archive issue times inside window"
    );
    let issue_times = all_times[span.clone()].to_vec();
    let steps = read_steps(&file, STEP_COORD)?;
    let latitudes = read_coordinate(&file, LATITUDE_COORD)?;
    let longitudes = read_coordinate(&file, LONGITUDE_COORD)?;

    let layout = [TIME_COORD, STEP_COORD, LATITUDE_COORD, LONGITUDE_COORD];
    let mut variables = Vec::new();
    for var in file.variables() {
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        if dims != layout {
            continue;
        }
        let name = var.name();
        debug!(variable = %name, "Reading archive variable");
        variables.push(GridVariable {
            values: read_unpacked(&var, Some(span.clone()))?,
            name,
        });
    }

    if variables.is_empty() {
        return Err(ProcessingError::MissingData(format!(
            "No variables with dimensions ({}) in {}",
            layout.join(", "),
            path.display()
        )));
    }

    ForecastArchive::new(issue_times, steps, latitudes, longitudes, variables)
}

/// Write a dense hourly grid as CF NetCDF.
pub fn write_grid(grid: &ReanalysisGrid, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let temp_path = tempfile::Builder::new()
        .suffix(".nc")
        .tempfile_in(dir)?
        .into_temp_path();

    {
        let mut file = netcdf::create(&temp_path)?;
        file.add_dimension(TIME_COORD, grid.times.len())?;
        file.add_dimension(LATITUDE_COORD, grid.latitudes.len())?;
        file.add_dimension(LONGITUDE_COORD, grid.longitudes.len())?;
        file.add_attribute("Conventions", "CF-1.8")?;

        let epoch = epoch();
        let hours: Vec<f64> = grid
            .times
            .iter()
            .map(|t| (*t - epoch).num_seconds() as f64 / 3600.0)
            .collect();

        let mut time_var = file.add_variable::<f64>(TIME_COORD, &[TIME_COORD])?;
        time_var.put_attribute("standard_name", "time")?;
        time_var.put_attribute("units", OUTPUT_TIME_UNITS)?;
        time_var.put_attribute("calendar", "standard")?;
        time_var.put_values(&hours, ..)?;

        let mut lat_var = file.add_variable::<f64>(LATITUDE_COORD, &[LATITUDE_COORD])?;
        lat_var.put_attribute("standard_name", "latitude")?;
        lat_var.put_attribute("units", "degrees_north")?;
        lat_var.put_values(&grid.latitudes, ..)?;

        let mut lon_var = file.add_variable::<f64>(LONGITUDE_COORD, &[LONGITUDE_COORD])?;
        lon_var.put_attribute("standard_name", "longitude")?;
        lon_var.put_attribute("units", "degrees_east")?;
        lon_var.put_values(&grid.longitudes, ..)?;

        let dims = [TIME_COORD, LATITUDE_COORD, LONGITUDE_COORD];
        for variable in &grid.variables {
            match &variable.values {
                GridValues::Float32(values) => {
                    let mut var = file.add_variable::<f32>(&variable.name, &dims)?;
                    var.put_attribute("_FillValue", f32::NAN)?;
                    var.put_values(values, ..)?;
                }
                GridValues::Float64(values) => {
                    let mut var = file.add_variable::<f64>(&variable.name, &dims)?;
                    var.put_attribute("_FillValue", f64::NAN)?;
                    var.put_values(values, ..)?;
                }
            }
        }
    }

    temp_path.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Read back a grid written by [`write_grid`].
pub fn read_grid(path: &Path) -> Result<ReanalysisGrid> {
    let file = netcdf::open(path)?;

    let times = read_times(&file, TIME_COORD)?;
    let latitudes = read_coordinate(&file, LATITUDE_COORD)?;
    let longitudes = read_coordinate(&file, LONGITUDE_COORD)?;
    let year = times
        .first()
        .map(|t| t.year())
        .ok_or_else(|| ProcessingError::MissingData(format!("Empty grid: {}", path.display())))?;

    let layout = [TIME_COORD, LATITUDE_COORD, LONGITUDE_COORD];
    let mut variables = Vec::new();
    for var in file.variables() {
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name()).collect();
        if dims == layout {
            variables.push(GridVariable {
                values: read_unpacked(&var, None)?,
                name: var.name(),
            });
        }
    }

    Ok(ReanalysisGrid {
        year,
        times,
        latitudes,
        longitudes,
        variables,
    })
}

/// Index range from the first to the last time inside `window`.
fn window_span(times: &[NaiveDateTime], window: &RangeInclusive<NaiveDateTime>) -> Range<usize> {
    match times.iter().position(|t| window.contains(t)) {
        Some(first) => {
            let last = times.iter().rposition(|t| window.contains(t)).unwrap_or(first);
            first..last + 1
        }
        None => 0..0,
    }
}

fn epoch() -> NaiveDateTime {
    DateTime::UNIX_EPOCH.naive_utc()
}

fn variable<'f>(file: &'f netcdf::File, name: &str) -> Result<netcdf::Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| ProcessingError::MissingData(format!("NetCDF variable '{}' not found", name)))
}

fn read_coordinate(file: &netcdf::File, name: &str) -> Result<Vec<f64>> {
    Ok(variable(file, name)?.get_values::<f64, _>(..)?)
}

fn read_times(file: &netcdf::File, name: &str) -> Result<Vec<NaiveDateTime>> {
    let var = variable(file, name)?;
    let units = string_attribute(&var, "units").ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Time coordinate '{}' has no units", name))
    })?;
    let (unit, reference) = parse_cf_time_units(&units)?;
    let reference = reference.ok_or_else(|| {
        ProcessingError::InvalidFormat(format!("Time units lack a reference date: '{}'", units))
    })?;

    let values: Vec<f64> = var.get_values(..)?;
    Ok(values.into_iter().map(|v| reference + scale(v, unit)).collect())
}

fn read_steps(file: &netcdf::File, name: &str) -> Result<Vec<Duration>> {
    let var = variable(file, name)?;
    let unit = match string_attribute(&var, "units") {
        Some(units) => parse_cf_time_units(&units)?.0,
        None => 3600.0,
    };

    let values: Vec<f64> = var.get_values(..)?;
    Ok(values.into_iter().map(|v| scale(v, unit)).collect())
}

fn scale(value: f64, seconds_per_unit: f64) -> Duration {
    Duration::milliseconds((value * seconds_per_unit * 1000.0).round() as i64)
}

/// Split CF units into seconds per unit and the optional reference time.
fn parse_cf_time_units(units: &str) -> Result<(f64, Option<NaiveDateTime>)> {
    let (unit, reference) = match units.split_once(" since ") {
        Some((unit, reference)) => (unit.trim(), Some(reference.trim())),
        None => (units.trim(), None),
    };

    let seconds = match unit.to_lowercase().as_str() {
        "days" | "day" | "d" => 86400.0,
        "hours" | "hour" | "h" => 3600.0,
        "minutes" | "minute" | "min" => 60.0,
        "seconds" | "second" | "s" => 1.0,
        "milliseconds" | "ms" => 1e-3,
        "microseconds" | "us" => 1e-6,
        "nanoseconds" | "ns" => 1e-9,
        other => {
            return Err(ProcessingError::InvalidFormat(format!(
                "Unsupported time unit '{}'",
                other
            )))
        }
    };

    let reference = reference.map(parse_reference_time).transpose()?;
    Ok((seconds, reference))
}

fn parse_reference_time(value: &str) -> Result<NaiveDateTime> {
    let value = value.trim_end_matches(" UTC").trim_end_matches('Z');

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(dt);
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| {
            ProcessingError::InvalidFormat(format!("Invalid reference time '{}'", value))
        })
}

fn string_attribute(var: &netcdf::Variable, name: &str) -> Option<String> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

fn numeric_attribute(var: &netcdf::Variable, name: &str) -> Option<f64> {
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(v as f64),
        AttributeValue::Short(v) => Some(v as f64),
        AttributeValue::Int(v) => Some(v as f64),
        AttributeValue::Longlong(v) => Some(v as f64),
        AttributeValue::Schar(v) => Some(v as f64),
        AttributeValue::Uchar(v) => Some(v as f64),
        AttributeValue::Ushort(v) => Some(v as f64),
        _ => None,
    }
}

/// Double variables, and packed variables with double scale or offset,
/// unpack to `f64`; everything else to `f32`.
fn unpacks_to_double(var: &netcdf::Variable) -> bool {
    let double_attribute = |name| {
        matches!(
            var.attribute_value(name).and_then(|v| v.ok()),
            Some(AttributeValue::Double(_))
        )
    };

    matches!(var.vartype(), NcVariableType::Float(FloatType::F64))
        || double_attribute("scale_factor")
        || double_attribute("add_offset")
}

/// Values with packing undone and fill or missing values set to NaN. With
/// `issues`, only that range of the leading dimension is read.
fn read_unpacked(var: &netcdf::Variable, issues: Option<Range<usize>>) -> Result<GridValues> {
    let scale_factor = numeric_attribute(var, "scale_factor").unwrap_or(1.0);
    let add_offset = numeric_attribute(var, "add_offset").unwrap_or(0.0);
    let fill = numeric_attribute(var, "_FillValue");
    let missing = numeric_attribute(var, "missing_value");

    let raw: Vec<f64> = match issues {
        Some(issues) if issues.is_empty() => Vec::new(),
        Some(issues) => var.get_values((issues, .., .., ..))?,
        None => var.get_values(..)?,
    };
    let unpacked = raw.into_iter().map(|v| {
        if v.is_nan() || Some(v) == fill || Some(v) == missing {
            f64::NAN
        } else {
            v * scale_factor + add_offset
        }
    });

    Ok(if unpacks_to_double(var) {
        GridValues::Float64(unpacked.collect())
    } else {
        GridValues::Float32(unpacked.map(|v| v as f32).collect())
    })
}
