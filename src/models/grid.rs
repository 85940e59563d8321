use chrono::{Duration, NaiveDateTime};
use std::ops::{Range, RangeInclusive};

use crate::error::{ProcessingError, Result};
use crate::utils::time::year_start;

/// Storage type of a variable, preserved from the source archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Float32,
    Float64,
}

/// Dense values of one variable in their source precision.
#[derive(Debug, Clone, PartialEq)]
pub enum GridValues {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

impl GridValues {
    /// `len` missing (NaN) values.
    pub fn missing(value_type: ValueType, len: usize) -> Self {
        match value_type {
            ValueType::Float32 => GridValues::Float32(vec![f32::NAN; len]),
            ValueType::Float64 => GridValues::Float64(vec![f64::NAN; len]),
        }
    }

    pub fn empty(value_type: ValueType) -> Self {
        Self::missing(value_type, 0)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            GridValues::Float32(_) => ValueType::Float32,
            GridValues::Float64(_) => ValueType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            GridValues::Float32(v) => v.len(),
            GridValues::Float64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn any_nan(&self, range: Range<usize>) -> bool {
        match self {
            GridValues::Float32(v) => v[range].iter().any(|x| x.is_nan()),
            GridValues::Float64(v) => v[range].iter().any(|x| x.is_nan()),
        }
    }

    /// Values in `range`, widened to `f64`.
    pub fn to_f64(&self, range: Range<usize>) -> Vec<f64> {
        match self {
            GridValues::Float32(v) => v[range].iter().map(|x| *x as f64).collect(),
            GridValues::Float64(v) => v[range].to_vec(),
        }
    }

    /// Append `source[range]`, converting only if the types differ.
    pub fn extend_from(&mut self, source: &GridValues, range: Range<usize>) {
        match (self, source) {
            (GridValues::Float32(dst), GridValues::Float32(src)) => dst.extend_from_slice(&src[range]),
            (GridValues::Float64(dst), GridValues::Float64(src)) => dst.extend_from_slice(&src[range]),
            (GridValues::Float32(dst), GridValues::Float64(src)) => {
                dst.extend(src[range].iter().map(|x| *x as f32))
            }
            (GridValues::Float64(dst), GridValues::Float32(src)) => {
                dst.extend(src[range].iter().map(|x| *x as f64))
            }
        }
    }

    /// Overwrite `self[at..]` with `source[range]`.
    pub fn copy_from(&mut self, at: usize, source: &GridValues, range: Range<usize>) {
        let end = at + range.len();
        match (self, source) {
            (GridValues::Float32(dst), GridValues::Float32(src)) => {
                dst[at..end].copy_from_slice(&src[range])
            }
            (GridValues::Float64(dst), GridValues::Float64(src)) => {
                dst[at..end].copy_from_slice(&src[range])
            }
            (GridValues::Float32(dst), GridValues::Float64(src)) => {
                for (d, s) in dst[at..end].iter_mut().zip(&src[range]) {
                    *d = *s as f32;
                }
            }
            (GridValues::Float64(dst), GridValues::Float32(src)) => {
                for (d, s) in dst[at..end].iter_mut().zip(&src[range]) {
                    *d = *s as f64;
                }
            }
        }
    }

    /// Place `self[i]` at `offsets[i]` in a NaN-filled array of `len`.
    pub fn scatter(&self, offsets: &[usize], len: usize) -> Self {
        match self {
            GridValues::Float32(values) => {
                let mut out = vec![f32::NAN; len];
                for (offset, value) in offsets.iter().zip(values) {
                    out[*offset] = *value;
                }
                GridValues::Float32(out)
            }
            GridValues::Float64(values) => {
                let mut out = vec![f64::NAN; len];
                for (offset, value) in offsets.iter().zip(values) {
                    out[*offset] = *value;
                }
                GridValues::Float64(out)
            }
        }
    }
}

/// One variable's values in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridVariable {
    pub name: String,
    pub values: GridValues,
}

/// Forecast archive laid out `[issue][step][lat][lon]` per variable.
#[derive(Debug, Clone)]
pub struct ForecastArchive {
    pub issue_times: Vec<NaiveDateTime>,
    pub steps: Vec<Duration>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub variables: Vec<GridVariable>,
}

impl ForecastArchive {
    pub fn new(
        issue_times: Vec<NaiveDateTime>,
        steps: Vec<Duration>,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        variables: Vec<GridVariable>,
    ) -> Result<Self> {
        let archive = Self {
            issue_times,
            steps,
            latitudes,
            longitudes,
            variables,
        };
        archive.check_shape()?;
        Ok(archive)
    }

    pub fn cell_count(&self) -> usize {
        self.latitudes.len() * self.longitudes.len()
    }

    fn issue_stride(&self) -> usize {
        self.steps.len() * self.cell_count()
    }

    fn check_shape(&self) -> Result<()> {
        let expected = self.issue_times.len() * self.issue_stride();
        for variable in &self.variables {
            if variable.values.len() != expected {
                return Err(ProcessingError::InvalidFormat(format!(
                    "Variable '{}' has {} values, expected {} ({} issues x {} steps x {} x {})",
                    variable.name,
                    variable.values.len(),
                    expected,
                    self.issue_times.len(),
                    self.steps.len(),
                    self.latitudes.len(),
                    self.longitudes.len()
                )));
            }
        }
        Ok(())
    }

    /// Index range of the `[lat][lon]` slab for one issue time and step.
    pub fn slab_range(&self, issue: usize, step: usize) -> Range<usize> {
        let cells = self.cell_count();
        let offset = issue * self.issue_stride() + step * cells;
        offset..offset + cells
    }

    /// The slab widened to `f64`.
    pub fn slab(&self, variable: usize, issue: usize, step: usize) -> Vec<f64> {
        self.variables[variable].values.to_f64(self.slab_range(issue, step))
    }

    /// Absolute times each step of an issue is valid for.
    pub fn valid_times(&self, issue: usize) -> Vec<NaiveDateTime> {
        let issued = self.issue_times[issue];
        self.steps.iter().map(|step| issued + *step).collect()
    }

    /// Drop repeated issue times, keeping the first occurrence.
    pub fn deduplicate_issue_times(self) -> Self {
        let mut seen = std::collections::HashSet::new();
        let keep: Vec<usize> = self
            .issue_times
            .iter()
            .enumerate()
            .filter(|(_, t)| seen.insert(**t))
            .map(|(i, _)| i)
            .collect();

        if keep.len() == self.issue_times.len() {
            return self;
        }
        self.select_issues(&keep)
    }

    /// Keep issue times within `window`.
    pub fn select_issue_window(self, window: &RangeInclusive<NaiveDateTime>) -> Self {
        let keep: Vec<usize> = self
            .issue_times
            .iter()
            .enumerate()
            .filter(|(_, t)| window.contains(t))
            .map(|(i, _)| i)
            .collect();

        self.select_issues(&keep)
    }

    fn select_issues(self, keep: &[usize]) -> Self {
        let stride = self.issue_stride();
        let issue_times = keep.iter().map(|&i| self.issue_times[i]).collect();
        let variables = self
            .variables
            .into_iter()
            .map(|variable| {
                let mut values = GridValues::empty(variable.values.value_type());
                for &i in keep {
                    values.extend_from(&variable.values, i * stride..(i + 1) * stride);
                }
                GridVariable {
                    name: variable.name,
                    values,
                }
            })
            .collect();

        Self {
            issue_times,
            steps: self.steps,
            latitudes: self.latitudes,
            longitudes: self.longitudes,
            variables,
        }
    }
}

/// Dense hourly grid for one calendar year, laid out `[time][lat][lon]`.
#[derive(Debug, Clone)]
pub struct ReanalysisGrid {
    pub year: i32,
    pub times: Vec<NaiveDateTime>,
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    pub variables: Vec<GridVariable>,
}

impl ReanalysisGrid {
    /// Every hour from Jan 1 00:00 through Dec 31 23:00.
    pub fn hourly_times(year: i32) -> Result<Vec<NaiveDateTime>> {
        let start = year_start(year)?;
        let end = year_start(year + 1)?;
        let hours = (end - start).num_hours();

        Ok((0..hours).map(|h| start + Duration::hours(h)).collect())
    }

    /// A grid with every cell set to NaN for the given variables.
    pub fn empty(
        year: i32,
        latitudes: Vec<f64>,
        longitudes: Vec<f64>,
        variables: &[(String, ValueType)],
    ) -> Result<Self> {
        let times = Self::hourly_times(year)?;
        let size = times.len() * latitudes.len() * longitudes.len();
        let variables = variables
            .iter()
            .map(|(name, value_type)| GridVariable {
                name: name.clone(),
                values: GridValues::missing(*value_type, size),
            })
            .collect();

        Ok(Self {
            year,
            times,
            latitudes,
            longitudes,
            variables,
        })
    }

    pub fn cell_count(&self) -> usize {
        self.latitudes.len() * self.longitudes.len()
    }

    /// Grid index of an exact hourly time, via binary search.
    pub fn time_index(&self, time: &NaiveDateTime) -> Option<usize> {
        self.times.binary_search(time).ok()
    }

    pub fn slab_range(&self, time: usize) -> Range<usize> {
        let cells = self.cell_count();
        time * cells..(time + 1) * cells
    }

    /// The `[lat][lon]` slab at one hour, widened to `f64`.
    pub fn slab(&self, variable: usize, time: usize) -> Vec<f64> {
        self.variables[variable].values.to_f64(self.slab_range(time))
    }

    pub fn variable(&self, name: &str) -> Option<&GridVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Number of hours with at least one missing cell in any variable.
    pub fn incomplete_hours(&self) -> usize {
        (0..self.times.len())
            .filter(|&t| {
                self.variables
                    .iter()
                    .any(|v| v.values.any_nan(self.slab_range(t)))
            })
            .count()
    }
}
