use crate::config::Settings;
use crate::error::Result;
use crate::models::{ForecastArchive, ReanalysisGrid};
use crate::readers::ArchiveReader;
use crate::utils::progress::ProgressReporter;
use crate::utils::time::year_start;
use crate::writers::GridWriter;
use chrono::{Duration, NaiveDateTime};
use rayon::prelude::*;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub enum RearrangeOutcome {
    Written {
        path: PathBuf,
        issues_used: usize,
        incomplete_hours: usize,
    },
    AlreadyExists(PathBuf),
}

pub struct ReanalysisRearranger {
    reader: ArchiveReader,
    writer: GridWriter,
    force: bool,
}

impl ReanalysisRearranger {
    pub fn new() -> Self {
        Self {
            reader: ArchiveReader::new(),
            writer: GridWriter::new(),
            force: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new().with_writer(GridWriter::new().with_compression(&settings.grid_compression)?))
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_writer(mut self, writer: GridWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Build and write the grid for `year`, unless it already exists.
    pub fn run(&self, settings: &Settings, year: i32, silent: bool) -> Result<RearrangeOutcome> {
        let output = settings.reanalysis_output_path(year);
        if output.exists() && !self.force {
            info!(year, path = %output.display(), "Output exists, skipping");
            return Ok(RearrangeOutcome::AlreadyExists(output));
        }

        let archive_path = settings.reanalysis_archive_path();
        let progress = ProgressReporter::new_spinner(
            &format!("Loading {}", archive_path.display()),
            silent,
        );
        let archive = self.reader.read_archive(&archive_path, &issue_window(year)?)?;

        progress.set_message(&format!("Rearranging {}", year));
        let (grid, issues_used) = rearrange(archive, year)?;

        progress.set_message(&format!("Writing {}", output.display()));
        self.writer.write_grid(&grid, &output)?;

        let incomplete_hours = grid.incomplete_hours();
        progress.finish_with_message(&format!("Wrote {}", output.display()));
        info!(
            year,
            hours = grid.times.len(),
            issues_used,
            incomplete_hours,
            path = %output.display(),
            "Wrote hourly grid"
        );

        Ok(RearrangeOutcome::Written {
            path: output,
            issues_used,
            incomplete_hours,
        })
    }
}

impl Default for ReanalysisRearranger {
    fn default() -> Self {
        Self::new()
    }
}

/// Issue times that can contribute to `year`: Dec 31 00:00 of the previous
/// year through Jan 1 00:00 of the next, inclusive.
pub fn issue_window(year: i32) -> Result<RangeInclusive<NaiveDateTime>> {
    Ok(year_start(year)? - Duration::days(1)..=year_start(year + 1)?)
}

/// Place every archive value whose valid time falls in `year` on the hourly
/// grid. Returns the grid and the number of issue times that contributed.
///
/// Where two issues share a valid time the later issue wins. Values keep
/// the archive's storage type.
pub fn rearrange(archive: ForecastArchive, year: i32) -> Result<(ReanalysisGrid, usize)> {
    let archive = archive
        .deduplicate_issue_times()
        .select_issue_window(&issue_window(year)?);
    debug!(year, issues = archive.issue_times.len(), "Issue times in buffered window");

    let layout: Vec<_> = archive
        .variables
        .iter()
        .map(|v| (v.name.clone(), v.values.value_type()))
        .collect();
    let mut grid = ReanalysisGrid::empty(
        year,
        archive.latitudes.clone(),
        archive.longitudes.clone(),
        &layout,
    )?;

    let mut issue_order: Vec<usize> = (0..archive.issue_times.len()).collect();
    issue_order.sort_by_key(|&i| archive.issue_times[i]);

    // (issue, step, grid hour) in application order
    let mut placements = Vec::new();
    let mut issues_used = 0;
    for issue in issue_order {
        let before = placements.len();
        for (step, valid) in archive.valid_times(issue).iter().enumerate() {
            if let Some(hour) = grid.time_index(valid) {
                placements.push((issue, step, hour));
            }
        }

        if placements.len() == before {
            debug!(issued = %archive.issue_times[issue], "No valid times in year, skipping");
        } else {
            issues_used += 1;
        }
    }

    let cells = grid.cell_count();
    grid.variables
        .par_iter_mut()
        .enumerate()
        .for_each(|(variable, output)| {
            let source = &archive.variables[variable].values;
            for &(issue, step, hour) in &placements {
                output
                    .values
                    .copy_from(hour * cells, source, archive.slab_range(issue, step));
            }
        });

    Ok((grid, issues_used))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GridValues, GridVariable, ValueType};
    use chrono::{NaiveDate, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn archive(issues: Vec<NaiveDateTime>, steps: Vec<i64>, values: Vec<f32>) -> ForecastArchive {
        ForecastArchive::new(
            issues,
            steps.into_iter().map(Duration::hours).collect(),
            vec![21.0],
            vec![-158.0],
            vec![GridVariable {
                name: "tp".to_string(),
                values: GridValues::Float32(values),
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_previous_year_issue_fills_first_hours() -> Result<()> {
        // 2019-12-31 18:00 + 6h and + 7h land on 2020-01-01 00:00 and 01:00
        let source = archive(vec![at(2019, 12, 31, 18)], vec![5, 6, 7], vec![1.0, 2.0, 3.0]);

        let (grid, used) = rearrange(source, 2020)?;

        assert_eq!(used, 1);
        assert_eq!(grid.times.len(), 8784);
        assert_eq!(grid.slab(0, 0), vec![2.0]);
        assert_eq!(grid.slab(0, 1), vec![3.0]);
        assert!(grid.slab(0, 2)[0].is_nan());
        Ok(())
    }

    #[test]
    fn test_issue_outside_year_skipped() -> Result<()> {
        let source = archive(vec![at(2019, 12, 31, 0)], vec![1, 2], vec![1.0, 2.0]);

        let (grid, used) = rearrange(source, 2020)?;

        assert_eq!(used, 0);
        assert_eq!(grid.incomplete_hours(), 8784);
        Ok(())
    }

    #[test]
    fn test_later_issue_overwrites() -> Result<()> {
        // Both issues are valid at 2021-03-01 12:00
        let source = archive(
            vec![at(2021, 3, 1, 6), at(2021, 2, 28, 18)],
            vec![6, 18],
            vec![10.0, 11.0, 20.0, 21.0],
        );

        let (grid, used) = rearrange(source, 2021)?;
        let noon = grid.time_index(&at(2021, 3, 1, 12)).unwrap();

        assert_eq!(used, 2);
        assert_eq!(grid.slab(0, noon), vec![10.0]);
        Ok(())
    }

    #[test]
    fn test_duplicate_issue_keeps_first() -> Result<()> {
        let source = archive(
            vec![at(2021, 6, 1, 6), at(2021, 6, 1, 6)],
            vec![1],
            vec![1.0, 99.0],
        );

        let (grid, _) = rearrange(source, 2021)?;
        let hour = grid.time_index(&at(2021, 6, 1, 7)).unwrap();

        assert_eq!(grid.slab(0, hour), vec![1.0]);
        Ok(())
    }

    #[test]
    fn test_issue_window_bounds() -> Result<()> {
        let window = issue_window(2020)?;

        assert_eq!(*window.start(), at(2019, 12, 31, 0));
        assert_eq!(*window.end(), at(2021, 1, 1, 0));
        Ok(())
    }

    #[test]
    fn test_double_precision_preserved() -> Result<()> {
        let source = ForecastArchive::new(
            vec![at(2020, 7, 1, 6)],
            vec![Duration::hours(1)],
            vec![21.0],
            vec![-158.0],
            vec![GridVariable {
                name: "tp".to_string(),
                values: GridValues::Float64(vec![0.123456789012345]),
            }],
        )?;

        let (grid, _) = rearrange(source, 2020)?;
        let hour = grid.time_index(&at(2020, 7, 1, 7)).unwrap();

        assert_eq!(grid.variables[0].values.value_type(), ValueType::Float64);
        assert_eq!(grid.slab(0, hour), vec![0.123456789012345]);
        Ok(())
    }

    #[test]
    fn test_from_settings_uses_grid_compression() -> Result<()> {
        let mut settings = Settings::load(None)?;
        settings.grid_compression = "zstd".to_string();
        assert!(ReanalysisRearranger::from_settings(&settings).is_ok());

        settings.grid_compression = "lzma".to_string();
        assert!(ReanalysisRearranger::from_settings(&settings).is_err());
        Ok(())
    }
}
