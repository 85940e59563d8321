use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hydroprep")]
#[command(about = "Data preparation for gauge and reanalysis flood-risk inputs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, help = "Settings file [default: ./hydroprep.toml if present]")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Root of the raw_data/ and preprocessed_data/ tree")]
    pub base_dir: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(long, global = true, help = "Log file path")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Hide progress bars")]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download station metadata and monthly gauge series
    Download {
        #[arg(long, help = "Concurrent monthly requests [default: number of CPUs]")]
        max_workers: Option<usize>,

        #[arg(long, help = "Re-download stations whose raw file exists")]
        force: bool,
    },

    /// Rearrange the reanalysis archive into one hourly grid for a year
    Rearrange {
        #[arg(short, long)]
        year: i32,

        #[arg(long, help = "Overwrite an existing grid file")]
        force: bool,
    },

    /// Resample approved gauge readings to 15 minutes and filter by coverage
    Resample {
        #[arg(long, help = "Reprocess stations whose output exists")]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_rearrange_short_year() {
        let cli = Cli::try_parse_from(["hydroprep", "rearrange", "-y", "2020"]).unwrap();
        match cli.command {
            Commands::Rearrange { year, force } => {
                assert_eq!(year, 2020);
                assert!(!force);
            }
            _ => panic!("expected rearrange"),
        }
    }

    #[test]
    fn test_rearrange_requires_year() {
        assert!(Cli::try_parse_from(["hydroprep", "rearrange"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "hydroprep",
            "download",
            "--max-workers",
            "4",
            "--base-dir",
            "/data",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.base_dir, Some(PathBuf::from("/data")));
        assert!(matches!(
            cli.command,
            Commands::Download {
                max_workers: Some(4),
                force: false
            }
        ));
    }
}
