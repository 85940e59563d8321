use crate::cli::args::{Cli, Commands};
use crate::config::Settings;
use crate::error::Result;
use crate::processors::{GaugeDownloader, GaugeResampler, ReanalysisRearranger, RearrangeOutcome};
use crate::utils::logging::init_logging;
use tracing::{debug, info};

pub async fn run(cli: Cli) -> Result<()> {
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(base_dir) = cli.base_dir {
        settings.base_dir = base_dir;
    }
    debug!(?settings, "Loaded settings");

    let silent = cli.quiet;

    match cli.command {
        Commands::Download { max_workers, force } => {
            if let Some(workers) = max_workers {
                settings.max_workers = workers;
            }

            let downloader = GaugeDownloader::from_settings(&settings)?.with_force(force);
            let summary = downloader.run(&settings, silent).await?;

            println!("\n{}", summary);
        }

        Commands::Rearrange { year, force } => {
            info!(year, archive = %settings.reanalysis_archive_path().display(), "Rearranging reanalysis archive");

            let outcome = tokio::task::spawn_blocking(move || {
                ReanalysisRearranger::from_settings(&settings)?
                    .with_force(force)
                    .run(&settings, year, silent)
            })
            .await??;

            match outcome {
                RearrangeOutcome::Written {
                    path,
                    issues_used,
                    incomplete_hours,
                } => {
                    println!("\nWrote {}", path.display());
                    println!("Issue times used: {}", issues_used);
                    println!("Hours with missing cells: {}", incomplete_hours);
                }
                RearrangeOutcome::AlreadyExists(path) => {
                    println!("{} already exists, nothing to do", path.display());
                }
            }
        }

        Commands::Resample { force } => {
            let summary = tokio::task::spawn_blocking(move || {
                GaugeResampler::from_settings(&settings)?
                    .with_force(force)
                    .run(&settings, silent)
            })
            .await??;

            println!("\n{}", summary);
        }
    }

    Ok(())
}
