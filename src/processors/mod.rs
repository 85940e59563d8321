pub mod downloader;
pub mod integrity_checker;
pub mod rearranger;
pub mod resampler;

pub use downloader::{DownloadSummary, GaugeDownloader, StationDownload};
pub use integrity_checker::{AlignmentReport, IntegrityChecker};
pub use rearranger::{rearrange, ReanalysisRearranger, RearrangeOutcome};
pub use resampler::{bucket_means, Evaluation, GaugeResampler, ResampleOutcome, ResampleSummary};
