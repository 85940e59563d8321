pub mod grid;
pub mod observation;
pub mod series;
pub mod station;

pub use grid::{ForecastArchive, GridValues, GridVariable, ReanalysisGrid, ValueType};
pub use observation::{GaugeObservation, ObservationRow, QualityFlag};
pub use series::{CoverageWindow, ResampledPoint, ResampledRow, ResampledSeries};
pub use station::{LocationEntry, SiteMetadata, Station};
