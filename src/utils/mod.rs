pub mod constants;
pub mod logging;
pub mod progress;
pub mod time;

pub use constants::*;
pub use logging::init_logging;
pub use progress::ProgressReporter;
