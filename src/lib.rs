pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
#[cfg(feature = "netcdf")]
pub mod netcdf_io;
pub mod processors;
pub mod readers;
pub mod utils;
pub mod writers;

pub use config::Settings;
pub use error::{ProcessingError, Result};
