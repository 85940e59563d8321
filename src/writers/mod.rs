pub mod atomic;
pub mod csv_writer;
pub mod grid_writer;

pub use atomic::write_atomically;
pub use csv_writer::CsvWriter;
pub use grid_writer::GridWriter;
