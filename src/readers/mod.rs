pub mod archive_reader;
pub mod location_reader;
pub mod metadata_reader;
pub mod observation_reader;

pub use archive_reader::ArchiveReader;
pub use location_reader::LocationReader;
pub use metadata_reader::MetadataReader;
pub use observation_reader::ObservationReader;
