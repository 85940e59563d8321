pub mod rdb;
pub mod water_services;

pub use water_services::WaterServicesClient;
