pub mod config;
pub mod error;
pub mod provisioning;
pub mod telemetry;

pub use error::AppError;
