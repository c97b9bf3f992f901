//! Logging setup and job status reporting.

pub mod logging;
pub mod status;

pub use logging::{setup_logging, LogFormat};
pub use status::{JobReport, StatusBoard};
