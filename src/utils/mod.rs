pub mod error;
pub mod file_stats;
pub mod logger;
pub mod monitor;
pub mod validation;
