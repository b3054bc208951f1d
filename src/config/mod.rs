#[cfg(feature = "cli")]
pub mod cli;
pub mod job_config;
pub mod paths;

pub use job_config::{load_config, ExportConfig, JobDescriptor};
pub use paths::AppPaths;
