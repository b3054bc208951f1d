pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;
#[cfg(feature = "web")]
pub mod web;

pub use adapters::{AirtableClient, AirtableSettings, ParquetSink};
pub use config::{load_config, AppPaths, ExportConfig, JobDescriptor};
pub use core::etl::{ExportEngine, ExportSummary, TableOutcome};
pub use utils::error::{EtlError, Result};
