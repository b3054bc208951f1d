use crate::adapters::airtable::{AirtableSettings, DEFAULT_API_URL};
use crate::utils::error::Result;
use crate::utils::validation::{validate_range, validate_url, Validate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "airtable-export")]
#[command(about = "Export Airtable tables into columnar analytic files")]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Project root holding `configs/` and `output/`
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Export using a JSON config
    Export(ExportArgs),

    /// Read an exported file and print the first rows as CSV
    Read(ReadArgs),

    /// Start the management HTTP server
    #[cfg(feature = "web")]
    Serve(ServeArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct ExportArgs {
    /// Path to JSON config file
    #[arg(long)]
    pub config: PathBuf,

    /// Profile name
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// Airtable API base URL
    #[arg(long, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Retries on transport errors, 429 and 5xx
    #[arg(long, default_value = "3")]
    pub max_retries: u32,

    /// Log CPU and memory after each table
    #[arg(long)]
    pub monitor: bool,
}

impl ExportArgs {
    pub fn airtable_settings(&self) -> AirtableSettings {
        AirtableSettings {
            api_url: self.api_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            ..AirtableSettings::default()
        }
    }
}

impl Validate for ExportArgs {
    fn validate(&self) -> Result<()> {
        validate_url("api_url", &self.api_url)?;
        validate_range("timeout_secs", self.timeout_secs, 1, 600)?;
        validate_range("max_retries", self.max_retries, 0, 10)?;
        Ok(())
    }
}

#[derive(Debug, Clone, clap::Args)]
pub struct ReadArgs {
    /// Path to the exported file
    #[arg(long)]
    pub input: PathBuf,

    /// Table name stored in the file
    #[arg(long, default_value = "Building")]
    pub table: String,

    /// Number of rows to print
    #[arg(long, default_value = "5")]
    pub limit: usize,
}

#[cfg(feature = "web")]
#[derive(Debug, Clone, clap::Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5000")]
    pub bind: String,
}

#[cfg(feature = "web")]
impl Validate for ServeArgs {
    fn validate(&self) -> Result<()> {
        validate_url("bind", &format!("http://{}", self.bind))
    }
}
