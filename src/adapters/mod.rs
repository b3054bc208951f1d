// Adapters layer: 外部系統的具體實作（遠端 API、輸出檔、預覽輸出）

pub mod airtable;
pub mod csv_preview;
pub mod parquet_sink;

pub use airtable::{AirtableClient, AirtableSettings};
pub use parquet_sink::ParquetSink;
