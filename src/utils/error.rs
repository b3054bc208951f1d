use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid column pattern: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing credential: environment variable {variable} is not set")]
    CredentialError { variable: String },

    #[error("Failed to fetch table '{table}': {message}")]
    FetchError { table: String, message: String },

    #[error("Data processing error: {message}")]
    TransformError { message: String },

    #[error("Failed to write sink: {message}")]
    SinkWriteError { message: String },

    #[error("Failed to read sink: {message}")]
    SinkReadError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn config(message: impl Into<String>) -> Self {
        EtlError::ConfigError {
            message: message.into(),
        }
    }

    pub fn transform(message: impl Into<String>) -> Self {
        EtlError::TransformError {
            message: message.into(),
        }
    }

    pub fn sink_write(message: impl Into<String>) -> Self {
        EtlError::SinkWriteError {
            message: message.into(),
        }
    }

    pub fn sink_read(message: impl Into<String>) -> Self {
        EtlError::SinkReadError {
            message: message.into(),
        }
    }

    /// 決定錯誤嚴重程度，CLI 依此選擇退出碼
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::CredentialError { .. } => ErrorSeverity::Critical,
            EtlError::ApiError(_) | EtlError::FetchError { .. } => ErrorSeverity::Medium,
            EtlError::SinkReadError { .. } => ErrorSeverity::Low,
            _ => ErrorSeverity::High,
        }
    }

    /// 只有配置與憑證錯誤會中止整個匯出
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. } => {
                "Check that the config file contains a 'tables' list or the requested profile"
            }
            EtlError::CredentialError { .. } => "Export AIRTABLE_API_KEY before running the export",
            EtlError::ApiError(_) | EtlError::FetchError { .. } => {
                "Verify the base id, table name and API key, then retry"
            }
            EtlError::RegexError(_) => "Fix the regex 'source' pattern in the column rules",
            EtlError::SinkWriteError { .. }
            | EtlError::ArrowError(_)
            | EtlError::ParquetError(_) => "Make sure the output path is writable",
            EtlError::SinkReadError { .. } => "Check the file path and the table name",
            _ => "Re-run with --verbose for more details",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_fatal() {
        assert!(EtlError::config("bad").is_fatal());
        assert!(EtlError::CredentialError {
            variable: "AIRTABLE_API_KEY".to_string()
        }
        .is_fatal());
    }

    #[test]
    fn test_per_table_errors_are_not_fatal() {
        let fetch = EtlError::FetchError {
            table: "Building".to_string(),
            message: "timeout".to_string(),
        };
        assert!(!fetch.is_fatal());
        assert!(!EtlError::transform("boom").is_fatal());
        assert!(!EtlError::sink_write("disk full").is_fatal());
        assert_eq!(EtlError::sink_read("gone").severity(), ErrorSeverity::Low);
    }
}
