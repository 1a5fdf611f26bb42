use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FunnelError {
    #[error("source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FunnelError {
    /// Stable label for machine-readable reports.
    pub fn kind(&self) -> &'static str {
        match self {
            FunnelError::SourceNotFound { .. } => "missing_source",
            FunnelError::MalformedRecord { .. } => "malformed_record",
            FunnelError::Io(_) => "io",
            FunnelError::Csv(_) => "csv",
            FunnelError::Json(_) => "json",
            FunnelError::Toml(_) | FunnelError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, FunnelError>;
