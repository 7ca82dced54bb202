use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AcceptanceError {
    #[error("not initialized: run 'acceptance init'")]
    NotInitialized,

    #[error("log write to {path} failed after {attempts} attempts: {source}")]
    LogWrite {
        path: PathBuf,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("boundary violation: {0}")]
    Boundary(String),

    #[error("test plan not found: {0}")]
    PlanNotFound(PathBuf),

    #[error("invalid test plan: {0}")]
    InvalidPlan(String),

    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("summary not found: {0}")]
    SummaryNotFound(PathBuf),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Fmt(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, AcceptanceError>;
