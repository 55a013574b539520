use thiserror::Error;

use crate::artifact::Stage;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Resolve(#[from] crate::resolver::ResolveError),

    #[error(transparent)]
    Merge(#[from] crate::merge::MergeError),

    #[error(transparent)]
    Rename(#[from] crate::rename::RenameError),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data processing error: {0}")]
    Processing(String),

    #[error("stage {stage} exceeded its wall-clock budget ({elapsed_secs}s elapsed, {budget_secs}s allowed)")]
    Timeout {
        stage: Stage,
        elapsed_secs: u64,
        budget_secs: u64,
    },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
