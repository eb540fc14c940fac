use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("No price history snapshot at {}", path.display())]
    NoSnapshot { path: PathBuf },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}
