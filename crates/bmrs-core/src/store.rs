use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::SettlementError;
use crate::record::PricePoint;
use crate::schema;

const SNAPSHOT_FILE: &str = "price_history.parquet";

/// Single-file Parquet snapshot of the system sell price history.
///
/// The file is always rewritten whole; there is no append or merge.
pub struct PriceHistoryCache {
    path: PathBuf,
}

impl PriceHistoryCache {
    /// Cache stored as `{root}/price_history.parquet`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            path: root.as_ref().join(SNAPSHOT_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn read(&self) -> Result<Vec<PricePoint>, SettlementError> {
        if !self.exists() {
            return Err(SettlementError::NoSnapshot {
                path: self.path.clone(),
            });
        }
        schema::read_parquet(&self.path)
    }

    /// Replace the snapshot with `points`. Creates parent directories as needed.
    pub fn write(&self, points: &[PricePoint]) -> Result<(), SettlementError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        schema::write_parquet(&self.path, points)
    }
}

/// Earliest and latest UTC dates covered by `points`, or None if empty.
pub fn date_span(points: &[PricePoint]) -> Option<(NaiveDate, NaiveDate)> {
    let first = points.iter().map(|p| p.start_time).min()?;
    let last = points.iter().map(|p| p.start_time).max()?;
    Some((first.date_naive(), last.date_naive()))
}
