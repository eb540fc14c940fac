use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::FetchError;

/// Untouched response body of one date-scoped settlement price request.
///
/// Records are kept as raw JSON values; they are only interpreted by
/// [`crate::normalize::normalize`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawPayload {
    #[serde(default)]
    pub data: Option<Vec<serde_json::Value>>,
}

impl RawPayload {
    pub fn new(records: Vec<serde_json::Value>) -> Self {
        Self {
            data: Some(records),
        }
    }

    /// True when there is no record list or the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.data.as_ref().is_none_or(|records| records.is_empty())
    }
}

/// Source of raw settlement price payloads, one calendar date per call.
#[async_trait]
pub trait SettlementSource: Send + Sync {
    /// Source name (for logging/display).
    fn name(&self) -> &str;

    /// Fetch the raw payload the upstream API files under `date`.
    /// No retry is attempted; a failed call is reported once.
    async fn fetch_raw(&self, date: NaiveDate) -> Result<RawPayload, FetchError>;
}
