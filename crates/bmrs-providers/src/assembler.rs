use bmrs_core::calendar;
use bmrs_core::record::{SettlementRecord, SettlementSeries};
use chrono::{Days, NaiveDate};
use tracing::{error, info, warn};

use crate::error::FetchError;
use crate::normalize::normalize;
use crate::provider::SettlementSource;

/// Default ceiling on the number of dates a single range request may span.
pub const DEFAULT_MAX_RANGE_DAYS: u32 = 400;

/// Builds per-day settlement series from a [`SettlementSource`].
///
/// The upstream API files periods under its own day buckets, which need not
/// match the UTC calendar day of each period's `startTime`. Each day is
/// therefore stitched from the buckets of the target date and both of its
/// neighbours, then filtered back down to the target date.
pub struct SettlementAssembler<S> {
    source: S,
    max_range_days: u32,
}

impl<S: SettlementSource> SettlementAssembler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            max_range_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }

    pub fn with_max_range_days(mut self, max_range_days: u32) -> Self {
        self.max_range_days = max_range_days;
        self
    }

    pub fn max_range_days(&self) -> u32 {
        self.max_range_days
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    async fn fetch_normalized(&self, date: NaiveDate) -> Result<SettlementSeries, FetchError> {
        let payload = self.source.fetch_raw(date).await?;
        normalize(&payload)
    }

    /// Records for one upstream bucket. Failures collapse to no rows here.
    async fn bucket(&self, date: NaiveDate) -> SettlementSeries {
        match self.fetch_normalized(date).await {
            Ok(records) => records,
            Err(e) => {
                error!(
                    source = self.source.name(),
                    %date,
                    cause = e.cause(),
                    transport = e.is_transport(),
                    error = %e,
                    "fetch_failed"
                );
                Vec::new()
            }
        }
    }

    /// All settlement periods whose UTC `startTime` falls on `date`, sorted
    /// ascending and unique by `startTime`. Empty when nothing was found.
    pub async fn assemble_day(&self, date: NaiveDate) -> SettlementSeries {
        let (Some(previous), Some(next)) = (
            date.checked_sub_days(Days::new(1)),
            date.checked_add_days(Days::new(1)),
        ) else {
            warn!(%date, "date has no neighbouring days");
            return Vec::new();
        };

        let (current, before, after) = tokio::join!(
            self.bucket(date),
            self.bucket(previous),
            self.bucket(next)
        );

        // Stable sort keeps this order among equal timestamps, so dedup
        // prefers the target date's own bucket.
        let mut records: SettlementSeries = current
            .into_iter()
            .chain(before)
            .chain(after)
            .filter(|r| r.start_time.date_naive() == date)
            .collect();
        records.sort_by_key(|r| r.start_time);
        records.dedup_by_key(|r| r.start_time);

        if records.is_empty() {
            error!(%date, "no data found for date");
        } else {
            info!(%date, periods = records.len(), "data found for date");
        }

        records
    }

    /// Concatenated day series for every date in `[start, end]`, in ascending
    /// date order. Spans longer than the configured ceiling are rejected
    /// without issuing any request.
    pub async fn assemble_range(&self, start: NaiveDate, end: NaiveDate) -> SettlementSeries {
        let days = calendar::inclusive_day_count(start, end);

        if days > i64::from(self.max_range_days) {
            error!(days, ceiling = self.max_range_days, "range_rejected");
            return Vec::new();
        }

        if days <= 0 {
            warn!(%start, %end, "range end precedes start");
            return Vec::new();
        }

        let mut records: Vec<SettlementRecord> = Vec::new();
        for date in calendar::days(start, end) {
            records.extend(self.assemble_day(date).await);
        }

        if records.is_empty() {
            error!(%start, %end, "no data found for range");
        } else {
            info!(%start, %end, periods = records.len(), "data found for range");
        }

        records
    }
}
