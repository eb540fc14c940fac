use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One half-hourly settlement period as published by the balancing market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub start_time: DateTime<Utc>,
    pub system_sell_price: f64,
    pub system_buy_price: f64,
    pub net_imbalance_volume: f64,
}

/// Settlement records sorted ascending by `start_time`, unique per timestamp.
pub type SettlementSeries = Vec<SettlementRecord>;

/// A single row of the cached sell-price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub start_time: DateTime<Utc>,
    pub system_sell_price: f64,
}

impl From<&SettlementRecord> for PricePoint {
    fn from(record: &SettlementRecord) -> Self {
        Self {
            start_time: record.start_time,
            system_sell_price: record.system_sell_price,
        }
    }
}
