use std::collections::BTreeMap;

use chrono::Timelike;
use serde::Serialize;

use crate::record::SettlementRecord;

/// Imbalance cost of one settlement period.
///
/// A deficit (positive volume) is bought back at the system buy price and a
/// surplus (negative volume) is sold off at the system sell price.
pub fn imbalance_cost(record: &SettlementRecord) -> f64 {
    let niv = record.net_imbalance_volume;
    if niv > 0.0 {
        niv * record.system_buy_price
    } else if niv < 0.0 {
        niv.abs() * record.system_sell_price
    } else {
        0.0
    }
}

/// Absolute net imbalance volume summed per UTC hour of day.
pub fn hourly_abs_volume(records: &[SettlementRecord]) -> BTreeMap<u32, f64> {
    let mut hours = BTreeMap::new();
    for record in records {
        *hours.entry(record.start_time.hour()).or_insert(0.0) += record.net_imbalance_volume.abs();
    }
    hours
}

/// Derived statistics for an assembled series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub periods: usize,
    pub total_cost: f64,
    pub total_abs_volume: f64,
    /// Cost per unit of absolute imbalance volume; `None` when volume is zero.
    pub unit_rate: Option<f64>,
    pub mean_sell_price: Option<f64>,
    pub mean_buy_price: Option<f64>,
    /// UTC hour with the largest absolute imbalance volume, earliest on ties.
    pub peak_hour: Option<u32>,
}

impl DailySummary {
    pub fn from_records(records: &[SettlementRecord]) -> Self {
        let periods = records.len();
        let total_cost: f64 = records.iter().map(imbalance_cost).sum();
        let total_abs_volume: f64 = records.iter().map(|r| r.net_imbalance_volume.abs()).sum();

        let unit_rate = (total_abs_volume > 0.0).then(|| total_cost / total_abs_volume);

        let mean = |f: fn(&SettlementRecord) -> f64| {
            (periods > 0).then(|| records.iter().map(f).sum::<f64>() / periods as f64)
        };

        let mut peak_hour: Option<(u32, f64)> = None;
        for (hour, volume) in hourly_abs_volume(records) {
            match peak_hour {
                Some((_, best)) if volume <= best => {}
                _ => peak_hour = Some((hour, volume)),
            }
        }

        Self {
            periods,
            total_cost,
            total_abs_volume,
            unit_rate,
            mean_sell_price: mean(|r| r.system_sell_price),
            mean_buy_price: mean(|r| r.system_buy_price),
            peak_hour: peak_hour.map(|(hour, _)| hour),
        }
    }
}
