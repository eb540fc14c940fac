use bmrs_core::record::{SettlementRecord, SettlementSeries};
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use crate::error::FetchError;
use crate::provider::RawPayload;

/// Wire format of `startTime`.
pub const START_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// The four fields kept from each upstream record. All keys must be present;
/// numeric values may be null.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    start_time: String,
    #[serde(deserialize_with = "nullable")]
    system_sell_price: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    system_buy_price: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    net_imbalance_volume: Option<f64>,
}

// A plain `Option` field would silently accept a missing key.
fn nullable<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Option::<f64>::deserialize(deserializer)
}

impl WireRecord {
    fn to_record(&self) -> Result<SettlementRecord, String> {
        let start_time = NaiveDateTime::parse_from_str(&self.start_time, START_TIME_FORMAT)
            .map_err(|e| format!("invalid startTime '{}': {e}", self.start_time))?
            .and_utc();

        Ok(SettlementRecord {
            start_time,
            system_sell_price: self.system_sell_price.unwrap_or(0.0),
            system_buy_price: self.system_buy_price.unwrap_or(0.0),
            net_imbalance_volume: self.net_imbalance_volume.unwrap_or(0.0),
        })
    }
}

/// Convert a raw payload into settlement records, in payload order.
///
/// An empty payload yields an empty series. Any record that lacks a required
/// key or carries an unparsable value rejects the whole payload.
pub fn normalize(payload: &RawPayload) -> Result<SettlementSeries, FetchError> {
    let Some(entries) = &payload.data else {
        return Ok(Vec::new());
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            WireRecord::deserialize(entry)
                .map_err(|e| e.to_string())
                .and_then(|wire| wire.to_record())
                .map_err(|reason| FetchError::MalformedPayload { index, reason })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn payload(json: &str) -> RawPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn single_record() {
        let records = normalize(&payload(
            r#"{"data": [{
                "startTime": "2020-01-01T00:00:00Z",
                "systemSellPrice": 45.0,
                "systemBuyPrice": 50.0,
                "netImbalanceVolume": -12.5
            }]}"#,
        ))
        .unwrap();

        assert_eq!(
            records,
            vec![SettlementRecord {
                start_time: Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
                system_sell_price: 45.0,
                system_buy_price: 50.0,
                net_imbalance_volume: -12.5,
            }]
        );
    }

    #[test]
    fn null_values_become_zero() {
        let records = normalize(&payload(
            r#"{"data": [{
                "startTime": "2020-01-01T00:30:00Z",
                "systemSellPrice": null,
                "systemBuyPrice": 50,
                "netImbalanceVolume": null
            }]}"#,
        ))
        .unwrap();

        assert_eq!(records[0].system_sell_price, 0.0);
        assert_eq!(records[0].system_buy_price, 50.0);
        assert_eq!(records[0].net_imbalance_volume, 0.0);
    }

    #[test]
    fn extra_fields_are_dropped() {
        let records = normalize(&payload(
            r#"{"data": [{
                "settlementDate": "2020-01-01",
                "settlementPeriod": 1,
                "startTime": "2020-01-01T00:00:00Z",
                "systemSellPrice": 1.5,
                "systemBuyPrice": 2.5,
                "netImbalanceVolume": 3.5,
                "priceDerivationCode": "N"
            }]}"#,
        ))
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].net_imbalance_volume, 3.5);
    }

    #[test]
    fn empty_payload_is_empty_series() {
        assert!(normalize(&RawPayload::default()).unwrap().is_empty());
        assert!(normalize(&payload(r#"{"data": []}"#)).unwrap().is_empty());
    }

    #[test]
    fn preserves_payload_order() {
        let records = normalize(&payload(
            r#"{"data": [
                {"startTime": "2020-01-01T01:00:00Z", "systemSellPrice": 1, "systemBuyPrice": 1, "netImbalanceVolume": 1},
                {"startTime": "2020-01-01T00:30:00Z", "systemSellPrice": 2, "systemBuyPrice": 2, "netImbalanceVolume": 2}
            ]}"#,
        ))
        .unwrap();

        assert_eq!(records[0].system_sell_price, 1.0);
        assert_eq!(records[1].system_sell_price, 2.0);
    }

    #[test]
    fn missing_field_rejects_payload() {
        let err = normalize(&payload(
            r#"{"data": [
                {"startTime": "2020-01-01T00:00:00Z", "systemSellPrice": 1, "systemBuyPrice": 1, "netImbalanceVolume": 1},
                {"startTime": "2020-01-01T00:30:00Z", "systemSellPrice": 1, "netImbalanceVolume": 1}
            ]}"#,
        ))
        .unwrap_err();

        match err {
            FetchError::MalformedPayload { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("systemBuyPrice"), "{reason}");
            }
            other => panic!("expected MalformedPayload, got {other:?}"),
        }
    }

    #[test]
    fn invalid_start_time_rejects_payload() {
        let err = normalize(&payload(
            r#"{"data": [
                {"startTime": "01/01/2020 00:00", "systemSellPrice": 1, "systemBuyPrice": 1, "netImbalanceVolume": 1}
            ]}"#,
        ))
        .unwrap_err();

        assert!(matches!(err, FetchError::MalformedPayload { index: 0, .. }));
    }

    #[test]
    fn non_numeric_price_rejects_payload() {
        let err = normalize(&payload(
            r#"{"data": [
                {"startTime": "2020-01-01T00:00:00Z", "systemSellPrice": "n/a", "systemBuyPrice": 1, "netImbalanceVolume": 1}
            ]}"#,
        ))
        .unwrap_err();

        assert_eq!(err.cause(), "malformed_payload");
    }
}
