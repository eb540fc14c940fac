use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use tracing::debug;

use crate::error::FetchError;
use crate::provider::{RawPayload, SettlementSource};

pub const ELEXON_SYSTEM_PRICES_URL: &str =
    "https://data.elexon.co.uk/bmrs/api/v1/balancing/settlement/system-prices";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoint and timeout used to build an [`ElexonProvider`].
#[derive(Debug, Clone, PartialEq)]
pub struct ElexonConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ElexonConfig {
    fn default() -> Self {
        Self {
            base_url: ELEXON_SYSTEM_PRICES_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ElexonConfig {
    /// Read `BMRS_BASE_URL` and `BMRS_TIMEOUT_SECS`, falling back to the
    /// defaults for whichever is unset.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ElexonConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, FetchError> {
        let mut config = Self::default();
        if let Some(base_url) = lookup("BMRS_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(raw) = lookup("BMRS_TIMEOUT_SECS") {
            config.timeout = raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| FetchError::Config(format!("invalid BMRS_TIMEOUT_SECS: '{raw}'")))?;
        }
        Ok(config)
    }
}

/// Elexon BMRS system buy/sell price provider.
/// No authentication required. One request per settlement date.
pub struct ElexonProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ElexonProvider {
    /// Create against the public endpoint with the default 10 second timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::from_config(&ElexonConfig::default())
    }

    /// Create with a custom base URL and request timeout.
    pub fn with_config(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        Self::from_config(&ElexonConfig {
            base_url: base_url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &ElexonConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn url_for(&self, date: NaiveDate) -> String {
        format!("{}/{}", self.base_url, date.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl SettlementSource for ElexonProvider {
    fn name(&self) -> &str {
        "elexon"
    }

    async fn fetch_raw(&self, date: NaiveDate) -> Result<RawPayload, FetchError> {
        let url = self.url_for(date);
        debug!(%url, "requesting system prices");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status,
                message: body,
            });
        }

        let payload: RawPayload = response
            .json()
            .await
            .map_err(|e| FetchError::Decode(format!("failed to parse response: {e}")))?;

        if payload.is_empty() {
            debug!(%date, "no records in response");
        } else {
            debug!(
                %date,
                records = payload.data.as_ref().map_or(0, Vec::len),
                "retrieved raw data"
            );
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::silent_server;
    use mockito::Server;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn url_appends_date() {
        let provider = ElexonProvider::new().unwrap();
        assert_eq!(
            provider.url_for(date(2020, 1, 1)),
            "https://data.elexon.co.uk/bmrs/api/v1/balancing/settlement/system-prices/2020-01-01"
        );
    }

    #[test]
    fn trailing_slash_in_base_url() {
        let provider =
            ElexonProvider::with_config("http://localhost/prices/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            provider.url_for(date(2024, 2, 29)),
            "http://localhost/prices/2024-02-29"
        );
    }

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key: &str| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn config_from_env_values() {
        let config = ElexonConfig::from_lookup(lookup(&[
            ("BMRS_BASE_URL", "http://localhost:8080/prices"),
            ("BMRS_TIMEOUT_SECS", "3"),
        ]))
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/prices");
        assert_eq!(config.timeout, Duration::from_secs(3));

        let provider = ElexonProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url(), "http://localhost:8080/prices");
        assert_eq!(provider.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn config_missing_env_uses_defaults() {
        let config = ElexonConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ElexonConfig::default());
        assert_eq!(config.base_url, ELEXON_SYSTEM_PRICES_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn config_partial_env() {
        let config =
            ElexonConfig::from_lookup(lookup(&[("BMRS_TIMEOUT_SECS", "30")])).unwrap();
        assert_eq!(config.base_url, ELEXON_SYSTEM_PRICES_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn config_invalid_timeout_is_config_error() {
        let err = ElexonConfig::from_lookup(lookup(&[("BMRS_TIMEOUT_SECS", "ten")])).unwrap_err();
        match err {
            FetchError::Config(message) => assert!(message.contains("BMRS_TIMEOUT_SECS")),
            other => panic!("expected Config, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn fetch_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/2020-01-01")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "data": [{
                        "settlementDate": "2020-01-01",
                        "settlementPeriod": 1,
                        "startTime": "2020-01-01T00:00:00Z",
                        "systemSellPrice": 45.0,
                        "systemBuyPrice": 50.0,
                        "netImbalanceVolume": -12.5
                    }]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let provider = ElexonProvider::with_config(server.url(), DEFAULT_TIMEOUT).unwrap();
        let payload = provider.fetch_raw(date(2020, 1, 1)).await.unwrap();

        let records = payload.data.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["startTime"], "2020-01-01T00:00:00Z");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_server_error_is_status() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/2020-01-02")
            .with_status(500)
            .with_body("internal error")
            .create_async()
            .await;

        let provider = ElexonProvider::with_config(server.url(), DEFAULT_TIMEOUT).unwrap();
        let err = provider.fetch_raw(date(2020, 1, 2)).await.unwrap_err();

        match err {
            FetchError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "internal error");
            }
            other => panic!("expected Status, got {other:?}"),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_non_json_body_is_decode_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/2020-01-03")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let provider = ElexonProvider::with_config(server.url(), DEFAULT_TIMEOUT).unwrap();
        let err = provider.fetch_raw(date(2020, 1, 3)).await.unwrap_err();
        assert_eq!(err.cause(), "decode");
    }

    #[tokio::test]
    async fn fetch_unreachable_host_is_transport_error() {
        let provider =
            ElexonProvider::with_config("http://127.0.0.1:1", Duration::from_secs(2)).unwrap();
        let err = provider.fetch_raw(date(2020, 1, 1)).await.unwrap_err();
        assert!(err.is_transport(), "{err:?}");
    }

    #[tokio::test]
    async fn fetch_without_reply_is_timeout() {
        let base_url = silent_server().await;
        let provider = ElexonProvider::with_config(base_url, Duration::from_millis(300)).unwrap();

        let err = provider.fetch_raw(date(2020, 1, 1)).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout(_)), "{err:?}");
        assert_eq!(err.cause(), "timeout");
        assert!(err.is_transport());
    }
}
