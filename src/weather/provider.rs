use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use super::error::{NormalizationError, ProviderError};
use super::meteostat::{MeteostatClient, MeteostatNormalizer};
use super::open_meteo::{OpenMeteoClient, OpenMeteoNormalizer};
use super::types::{ForecastDay, Location, ProviderKind, WeatherSnapshot};
use crate::config::GatewayConfig;

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Provider payload as received, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProviderResponse {
    pub body: JsonValue,
}

/// Everything a normalizer needs besides the payload. Keeping the clock out
/// of the normalizer makes it a pure function.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub location: Location,
    pub horizon_days: u32,
    pub fetched_at: DateTime<Utc>,
}

#[async_trait]
pub trait WeatherProviderClient: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// One upstream round-trip. No retries.
    async fn fetch(
        &self,
        location: &Location,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<RawProviderResponse, ProviderError>;
}

pub trait WeatherNormalizer: Send + Sync {
    fn normalize(
        &self,
        raw: &RawProviderResponse,
        ctx: &NormalizeContext,
    ) -> Result<WeatherSnapshot, NormalizationError>;
}

/// Client/normalizer pair for the configured provider.
#[derive(Clone)]
pub struct WeatherSource {
    pub client: Arc<dyn WeatherProviderClient>,
    pub normalizer: Arc<dyn WeatherNormalizer>,
}

impl WeatherSource {
    pub fn new(
        client: Arc<dyn WeatherProviderClient>,
        normalizer: Arc<dyn WeatherNormalizer>,
    ) -> Self {
        Self { client, normalizer }
    }

    pub fn from_config(config: &GatewayConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.weather_timeout_seconds))
            .user_agent(concat!("telemetry-weather-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let source = match config.weather_provider {
            ProviderKind::OpenMeteo => Self::new(
                Arc::new(OpenMeteoClient::new(http, config.weather_base_url.clone())),
                Arc::new(OpenMeteoNormalizer),
            ),
            ProviderKind::Meteostat => {
                let api_key = config
                    .weather_api_key
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("meteostat requires GATEWAY_WEATHER_API_KEY"))?;
                Self::new(
                    Arc::new(MeteostatClient::new(
                        http,
                        config.weather_base_url.clone(),
                        api_key,
                    )),
                    Arc::new(MeteostatNormalizer),
                )
            }
        };
        Ok(source)
    }

    pub fn provider(&self) -> ProviderKind {
        self.client.provider()
    }
}

/// Non-2xx becomes `HttpStatus`, a body that is
/// not JSON becomes `Decode`.
pub(crate) async fn read_success_json(
    response: reqwest::Response,
) -> Result<JsonValue, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::HttpStatus {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }
    let bytes = response.bytes().await.map_err(ProviderError::from_reqwest)?;
    serde_json::from_slice(&bytes).map_err(|err| ProviderError::Decode(err.to_string()))
}

/// Builds the fixed-length forecast window `capture_day + 1 ..= capture_day + horizon`.
/// Days outside the window are dropped, gaps become placeholders, and the
/// first entry wins when the provider repeats a date.
pub(crate) fn forecast_window(
    capture_day: NaiveDate,
    horizon_days: u32,
    upstream: impl IntoIterator<Item = ForecastDay>,
) -> Vec<ForecastDay> {
    let mut by_date: BTreeMap<NaiveDate, ForecastDay> = BTreeMap::new();
    for day in upstream {
        by_date.entry(day.date).or_insert(day);
    }
    (1..=u64::from(horizon_days))
        .filter_map(|offset| capture_day.checked_add_days(Days::new(offset)))
        .map(|date| {
            by_date
                .remove(&date)
                .unwrap_or_else(|| ForecastDay::placeholder(date))
        })
        .collect()
}

/// Accepts `2025-03-01`, `2025-03-01T00:00` and `2025-03-01 00:00:00`.
pub(crate) fn parse_provider_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let day = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Provider timestamps are UTC (we always request UTC); they come with or
/// without seconds and with or without an offset.
pub(crate) fn parse_provider_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    None
}
