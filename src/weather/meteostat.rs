use async_trait::async_trait;
use chrono::{DateTime, Days, Utc};
use serde_json::{json, Map, Value as JsonValue};

use super::error::{NormalizationError, ProviderError};
use super::provider::{
    forecast_window, parse_provider_date, parse_provider_time, read_success_json,
    NormalizeContext, RawProviderResponse, WeatherNormalizer, WeatherProviderClient,
};
use super::types::{CurrentWeather, ForecastDay, Location, ProviderKind, WeatherSnapshot};
use crate::reading::Reading;

/// Meteostat JSON API (RapidAPI). Current conditions come from the hourly
/// endpoint and the forecast from the daily endpoint, so one fetch issues both.
pub struct MeteostatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MeteostatClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    async fn get_json(
        &self,
        endpoint: &str,
        location: &Location,
        start: &str,
        end: &str,
    ) -> Result<JsonValue, ProviderError> {
        let url = format!("{}/point/{endpoint}", self.base_url.trim_end_matches('/'));
        let mut request = self
            .http
            .get(&url)
            .query(&[
                ("lat", location.latitude.to_string()),
                ("lon", location.longitude.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("units", "metric".to_string()),
            ])
            .header("x-rapidapi-key", &self.api_key);
        if let Some(host) = url::Url::parse(&self.base_url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_string))
        {
            request = request.header("x-rapidapi-host", host);
        }
        let response = request.send().await.map_err(ProviderError::from_reqwest)?;
        read_success_json(response).await
    }
}

#[async_trait]
impl WeatherProviderClient for MeteostatClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Meteostat
    }

    async fn fetch(
        &self,
        location: &Location,
        horizon_days: u32,
        now: DateTime<Utc>,
    ) -> Result<RawProviderResponse, ProviderError> {
        let today = now.date_naive();
        let yesterday = today.checked_sub_days(Days::new(1)).unwrap_or(today);
        let last_day = today
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(today);
        let (start, today, end) = (
            yesterday.to_string(),
            today.to_string(),
            last_day.to_string(),
        );

        let (hourly, daily) = tokio::join!(
            self.get_json("hourly", location, &start, &today),
            self.get_json("daily", location, &start, &end),
        );
        let (hourly, daily) = (hourly?, daily?);
        Ok(RawProviderResponse {
            body: json!({ "hourly": hourly, "daily": daily }),
        })
    }
}

pub struct MeteostatNormalizer;

impl WeatherNormalizer for MeteostatNormalizer {
    fn normalize(
        &self,
        raw: &RawProviderResponse,
        ctx: &NormalizeContext,
    ) -> Result<WeatherSnapshot, NormalizationError> {
        let body = raw
            .body
            .as_object()
            .ok_or_else(|| NormalizationError::malformed("body", "expected a JSON object"))?;

        let hourly = data_rows(body, "hourly")?;
        if hourly.is_empty() {
            return Err(NormalizationError::MissingSection("current"));
        }
        let mut latest: Option<(DateTime<Utc>, &Map<String, JsonValue>)> = None;
        for (idx, row) in hourly.iter().enumerate() {
            let observed_at = row
                .get("date")
                .and_then(JsonValue::as_str)
                .and_then(parse_provider_time)
                .ok_or_else(|| {
                    NormalizationError::malformed(format!("hourly.data[{idx}].date"), "missing or unparseable")
                })?;
            if observed_at > ctx.fetched_at {
                continue;
            }
            if latest.map_or(true, |(best, _)| observed_at > best) {
                latest = Some((observed_at, row));
            }
        }
        let (observed_at, row) = latest.ok_or(NormalizationError::MissingSection("current"))?;
        let field = |key: &str| Reading::field(Some(row), key);
        let current = CurrentWeather {
            temperature: field("temp"),
            feels_like: Reading::NO_DATA,
            dew_point: field("dwpt"),
            humidity: field("rhum"),
            cloud_cover: Reading::NO_DATA,
            wind_speed: field("wspd"),
            wind_direction: field("wdir"),
            pressure: field("pres"),
            precipitation: field("prcp"),
            condition_code: field("coco"),
            observed_at,
        };

        let mut days = Vec::new();
        for (idx, row) in data_rows(body, "daily")?.into_iter().enumerate() {
            let date = row
                .get("date")
                .and_then(JsonValue::as_str)
                .and_then(parse_provider_date)
                .ok_or_else(|| {
                    NormalizationError::malformed(format!("daily.data[{idx}].date"), "missing or unparseable")
                })?;
            let field = |key: &str| Reading::field(Some(row), key);
            days.push(ForecastDay {
                date,
                temperature_min: field("tmin"),
                temperature_avg: field("tavg"),
                temperature_max: field("tmax"),
                precipitation: field("prcp"),
                wind_speed_avg: field("wspd"),
                pressure_avg: field("pres"),
            });
        }
        let forecast = forecast_window(ctx.fetched_at.date_naive(), ctx.horizon_days, days);

        Ok(WeatherSnapshot {
            provider: ProviderKind::Meteostat,
            location: ctx.location.clone(),
            current,
            forecast,
            fetched_at: ctx.fetched_at,
        })
    }
}

/// `{ "<section>": { "data": [ {..}, .. ] } }`; absent sections and null data
/// are empty.
fn data_rows<'a>(
    body: &'a Map<String, JsonValue>,
    section: &'static str,
) -> Result<Vec<&'a Map<String, JsonValue>>, NormalizationError> {
    let section_body = match body.get(section) {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Object(map)) => map,
        Some(_) => return Err(NormalizationError::malformed(section, "expected a JSON object")),
    };
    let rows = match section_body.get("data") {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Array(rows)) => rows,
        Some(_) => {
            return Err(NormalizationError::malformed(
                format!("{section}.data"),
                "expected an array",
            ))
        }
    };
    rows.iter()
        .enumerate()
        .map(|(idx, row)| {
            row.as_object().ok_or_else(|| {
                NormalizationError::malformed(format!("{section}.data[{idx}]"), "expected a JSON object")
            })
        })
        .collect()
}
