use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value as JsonValue};

use super::error::{NormalizationError, ProviderError};
use super::provider::{
    forecast_window, parse_provider_date, parse_provider_time, read_success_json,
    NormalizeContext, RawProviderResponse, WeatherNormalizer, WeatherProviderClient,
};
use super::types::{CurrentWeather, ForecastDay, Location, ProviderKind, WeatherSnapshot};
use crate::reading::Reading;

const CURRENT_FIELDS: &str = "temperature_2m,apparent_temperature,dew_point_2m,relative_humidity_2m,cloud_cover,wind_speed_10m,wind_direction_10m,pressure_msl,precipitation,weather_code";
const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,temperature_2m_mean,precipitation_sum,wind_speed_10m_mean,pressure_msl_mean";

pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl WeatherProviderClient for OpenMeteoClient {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenMeteo
    }

    async fn fetch(
        &self,
        location: &Location,
        horizon_days: u32,
        _now: DateTime<Utc>,
    ) -> Result<RawProviderResponse, ProviderError> {
        let url = format!("{}/v1/forecast", self.base_url.trim_end_matches('/'));
        // Today is included by the provider, so ask for one extra day.
        let forecast_days = horizon_days.saturating_add(1);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("latitude", location.latitude.to_string()),
                ("longitude", location.longitude.to_string()),
                ("current", CURRENT_FIELDS.to_string()),
                ("daily", DAILY_FIELDS.to_string()),
                ("timezone", "UTC".to_string()),
                ("forecast_days", forecast_days.to_string()),
                ("temperature_unit", "celsius".to_string()),
                ("wind_speed_unit", "kmh".to_string()),
                ("precipitation_unit", "mm".to_string()),
            ])
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let body = read_success_json(response).await?;
        Ok(RawProviderResponse { body })
    }
}

pub struct OpenMeteoNormalizer;

impl WeatherNormalizer for OpenMeteoNormalizer {
    fn normalize(
        &self,
        raw: &RawProviderResponse,
        ctx: &NormalizeContext,
    ) -> Result<WeatherSnapshot, NormalizationError> {
        let body = raw
            .body
            .as_object()
            .ok_or_else(|| NormalizationError::malformed("body", "expected a JSON object"))?;

        let current = section(body, "current")?
            .ok_or(NormalizationError::MissingSection("current"))?;
        let observed_at = match current.get("time").and_then(JsonValue::as_str) {
            Some(raw_time) => parse_provider_time(raw_time).ok_or_else(|| {
                NormalizationError::malformed("current.time", format!("unparseable time {raw_time:?}"))
            })?,
            None => ctx.fetched_at,
        };
        let field = |key: &str| Reading::field(Some(current), key);
        let current = CurrentWeather {
            temperature: field("temperature_2m"),
            feels_like: field("apparent_temperature"),
            dew_point: field("dew_point_2m"),
            humidity: field("relative_humidity_2m"),
            cloud_cover: field("cloud_cover"),
            wind_speed: field("wind_speed_10m"),
            wind_direction: field("wind_direction_10m"),
            pressure: field("pressure_msl"),
            precipitation: field("precipitation"),
            condition_code: field("weather_code"),
            observed_at,
        };

        let days = match section(body, "daily")? {
            Some(daily) => daily_rows(daily)?,
            None => Vec::new(),
        };
        let forecast = forecast_window(ctx.fetched_at.date_naive(), ctx.horizon_days, days);

        Ok(WeatherSnapshot {
            provider: ProviderKind::OpenMeteo,
            location: ctx.location.clone(),
            current,
            forecast,
            fetched_at: ctx.fetched_at,
        })
    }
}

fn section<'a>(
    body: &'a Map<String, JsonValue>,
    name: &'static str,
) -> Result<Option<&'a Map<String, JsonValue>>, NormalizationError> {
    match body.get(name) {
        None | Some(JsonValue::Null) => Ok(None),
        Some(JsonValue::Object(map)) => Ok(Some(map)),
        Some(_) => Err(NormalizationError::malformed(name, "expected a JSON object")),
    }
}

fn column<'a>(
    daily: &'a Map<String, JsonValue>,
    key: &str,
) -> Result<&'a [JsonValue], NormalizationError> {
    match daily.get(key) {
        None | Some(JsonValue::Null) => Ok(&[]),
        Some(JsonValue::Array(values)) => Ok(values),
        Some(_) => Err(NormalizationError::malformed(
            format!("daily.{key}"),
            "expected an array",
        )),
    }
}

/// Open-Meteo daily data is column-oriented: `time[i]` pairs with `<metric>[i]`.
fn daily_rows(daily: &Map<String, JsonValue>) -> Result<Vec<ForecastDay>, NormalizationError> {
    let times = column(daily, "time")?;
    let max = column(daily, "temperature_2m_max")?;
    let min = column(daily, "temperature_2m_min")?;
    let mean = column(daily, "temperature_2m_mean")?;
    let precipitation = column(daily, "precipitation_sum")?;
    let wind = column(daily, "wind_speed_10m_mean")?;
    let pressure = column(daily, "pressure_msl_mean")?;
    let at = |values: &[JsonValue], idx: usize| {
        values.get(idx).map(Reading::from_json).unwrap_or_default()
    };

    let mut rows = Vec::with_capacity(times.len());
    for (idx, raw) in times.iter().enumerate() {
        let date = raw.as_str().and_then(parse_provider_date).ok_or_else(|| {
            NormalizationError::malformed(format!("daily.time[{idx}]"), format!("unparseable date {raw}"))
        })?;
        rows.push(ForecastDay {
            date,
            temperature_min: at(min, idx),
            temperature_avg: at(mean, idx),
            temperature_max: at(max, idx),
            precipitation: at(precipitation, idx),
            wind_speed_avg: at(wind, idx),
            pressure_avg: at(pressure, idx),
        });
    }
    Ok(rows)
}
