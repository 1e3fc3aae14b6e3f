use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::telemetry::{TelemetrySample, TelemetryState, TelemetryStore};
use crate::weather::cache::{CacheStatus, WeatherCache, WeatherLookup};
use crate::weather::error::WeatherError;
use crate::weather::types::WeatherSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherFailure {
    pub error: &'static str,
    pub message: String,
}

impl From<&WeatherError> for WeatherFailure {
    fn from(err: &WeatherError) -> Self {
        Self {
            error: err.kind(),
            message: err.user_message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    #[serde(flatten)]
    pub snapshot: Arc<WeatherSnapshot>,
    pub captured_at: DateTime<Utc>,
    pub stale: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_error: Option<WeatherFailure>,
}

/// Weather leg as exposed to API clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherView {
    Ok(WeatherReport),
    Error(WeatherFailure),
}

impl WeatherView {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl From<Result<WeatherLookup, WeatherError>> for WeatherView {
    fn from(result: Result<WeatherLookup, WeatherError>) -> Self {
        match result {
            Ok(lookup) => Self::Ok(WeatherReport {
                stale: lookup.is_stale(),
                refresh_error: lookup.refresh_error.as_ref().map(WeatherFailure::from),
                snapshot: lookup.snapshot,
                captured_at: lookup.captured_at,
            }),
            Err(err) => Self::Error(WeatherFailure::from(&err)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedView {
    #[serde(rename = "esp32_data")]
    pub telemetry: TelemetryState,
    #[serde(rename = "weather_data")]
    pub weather: WeatherView,
    #[serde(rename = "timestamp")]
    pub composed_at: DateTime<Utc>,
}

/// Joins the latest device sample with the cached weather. The two legs are
/// independent; a weather failure never hides telemetry.
pub struct AggregationService {
    telemetry: Arc<TelemetryStore>,
    weather: Arc<WeatherCache>,
}

impl AggregationService {
    pub fn new(telemetry: Arc<TelemetryStore>, weather: Arc<WeatherCache>) -> Self {
        Self { telemetry, weather }
    }

    pub fn ingest(&self, sample: TelemetrySample, now: DateTime<Utc>) {
        let populated = sample.populated_count();
        self.telemetry.write(sample, now);
        tracing::info!(populated, received_at = %now, "stored telemetry sample");
    }

    pub fn telemetry(&self) -> TelemetryState {
        self.telemetry.read()
    }

    pub async fn weather(&self, now: DateTime<Utc>) -> Result<WeatherLookup, WeatherError> {
        self.weather.get(now).await
    }

    pub async fn combined(&self, now: DateTime<Utc>) -> CombinedView {
        let telemetry = self.telemetry.read();
        let weather = WeatherView::from(self.weather.get(now).await);
        CombinedView {
            telemetry,
            weather,
            composed_at: now,
        }
    }

    /// Refreshes the cache if needed after a device push. Only logs the outcome.
    pub async fn warm_weather(&self, now: DateTime<Utc>) {
        match self.weather.get(now).await {
            Ok(lookup) if lookup.is_stale() => {
                tracing::debug!(captured_at = %lookup.captured_at, "weather warm-up left stale data in place");
            }
            Ok(lookup) => {
                tracing::debug!(captured_at = %lookup.captured_at, "weather warm-up complete");
            }
            Err(err) if err.is_retryable() => {
                tracing::warn!(error = %err, "weather warm-up failed; next request retries");
            }
            Err(err) => {
                tracing::error!(error = %err, kind = err.kind(), "weather warm-up failed");
            }
        }
    }

    pub fn cache_status(&self, now: DateTime<Utc>) -> CacheStatus {
        self.weather.status(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::Reading;
    use crate::test_support::{at, open_meteo_body, test_location, FakeProvider};
    use crate::weather::error::ProviderError;
    use serde_json::json;

    fn service(provider: &FakeProvider) -> AggregationService {
        let cache = WeatherCache::new(
            provider.source(),
            test_location(),
            5,
            chrono::Duration::seconds(3600),
        );
        AggregationService::new(Arc::new(TelemetryStore::new()), Arc::new(cache))
    }

    fn sample(box_temperature: f64, voltage: f64) -> TelemetrySample {
        TelemetrySample {
            box_temperature: Reading::new(box_temperature),
            voltage: Reading::new(voltage),
            ..TelemetrySample::default()
        }
    }

    #[tokio::test]
    async fn combined_joins_both_legs() {
        let provider = FakeProvider::new();
        provider.push_ok(open_meteo_body(27.0));
        let service = service(&provider);
        service.ingest(sample(36.5, 230.1), at(10));

        let view = service.combined(at(20)).await;
        let record = view.telemetry.record().expect("telemetry present");
        assert_eq!(record.readings.box_temperature.value(), Some(36.5));
        assert_eq!(record.received_at, at(10));
        match &view.weather {
            WeatherView::Ok(report) => {
                assert!(!report.stale);
                assert_eq!(report.snapshot.current.temperature.value(), Some(27.0));
            }
            WeatherView::Error(failure) => panic!("unexpected failure {failure:?}"),
        }
        assert_eq!(view.composed_at, at(20));
    }

    #[tokio::test]
    async fn weather_failure_keeps_telemetry() {
        let provider = FakeProvider::new();
        provider.push_err(ProviderError::Network("down".into()));
        let service = service(&provider);
        service.ingest(sample(30.0, 220.0), at(0));

        let view = service.combined(at(5)).await;
        assert!(view.telemetry.record().is_some());
        assert_eq!(
            view.weather,
            WeatherView::Error(WeatherFailure {
                error: "network",
                message: "Weather provider is unreachable. Try again shortly.".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn combined_with_empty_store_reports_no_data() {
        let provider = FakeProvider::new();
        provider.push_ok(open_meteo_body(27.0));
        let service = service(&provider);

        let view = service.combined(at(0)).await;
        let body = serde_json::to_value(&view).unwrap();
        assert_eq!(body["esp32_data"], json!({ "status": "no_data" }));
        assert_eq!(body["weather_data"]["status"], "ok");
        assert_eq!(body["weather_data"]["stale"], false);
        assert_eq!(body["weather_data"]["provider"], "open_meteo");
        assert_eq!(body["weather_data"]["current"]["temperature"], 27.0);
        assert!(body["weather_data"].get("refresh_error").is_none());
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn stale_weather_carries_refresh_error() {
        let provider = FakeProvider::new();
        provider.push_ok(open_meteo_body(27.0));
        provider.push_err(ProviderError::HttpStatus {
            status: 502,
            body: "<html>bad gateway</html>".into(),
        });
        let service = service(&provider);

        service.weather(at(0)).await.unwrap();
        let view = service.combined(at(7200)).await;
        let body = serde_json::to_value(&view.weather).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["stale"], true);
        assert_eq!(body["refresh_error"]["error"], "http_status");
        assert!(!body.to_string().contains("bad gateway"));
    }

    #[tokio::test]
    async fn warm_weather_populates_the_cache() {
        let provider = FakeProvider::new();
        provider.push_ok(open_meteo_body(21.0));
        let service = service(&provider);

        service.warm_weather(at(0)).await;
        let lookup = service.weather(at(60)).await.unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(lookup.snapshot.current.temperature.value(), Some(21.0));

        let status = service.cache_status(at(60));
        assert_eq!(status.hits, 1);
    }

    #[tokio::test]
    async fn warm_weather_failures_leave_cache_empty() {
        let provider = FakeProvider::new();
        provider.push_err(ProviderError::Network("connection reset".into()));
        provider.push_err(ProviderError::HttpStatus {
            status: 404,
            body: "unknown location".into(),
        });
        let service = service(&provider);

        service.warm_weather(at(0)).await;
        service.warm_weather(at(10)).await;

        let status = service.cache_status(at(20));
        assert_eq!(provider.calls(), 2);
        assert!(status.captured_at.is_none());
        assert_eq!(status.failures, 2);
        assert!(status.last_error.unwrap().contains("404"));
    }
}
