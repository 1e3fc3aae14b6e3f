use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value as JsonValue};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::aggregation::AggregationService;
use crate::config::GatewayConfig;
use crate::state::AppState;
use crate::telemetry::TelemetryStore;
use crate::weather::cache::WeatherCache;
use crate::weather::error::ProviderError;
use crate::weather::open_meteo::OpenMeteoNormalizer;
use crate::weather::provider::{RawProviderResponse, WeatherProviderClient, WeatherSource};
use crate::weather::types::{Location, ProviderKind};

/// 2025-03-01T00:00:00Z plus `seconds`.
pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
}

pub fn test_location() -> Location {
    Location {
        latitude: 28.336485,
        longitude: 79.402418,
        name: "Bareilly, Uttar Pradesh, India".to_string(),
    }
}

/// Minimal Open-Meteo payload with the given current temperature.
pub fn open_meteo_body(temperature: f64) -> JsonValue {
    json!({
        "current": {
            "temperature_2m": temperature,
            "relative_humidity_2m": 40,
            "wind_speed_10m": 7.5
        },
        "daily": {
            "time": ["2025-03-01", "2025-03-02", "2025-03-03"],
            "temperature_2m_max": [30.0, 31.0, 29.0],
            "temperature_2m_min": [15.0, 16.0, 14.0]
        }
    })
}

#[derive(Default)]
struct FakeState {
    responses: Mutex<VecDeque<Result<JsonValue, ProviderError>>>,
    calls: AtomicUsize,
}

/// Scripted Open-Meteo stand-in. Each fetch pops the next response; an empty
/// script answers with a network error.
#[derive(Clone, Default)]
pub struct FakeProvider {
    state: Arc<FakeState>,
    delay: Option<Duration>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn push_ok(&self, body: JsonValue) {
        self.state.responses.lock().unwrap().push_back(Ok(body));
    }

    pub fn push_err(&self, err: ProviderError) {
        self.state.responses.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn source(&self) -> WeatherSource {
        WeatherSource::new(Arc::new(self.clone()), Arc::new(OpenMeteoNormalizer))
    }
}

#[async_trait]
impl WeatherProviderClient for FakeProvider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenMeteo
    }

    async fn fetch(
        &self,
        _location: &Location,
        _horizon_days: u32,
        _now: DateTime<Utc>,
    ) -> Result<RawProviderResponse, ProviderError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.state.responses.lock().unwrap().pop_front();
        let body = next.unwrap_or_else(|| Err(ProviderError::Network("no scripted response".into())))?;
        Ok(RawProviderResponse { body })
    }
}

pub fn test_config() -> GatewayConfig {
    GatewayConfig {
        weather_provider: ProviderKind::OpenMeteo,
        weather_base_url: ProviderKind::OpenMeteo.default_base_url().to_string(),
        weather_api_key: None,
        latitude: 28.336485,
        longitude: 79.402418,
        location_name: "Bareilly, Uttar Pradesh, India".to_string(),
        cache_ttl_seconds: 3600,
        cache_enabled: true,
        forecast_days: 5,
        weather_timeout_seconds: 15,
        validate_telemetry: true,
        min_voltage: 0.0,
        max_voltage: 250.0,
        min_temperature: -40.0,
        max_temperature: 100.0,
    }
}

pub fn test_state(provider: &FakeProvider) -> AppState {
    let config = test_config();
    let cache = WeatherCache::new(
        provider.source(),
        config.location(),
        config.forecast_days,
        config.cache_ttl(),
    );
    let aggregation = AggregationService::new(Arc::new(TelemetryStore::new()), Arc::new(cache));
    AppState::new(config, aggregation)
}
