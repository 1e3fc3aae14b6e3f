use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::weather::types::{Location, ProviderKind};

const DEFAULT_LATITUDE: f64 = 28.336485;
const DEFAULT_LONGITUDE: f64 = 79.402418;
const DEFAULT_LOCATION_NAME: &str = "Bareilly, Uttar Pradesh, India";
const MAX_FORECAST_DAYS: u32 = 14;

fn setup_config_path() -> Option<PathBuf> {
    env_optional_string("GATEWAY_SETUP_CONFIG_PATH").map(PathBuf::from)
}

/// Values a provisioning tool may drop next to the binary. They replace the
/// built-in defaults but never an explicitly set environment variable.
#[derive(Debug, Clone, Default, Deserialize)]
struct SetupConfigOverrides {
    #[serde(default)]
    weather_provider: Option<String>,
    #[serde(default)]
    weather_base_url: Option<String>,
    #[serde(default)]
    weather_api_key: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    location_name: Option<String>,
    #[serde(default)]
    cache_ttl_seconds: Option<u64>,
    #[serde(default)]
    forecast_days: Option<u32>,
}

fn load_setup_config_overrides(path: Option<PathBuf>) -> Option<SetupConfigOverrides> {
    let path = path?;
    if !path.exists() {
        tracing::warn!(path = %path.display(), "setup config not found; using env defaults");
        return None;
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to read setup config; using env defaults"
            );
            return None;
        }
    };
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "failed to parse setup config; using env defaults"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub weather_provider: ProviderKind,
    pub weather_base_url: String,
    pub weather_api_key: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub location_name: String,
    pub cache_ttl_seconds: u64,
    pub cache_enabled: bool,
    pub forecast_days: u32,
    pub weather_timeout_seconds: u64,
    pub validate_telemetry: bool,
    pub min_voltage: f64,
    pub max_voltage: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let overrides = load_setup_config_overrides(setup_config_path()).unwrap_or_default();
        let config = Self::resolve(&overrides)?;
        config.validate()?;
        Ok(config)
    }

    fn resolve(overrides: &SetupConfigOverrides) -> Result<Self> {
        let provider_raw = env_optional_string("GATEWAY_WEATHER_PROVIDER")
            .or_else(|| trimmed(overrides.weather_provider.as_deref()))
            .unwrap_or_else(|| ProviderKind::OpenMeteo.as_str().to_string());
        let weather_provider = ProviderKind::from_str(&provider_raw)
            .map_err(anyhow::Error::msg)
            .context("GATEWAY_WEATHER_PROVIDER must be open_meteo or meteostat")?;

        let weather_base_url = env_optional_string("GATEWAY_WEATHER_BASE_URL")
            .or_else(|| trimmed(overrides.weather_base_url.as_deref()))
            .unwrap_or_else(|| weather_provider.default_base_url().to_string());
        let weather_api_key = env_optional_string("GATEWAY_WEATHER_API_KEY")
            .or_else(|| trimmed(overrides.weather_api_key.as_deref()));

        let latitude = env_f64("GATEWAY_LATITUDE")?
            .or(overrides.latitude)
            .unwrap_or(DEFAULT_LATITUDE);
        let longitude = env_f64("GATEWAY_LONGITUDE")?
            .or(overrides.longitude)
            .unwrap_or(DEFAULT_LONGITUDE);
        let location_name = env_optional_string("GATEWAY_LOCATION_NAME")
            .or_else(|| trimmed(overrides.location_name.as_deref()))
            .unwrap_or_else(|| DEFAULT_LOCATION_NAME.to_string());

        let cache_ttl_seconds = env_number::<u64>("GATEWAY_WEATHER_CACHE_TTL_SECONDS")?
            .or(overrides.cache_ttl_seconds)
            .unwrap_or(3600);
        let forecast_days = env_number::<u32>("GATEWAY_FORECAST_DAYS")?
            .or(overrides.forecast_days)
            .unwrap_or(5)
            .clamp(1, MAX_FORECAST_DAYS);

        Ok(Self {
            weather_provider,
            weather_base_url,
            weather_api_key,
            latitude,
            longitude,
            location_name,
            cache_ttl_seconds,
            cache_enabled: env_bool("GATEWAY_WEATHER_CACHE_ENABLED", true),
            forecast_days,
            weather_timeout_seconds: env_number::<u64>("GATEWAY_WEATHER_TIMEOUT_SECONDS")?
                .unwrap_or(15)
                .max(1),
            validate_telemetry: env_bool("GATEWAY_VALIDATE_TELEMETRY", true),
            min_voltage: env_f64("GATEWAY_MIN_VOLTAGE")?.unwrap_or(0.0),
            max_voltage: env_f64("GATEWAY_MAX_VOLTAGE")?.unwrap_or(250.0),
            min_temperature: env_f64("GATEWAY_MIN_TEMPERATURE")?.unwrap_or(-40.0),
            max_temperature: env_f64("GATEWAY_MAX_TEMPERATURE")?.unwrap_or(100.0),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            anyhow::bail!("GATEWAY_LATITUDE {} is outside -90..=90", self.latitude);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            anyhow::bail!("GATEWAY_LONGITUDE {} is outside -180..=180", self.longitude);
        }
        let parsed = url::Url::parse(&self.weather_base_url).with_context(|| {
            format!(
                "GATEWAY_WEATHER_BASE_URL {:?} is not a valid URL",
                self.weather_base_url
            )
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!(
                "GATEWAY_WEATHER_BASE_URL must use http or https (got {})",
                parsed.scheme()
            );
        }
        if self.weather_provider == ProviderKind::Meteostat && self.weather_api_key.is_none() {
            anyhow::bail!("GATEWAY_WEATHER_API_KEY must be set when the provider is meteostat");
        }
        if self.min_voltage > self.max_voltage {
            anyhow::bail!("GATEWAY_MIN_VOLTAGE must not exceed GATEWAY_MAX_VOLTAGE");
        }
        if self.min_temperature > self.max_temperature {
            anyhow::bail!("GATEWAY_MIN_TEMPERATURE must not exceed GATEWAY_MAX_TEMPERATURE");
        }
        Ok(())
    }

    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            name: self.location_name.clone(),
        }
    }

    /// Disabling the cache is a zero TTL: every read goes upstream.
    pub fn cache_ttl(&self) -> chrono::Duration {
        if !self.cache_enabled {
            return chrono::Duration::zero();
        }
        let seconds = i64::try_from(self.cache_ttl_seconds).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(seconds).unwrap_or(chrono::Duration::MAX)
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn env_optional_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key)
        .ok()
        .map(|value| value.trim().to_lowercase())
    {
        Some(value) if value == "1" || value == "true" || value == "yes" => true,
        Some(value) if value == "0" || value == "false" || value == "no" => false,
        _ => default,
    }
}

/// Set but unparseable numbers fail startup instead of falling back to defaults.
fn env_number<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    env_optional_string(key)
        .map(|raw| parse_number(key, &raw))
        .transpose()
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a number (got {raw:?})"))
}

fn env_f64(key: &str) -> Result<Option<f64>> {
    let value = env_number::<f64>(key)?;
    if let Some(value) = value.filter(|value| !value.is_finite()) {
        anyhow::bail!("{key} must be finite (got {value})");
    }
    Ok(value)
}
