use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::reading::Reading;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenMeteo,
    Meteostat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenMeteo => "open_meteo",
            Self::Meteostat => "meteostat",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenMeteo => "https://api.open-meteo.com",
            Self::Meteostat => "https://meteostat.p.rapidapi.com",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "open_meteo" | "openmeteo" => Ok(Self::OpenMeteo),
            "meteostat" => Ok(Self::Meteostat),
            other => Err(format!("unsupported weather provider {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentWeather {
    pub temperature: Reading,
    pub feels_like: Reading,
    pub dew_point: Reading,
    pub humidity: Reading,
    pub cloud_cover: Reading,
    pub wind_speed: Reading,
    pub wind_direction: Reading,
    pub pressure: Reading,
    pub precipitation: Reading,
    pub condition_code: Reading,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub date: NaiveDate,
    pub temperature_min: Reading,
    pub temperature_avg: Reading,
    pub temperature_max: Reading,
    pub precipitation: Reading,
    pub wind_speed_avg: Reading,
    pub pressure_avg: Reading,
}

impl ForecastDay {
    /// Stand-in for a day the provider had nothing for.
    pub fn placeholder(date: NaiveDate) -> Self {
        Self {
            date,
            temperature_min: Reading::NO_DATA,
            temperature_avg: Reading::NO_DATA,
            temperature_max: Reading::NO_DATA,
            precipitation: Reading::NO_DATA,
            wind_speed_avg: Reading::NO_DATA,
            pressure_avg: Reading::NO_DATA,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        [
            self.temperature_min,
            self.temperature_avg,
            self.temperature_max,
            self.precipitation,
            self.wind_speed_avg,
            self.pressure_avg,
        ]
        .iter()
        .all(Reading::is_no_data)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSnapshot {
    pub provider: ProviderKind,
    pub location: Location,
    pub current: CurrentWeather,
    pub forecast: Vec<ForecastDay>,
    pub fetched_at: DateTime<Utc>,
}
