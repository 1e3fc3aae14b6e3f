pub mod cache;
pub mod error;
pub mod meteostat;
pub mod open_meteo;
pub mod provider;
pub mod types;

pub use cache::{CacheStatus, WeatherCache, WeatherLookup};
pub use error::{NormalizationError, ProviderError, WeatherError};
pub use provider::{
    NormalizeContext, RawProviderResponse, WeatherNormalizer, WeatherProviderClient, WeatherSource,
};
pub use types::{CurrentWeather, ForecastDay, Location, ProviderKind, WeatherSnapshot};
