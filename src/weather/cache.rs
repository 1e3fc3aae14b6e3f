use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::Mutex;

use super::error::WeatherError;
use super::provider::{NormalizeContext, WeatherSource};
use super::types::{Location, WeatherSnapshot};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: Arc<WeatherSnapshot>,
    pub captured_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.captured_at) < ttl
    }
}

/// What `WeatherCache::get` hands back. `refresh_error` is set when the
/// snapshot is a stale entry served because a refresh just failed.
#[derive(Debug, Clone)]
pub struct WeatherLookup {
    pub snapshot: Arc<WeatherSnapshot>,
    pub captured_at: DateTime<Utc>,
    pub refresh_error: Option<WeatherError>,
}

impl WeatherLookup {
    fn fresh(entry: CacheEntry) -> Self {
        Self {
            snapshot: entry.snapshot,
            captured_at: entry.captured_at,
            refresh_error: None,
        }
    }

    pub fn is_stale(&self) -> bool {
        self.refresh_error.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub provider: String,
    pub ttl_seconds: i64,
    pub captured_at: Option<DateTime<Utc>>,
    pub age_seconds: Option<i64>,
    pub fresh: bool,
    pub hits: u64,
    pub refreshes: u64,
    pub failures: u64,
    pub last_error: Option<String>,
}

/// TTL cache in front of the configured weather provider for the single
/// configured location.
///
/// At most one upstream refresh runs at a time. Callers that queued behind a
/// refresh re-check the entry once they get the lock; if that refresh failed
/// they reuse its error instead of hitting the provider again. A failed
/// refresh never replaces an existing entry.
pub struct WeatherCache {
    source: WeatherSource,
    location: Location,
    horizon_days: u32,
    ttl: chrono::Duration,
    entry: RwLock<Option<CacheEntry>>,
    last_failure: RwLock<Option<WeatherError>>,
    refresh: Mutex<()>,
    completed_refreshes: AtomicU64,
    hits: AtomicU64,
    failures: AtomicU64,
}

impl WeatherCache {
    pub fn new(
        source: WeatherSource,
        location: Location,
        horizon_days: u32,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            source,
            location,
            horizon_days,
            ttl,
            entry: RwLock::new(None),
            last_failure: RwLock::new(None),
            refresh: Mutex::new(()),
            completed_refreshes: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, now: DateTime<Utc>) -> Result<WeatherLookup, WeatherError> {
        if let Some(entry) = self.fresh_entry(now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(captured_at = %entry.captured_at, "using cached weather data");
            return Ok(WeatherLookup::fresh(entry));
        }

        let observed = self.completed_refreshes.load(Ordering::Acquire);
        let _refresh = self.refresh.lock().await;

        if let Some(entry) = self.fresh_entry(now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(WeatherLookup::fresh(entry));
        }
        if self.completed_refreshes.load(Ordering::Acquire) != observed {
            if let Some(err) = self.last_failure() {
                tracing::debug!(error = %err, "reusing result of concurrent weather refresh");
                return self.fallback(err);
            }
        }

        let outcome = self.refresh_entry(now).await;
        self.completed_refreshes.fetch_add(1, Ordering::Release);
        match outcome {
            Ok(entry) => {
                self.set_last_failure(None);
                Ok(WeatherLookup::fresh(entry))
            }
            Err(err) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                self.set_last_failure(Some(err.clone()));
                self.fallback(err)
            }
        }
    }

    /// Never waits on an in-flight refresh.
    pub fn status(&self, now: DateTime<Utc>) -> CacheStatus {
        let entry = self.current_entry();
        let last_error = self.last_failure().as_ref().map(ToString::to_string);
        let failures = self.failures.load(Ordering::Relaxed);
        CacheStatus {
            provider: self.source.provider().to_string(),
            ttl_seconds: self.ttl.num_seconds(),
            captured_at: entry.as_ref().map(|entry| entry.captured_at),
            age_seconds: entry
                .as_ref()
                .map(|entry| now.signed_duration_since(entry.captured_at).num_seconds()),
            fresh: entry
                .as_ref()
                .is_some_and(|entry| entry.is_fresh(now, self.ttl)),
            hits: self.hits.load(Ordering::Relaxed),
            refreshes: self
                .completed_refreshes
                .load(Ordering::Acquire)
                .saturating_sub(failures),
            failures,
            last_error,
        }
    }

    fn current_entry(&self) -> Option<CacheEntry> {
        self.entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn last_failure(&self) -> Option<WeatherError> {
        self.last_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_last_failure(&self, failure: Option<WeatherError>) {
        *self
            .last_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = failure;
    }

    fn fresh_entry(&self, now: DateTime<Utc>) -> Option<CacheEntry> {
        self.current_entry()
            .filter(|entry| entry.is_fresh(now, self.ttl))
    }

    async fn refresh_entry(&self, now: DateTime<Utc>) -> Result<CacheEntry, WeatherError> {
        let provider = self.source.provider();
        tracing::info!(%provider, location = %self.location.name, "fetching fresh weather data");

        let raw = self
            .source
            .client
            .fetch(&self.location, self.horizon_days, now)
            .await?;
        let ctx = NormalizeContext {
            location: self.location.clone(),
            horizon_days: self.horizon_days,
            fetched_at: now,
        };
        let snapshot = self.source.normalizer.normalize(&raw, &ctx)?;
        let entry = CacheEntry {
            snapshot: Arc::new(snapshot),
            captured_at: now,
        };
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = Some(entry.clone());

        tracing::info!(
            %provider,
            temperature = %entry.snapshot.current.temperature,
            humidity = %entry.snapshot.current.humidity,
            forecast_days = entry.snapshot.forecast.len(),
            "weather cache refreshed"
        );
        Ok(entry)
    }

    /// Stale data beats no data: keep serving the old entry when one exists.
    fn fallback(&self, err: WeatherError) -> Result<WeatherLookup, WeatherError> {
        match self.current_entry() {
            Some(entry) => {
                tracing::warn!(
                    error = %err,
                    captured_at = %entry.captured_at,
                    "weather refresh failed; serving stale data"
                );
                Ok(WeatherLookup {
                    snapshot: entry.snapshot,
                    captured_at: entry.captured_at,
                    refresh_error: Some(err),
                })
            }
            None => {
                tracing::warn!(error = %err, "weather refresh failed with nothing cached");
                Err(err)
            }
        }
    }
}
