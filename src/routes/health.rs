use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::sync::Arc;

use crate::aggregation::AggregationService;
use crate::state::AppState;
use crate::weather::cache::CacheStatus;

const BANNER: &str = "ESP32 telemetry + weather gateway

GET  /healthz        service and weather cache status
POST /esp32-data     push a device sample
GET  /api/telemetry  latest device sample
GET  /weather        cached weather for the configured location
GET  /combined-data  latest sample joined with weather
";

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub weather_cache: CacheStatus,
}

pub(crate) async fn index_handler() -> &'static str {
    BANNER
}

pub(crate) async fn healthz_handler(
    State(aggregation): State<Arc<AggregationService>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        weather_cache: aggregation.cache_status(Utc::now()),
    })
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
}
