use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use std::sync::Arc;

use crate::aggregation::{AggregationService, CombinedView, WeatherView};
use crate::state::AppState;

/// 502 when nothing could be served; a stale snapshot is still a 200.
pub(crate) async fn weather_handler(
    State(aggregation): State<Arc<AggregationService>>,
) -> (StatusCode, Json<WeatherView>) {
    let view = WeatherView::from(aggregation.weather(Utc::now()).await);
    let status = if view.is_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::OK
    };
    (status, Json(view))
}

pub(crate) async fn combined_handler(
    State(aggregation): State<Arc<AggregationService>>,
) -> Json<CombinedView> {
    Json(aggregation.combined(Utc::now()).await)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/weather", get(weather_handler))
        .route("/combined-data", get(combined_handler))
}
