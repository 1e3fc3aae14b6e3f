use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde_json::Value as JsonValue;

use crate::config::GatewayConfig;
use crate::error::{AppError, AppResult};
use crate::reading::Reading;
use crate::state::AppState;
use crate::telemetry::{TelemetrySample, TelemetryState};

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub message: &'static str,
}

/// Range checks from the gateway config. Readings the device did not send
/// are not checked.
fn validate_sample(config: &GatewayConfig, sample: &TelemetrySample) -> AppResult<()> {
    if !config.validate_telemetry {
        return Ok(());
    }
    check_range(
        "Voltage",
        sample.voltage,
        config.min_voltage,
        config.max_voltage,
    )?;
    check_range(
        "BoxTemperature",
        sample.box_temperature,
        config.min_temperature,
        config.max_temperature,
    )
}

fn check_range(field: &str, reading: Reading, min: f64, max: f64) -> AppResult<()> {
    match reading.value() {
        Some(value) if value < min || value > max => Err(AppError::bad_request(format!(
            "{field} {value} is outside the accepted range {min}..={max}"
        ))),
        _ => Ok(()),
    }
}

pub(crate) async fn ingest_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<IngestResponse>> {
    let payload: JsonValue = serde_json::from_slice(&body)
        .map_err(|err| AppError::bad_request(format!("Invalid JSON body: {err}")))?;
    let Some(object) = payload.as_object() else {
        return Err(AppError::bad_request("Request body must be a JSON object"));
    };

    let sample = TelemetrySample::from_device_payload(object);
    if let Err(err) = validate_sample(&state.config, &sample) {
        tracing::warn!(reason = %err.message, "rejected telemetry sample");
        return Err(err);
    }

    let now = Utc::now();
    state.aggregation.ingest(sample, now);

    let aggregation = state.aggregation.clone();
    tokio::spawn(async move {
        aggregation.warm_weather(now).await;
    });

    Ok(Json(IngestResponse {
        status: "success",
        message: "Data received",
    }))
}

pub(crate) async fn latest_handler(State(state): State<AppState>) -> Json<TelemetryState> {
    Json(state.aggregation.telemetry())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/esp32-data", post(ingest_handler))
        .route("/api/telemetry", get(latest_handler))
}
