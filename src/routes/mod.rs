pub mod health;
pub mod telemetry;
pub mod weather;

use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(telemetry::router())
        .merge(weather::router())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{open_meteo_body, test_state, FakeProvider};
    use crate::weather::error::ProviderError;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value as JsonValue};
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, JsonValue) {
        let (status, bytes) = send(
            app,
            Request::builder().uri(uri).body(Body::empty()).unwrap(),
        )
        .await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post(app: &Router, body: &str) -> (StatusCode, JsonValue) {
        let (status, bytes) = send(
            app,
            Request::builder()
                .method("POST")
                .uri("/esp32-data")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let app = router(test_state(&FakeProvider::new()));
        let (status, bytes) = send(
            &app,
            Request::builder().uri("/").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("/esp32-data"));
        assert!(text.contains("/combined-data"));
    }

    #[tokio::test]
    async fn telemetry_is_no_data_before_first_push() {
        let app = router(test_state(&FakeProvider::new()));
        let (status, body) = get_json(&app, "/api/telemetry").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "no_data" }));
    }

    #[tokio::test]
    async fn ingest_then_combined_returns_the_sample() {
        let provider = FakeProvider::new();
        provider.push_ok(open_meteo_body(27.0));
        let app = router(test_state(&provider));

        let (status, body) = post(&app, r#"{"BoxTemperature": 36.5, "Voltage": 230.1, "Extra": 1}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "success", "message": "Data received" }));

        let (status, body) = get_json(&app, "/combined-data").await;
        assert_eq!(status, StatusCode::OK);
        let readings = &body["esp32_data"]["readings"];
        assert_eq!(body["esp32_data"]["status"], "ok");
        assert_eq!(readings["box_temperature"], 36.5);
        assert_eq!(readings["voltage"], 230.1);
        assert!(readings["current"].is_null());
        assert!(readings["solar_power"].is_null());
        assert_eq!(body["weather_data"]["status"], "ok");
        assert_eq!(body["weather_data"]["current"]["temperature"], 27.0);
        assert_eq!(body["weather_data"]["forecast"].as_array().unwrap().len(), 5);
        assert!(body["timestamp"].is_string());
        // Background warm-up and the combined read share one upstream fetch.
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn ingest_rejects_non_objects_and_bad_json() {
        let app = router(test_state(&FakeProvider::new()));
        for body in ["[1, 2, 3]", "42", "{not json"] {
            let (status, body) = post(&app, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["status"], "error");
        }
        let (_, body) = get_json(&app, "/api/telemetry").await;
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn ingest_rejects_out_of_range_values() {
        let app = router(test_state(&FakeProvider::new()));
        let (status, body) = post(&app, r#"{"Voltage": 400}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("Voltage"));

        let (status, _) = post(&app, r#"{"BoxTemperature": 150}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = get_json(&app, "/api/telemetry").await;
        assert_eq!(body["status"], "no_data");
    }

    #[tokio::test]
    async fn weather_failure_is_a_structured_502() {
        let provider = FakeProvider::new();
        provider.push_err(ProviderError::HttpStatus {
            status: 500,
            body: "Traceback (most recent call last)".into(),
        });
        let app = router(test_state(&provider));

        let (status, body) = get_json(&app, "/weather").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "http_status");
        assert!(!body.to_string().contains("Traceback"));
    }

    #[tokio::test]
    async fn weather_is_served_from_cache() {
        let provider = FakeProvider::new();
        provider.push_ok(open_meteo_body(18.5));
        let app = router(test_state(&provider));

        for _ in 0..3 {
            let (status, body) = get_json(&app, "/weather").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["stale"], false);
            assert_eq!(body["current"]["temperature"], 18.5);
            assert_eq!(body["location"]["name"], "Bareilly, Uttar Pradesh, India");
        }
        assert_eq!(provider.calls(), 1);

        let (status, body) = get_json(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["weather_cache"]["hits"], 2);
        assert_eq!(body["weather_cache"]["fresh"], true);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn healthz_answers_while_weather_refresh_runs() {
        let provider = FakeProvider::with_delay(std::time::Duration::from_millis(1500));
        provider.push_ok(open_meteo_body(21.0));
        let app = router(test_state(&provider));

        let weather = {
            let app = app.clone();
            tokio::spawn(async move { get_json(&app, "/weather").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(provider.calls(), 1);

        let started = std::time::Instant::now();
        let (status, body) = get_json(&app, "/healthz").await;
        assert!(started.elapsed() < std::time::Duration::from_millis(500));
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["weather_cache"]["refreshes"], 0);

        let (status, _) = weather.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }
}
