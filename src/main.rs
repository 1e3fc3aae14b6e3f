use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use telemetry_weather_gateway::aggregation::AggregationService;
use telemetry_weather_gateway::telemetry::TelemetryStore;
use telemetry_weather_gateway::weather::{WeatherCache, WeatherSource};
use telemetry_weather_gateway::{cli, config, routes, state};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

/// Binds the device-facing listener. The ESP32 firmware posts to a fixed
/// port, so a clash is reported with the flags that move either side.
async fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    match TcpListener::bind((host, port)).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => anyhow::bail!(
            "gateway port {port} on {host} is taken; free it or start with --port <other> and point the device firmware at the new port"
        ),
        Err(err) if err.kind() == std::io::ErrorKind::AddrNotAvailable => {
            Err(err).with_context(|| {
                format!("{host} is not an address of this machine; pass --host 0.0.0.0 to listen on every interface")
            })
        }
        Err(err) => Err(err).with_context(|| format!("failed to bind gateway on {host}:{port}")),
    }
}

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,telemetry_weather_gateway=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();
    let dotenv = dotenvy::dotenv();
    init_tracing()?;
    if let Ok(path) = dotenv {
        tracing::info!(path = %path.display(), "loaded environment file");
    }

    let config = config::GatewayConfig::from_env().context("invalid gateway configuration")?;
    let source = WeatherSource::from_config(&config)?;
    tracing::info!(
        provider = %config.weather_provider,
        location = %config.location_name,
        latitude = config.latitude,
        longitude = config.longitude,
        ttl_seconds = config.cache_ttl().num_seconds(),
        forecast_days = config.forecast_days,
        "weather source configured"
    );

    let cache = WeatherCache::new(
        source,
        config.location(),
        config.forecast_days,
        config.cache_ttl(),
    );
    let aggregation = AggregationService::new(Arc::new(TelemetryStore::new()), Arc::new(cache));
    let state = state::AppState::new(config, aggregation);

    let app = routes::router(state).layer(CorsLayer::permissive());
    let listener = bind_listener(&args.host, args.port).await?;
    tracing::info!(bind = %listener.local_addr()?, "gateway HTTP listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}
