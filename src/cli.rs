use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "telemetry-weather-gateway",
    version,
    about = "ESP32 telemetry ingest with cached weather"
)]
pub struct Args {
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,
    #[arg(long, default_value_t = 5000)]
    pub port: u16,
}
