pub mod aggregation;
pub mod cli;
pub mod config;
pub mod error;
pub mod reading;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod weather;

#[cfg(test)]
pub mod test_support;
