use axum::extract::FromRef;
use std::sync::Arc;

use crate::aggregation::AggregationService;
use crate::config::GatewayConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub aggregation: Arc<AggregationService>,
}

impl AppState {
    pub fn new(config: GatewayConfig, aggregation: AggregationService) -> Self {
        Self {
            config: Arc::new(config),
            aggregation: Arc::new(aggregation),
        }
    }
}

impl FromRef<AppState> for Arc<AggregationService> {
    fn from_ref(state: &AppState) -> Arc<AggregationService> {
        state.aggregation.clone()
    }
}
