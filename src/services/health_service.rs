use tracing::warn;

use crate::{
    dto::health::{HealthResponse, HealthStatus},
    state::SharedState,
};

/// Report whether storage is usable, pinging it when installed.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.require_store().await {
        Ok(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "storage health check failed");
            }
        }
        Err(_) => warn!("storage unavailable (degraded mode)"),
    }

    let status = if state.is_degraded() {
        HealthStatus::Degraded
    } else {
        HealthStatus::Ok
    };
    HealthResponse { status }
}
