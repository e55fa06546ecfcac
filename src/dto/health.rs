use serde::Serialize;
use utoipa::ToSchema;

/// Whether the storage backend is currently usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A store is installed and answering.
    Ok,
    /// Running without a store.
    Degraded,
}

/// Payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current storage status.
    pub status: HealthStatus,
}
