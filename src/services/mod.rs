/// Game catalog lookups and seeding.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Game session lifecycle.
pub mod session_service;
/// Global and per-game statistics.
pub mod stats_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
/// Anonymous user provisioning.
pub mod user_service;
