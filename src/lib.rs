//! Library crate for fun-vault-back, exposing modules for binaries and tests.

pub mod client;
pub mod config;
/// Persistence: document model, stores and typed repository.
pub mod dao;
/// Request and response bodies of the HTTP API.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// HTTP handlers grouped by resource.
pub mod routes;
/// Business operations behind the routes.
pub mod services;
/// Shared application state.
pub mod state;
