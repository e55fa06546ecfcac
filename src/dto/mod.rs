/// Game catalog bodies.
pub mod catalog;
/// Health check body.
pub mod health;
/// Session bodies.
pub mod session;
/// Statistics bodies.
pub mod stats;
/// Anonymous user bodies.
pub mod user;
/// Shared validation rules and messages.
pub mod validation;
