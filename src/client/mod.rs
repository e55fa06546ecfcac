//! Client side of the anonymous session.
//!
//! [`lifecycle::AnonymousSession`] drives an [`identity::IdentityProvider`] (in production
//! [`firebase_auth::FirebaseAuthProvider`]) and mirrors the current identity's bearer token
//! into a [`credentials::CredentialStore`]. [`api::ApiClient`] talks to the HTTP routes.

/// HTTP client for the backend routes.
pub mod api;
/// Where the bearer token is mirrored.
pub mod credentials;
/// Client error types.
pub mod error;
/// Firebase Auth REST provider.
pub mod firebase_auth;
/// Identity provider seam.
pub mod identity;
/// Anonymous session state machine.
pub mod lifecycle;

pub use api::ApiClient;
pub use credentials::{CookieCredentials, CredentialStore, TOKEN_COOKIE};
pub use error::{AuthError, ClientError};
pub use firebase_auth::{FirebaseAuthConfig, FirebaseAuthProvider};
pub use identity::{AuthStateChange, Identity, IdentityProvider};
pub use lifecycle::{AnonymousSession, AuthEvent, AuthPhase, AuthSnapshot, AuthStateMachine};
