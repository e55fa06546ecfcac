//! Error types shared by the Firestore storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

/// Convenient result alias returning [`FirestoreError`] failures.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Failures that can occur while configuring or talking to Firestore.
#[derive(Debug, Error)]
pub enum FirestoreError {
    /// Required environment variable is missing.
    #[error("{var} env variable is not set")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Service account material is not valid base64.
    #[error("failed to decode service account: invalid base64")]
    ServiceAccountEncoding {
        /// Base64 failure.
        #[source]
        source: base64::DecodeError,
    },
    /// Service account material is not the expected JSON document.
    #[error("failed to parse service account ({length} bytes)")]
    ServiceAccountJson {
        /// Decoded length, for diagnostics without leaking the key.
        length: usize,
        /// JSON failure.
        #[source]
        source: serde_json::Error,
    },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build Firestore HTTP client")]
    ClientBuilder {
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The service account private key could not be used for signing.
    #[error("failed to sign access token request")]
    Signing {
        /// Signing failure.
        #[source]
        source: jsonwebtoken::errors::Error,
    },
    /// The OAuth token endpoint could not be reached or answered garbage.
    #[error("failed to obtain an access token")]
    TokenRequest {
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The OAuth token endpoint rejected the assertion.
    #[error("access token request rejected with status {status}")]
    TokenStatus {
        /// Status answered by the token endpoint.
        status: StatusCode,
    },
    /// A request to a document endpoint could not be sent.
    #[error("failed to send Firestore request to `{path}`")]
    RequestSend {
        /// Request path below the documents root.
        path: String,
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// Firestore returned an unexpected status code.
    #[error("unexpected Firestore response status {status} for `{path}`")]
    RequestStatus {
        /// Request path below the documents root.
        path: String,
        /// Status answered by Firestore.
        status: StatusCode,
    },
    /// Response payload could not be parsed into JSON.
    #[error("failed to decode Firestore response for `{path}`")]
    DecodeResponse {
        /// Request path below the documents root.
        path: String,
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The configured endpoint cannot carry document paths.
    #[error("invalid Firestore endpoint `{url}`")]
    InvalidEndpoint {
        /// Offending documents root URL.
        url: String,
    },
    /// Response JSON lacked a required element.
    #[error("malformed Firestore response for `{path}`: {reason}")]
    MalformedResponse {
        /// Request path below the documents root.
        path: String,
        /// What was missing.
        reason: &'static str,
    },
}
