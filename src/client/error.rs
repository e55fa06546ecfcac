use reqwest::StatusCode;
use thiserror::Error;

/// Failures raised by the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Configuration expected from the environment is absent.
    #[error("missing required environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Building the HTTP client failed.
    #[error("failed to build identity HTTP client")]
    ClientBuilder {
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The identity service could not be reached.
    #[error("identity request to {endpoint} failed")]
    Request {
        /// Endpoint that was called.
        endpoint: &'static str,
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The identity service answered with an error.
    #[error("identity provider rejected {endpoint} ({status}): {message}")]
    Rejected {
        /// Endpoint that was called.
        endpoint: &'static str,
        /// Status of the answer.
        status: StatusCode,
        /// Error message reported by the service.
        message: String,
    },
    /// The answer was not the expected JSON.
    #[error("failed to decode {endpoint} response")]
    Decode {
        /// Endpoint that was called.
        endpoint: &'static str,
        /// Decoding failure.
        #[source]
        source: reqwest::Error,
    },
    /// `expiresIn` is not a number of seconds.
    #[error("invalid token lifetime `{value}`")]
    InvalidExpiry {
        /// Raw value from the answer.
        value: String,
    },
    /// A token was requested while nobody is signed in.
    #[error("no signed-in identity")]
    NotSignedIn,
}

/// Failures raised by [`crate::client::api::ApiClient`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The configured base URL does not parse or cannot carry paths.
    #[error("invalid base URL `{url}`: {reason}")]
    InvalidBaseUrl {
        /// Offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },
    /// Building the HTTP client failed.
    #[error("failed to build API HTTP client")]
    ClientBuilder {
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// The backend could not be reached.
    #[error("request to {path} failed")]
    Request {
        /// Route that was called.
        path: String,
        /// HTTP client failure.
        #[source]
        source: reqwest::Error,
    },
    /// Non-2xx answer; `message` is the server's `error` field when present.
    #[error("{path} answered {status}: {message}")]
    Status {
        /// Route that was called.
        path: String,
        /// Status of the answer.
        status: StatusCode,
        /// Error message reported by the backend.
        message: String,
    },
    /// The answer was not the expected JSON.
    #[error("failed to decode {path} response")]
    Decode {
        /// Route that was called.
        path: String,
        /// Decoding failure.
        #[source]
        source: reqwest::Error,
    },
}
