use std::fmt;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;

use super::error::{FirestoreError, FirestoreResult};

const PRODUCTION_ENDPOINT: &str = "https://firestore.googleapis.com";
const DEFAULT_EMULATOR_HOST: &str = "localhost:8080";
const DEFAULT_EMULATOR_PROJECT: &str = "demo-test";
const DEFAULT_DATABASE: &str = "(default)";
const PRIVATE_KEY_FIELD: &str = "\"private_key\"";

/// Service account material used to mint OAuth access tokens.
#[derive(Clone, Deserialize)]
pub struct ServiceAccount {
    /// Project the account belongs to.
    pub project_id: String,
    /// PEM encoded RSA key used to sign assertions.
    pub private_key: String,
    /// Account identity, the assertion issuer.
    pub client_email: String,
}

impl fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccount")
            .field("project_id", &self.project_id)
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Where request credentials come from.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    /// Embedded service account, exchanged for short-lived access tokens.
    ServiceAccount(ServiceAccount),
    /// Project identifier only; requests are sent with the emulator's owner token.
    Ambient,
}

/// Runtime configuration describing how to reach Firestore.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// Google Cloud project.
    pub project_id: String,
    /// Database id, `(default)` unless overridden.
    pub database: String,
    /// How requests authenticate.
    pub credentials: CredentialSource,
    /// Host (or full URL) replacing the production endpoint, e.g. an emulator.
    pub endpoint: Option<String>,
}

impl FirestoreConfig {
    /// Configuration authenticating with a service account against production.
    pub fn with_service_account(account: ServiceAccount) -> Self {
        Self {
            project_id: account.project_id.clone(),
            database: DEFAULT_DATABASE.to_owned(),
            credentials: CredentialSource::ServiceAccount(account),
            endpoint: None,
        }
    }

    /// Configuration for an emulator reachable at `endpoint`.
    pub fn emulator(project_id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database: DEFAULT_DATABASE.to_owned(),
            credentials: CredentialSource::Ambient,
            endpoint: Some(endpoint.into()),
        }
    }

    /// Override the target endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Build a configuration by reading the expected environment variables.
    ///
    /// `ENVIRONMENT=test` selects the emulator with ambient credentials; otherwise the
    /// base64 encoded `FIREBASE_SERVICE_ACCOUNT` is required. `FIRESTORE_ENDPOINT`
    /// overrides the endpoint in both cases.
    pub fn from_env() -> FirestoreResult<Self> {
        let is_emulator = std::env::var("ENVIRONMENT").is_ok_and(|value| value == "test");

        let config = if is_emulator {
            let project_id = std::env::var("FIREBASE_PROJECT_ID")
                .unwrap_or_else(|_| DEFAULT_EMULATOR_PROJECT.to_owned());
            let host = std::env::var("FIRESTORE_EMULATOR_HOST")
                .unwrap_or_else(|_| DEFAULT_EMULATOR_HOST.to_owned());
            Self::emulator(project_id, host)
        } else {
            let encoded = std::env::var("FIREBASE_SERVICE_ACCOUNT").map_err(|_| {
                FirestoreError::MissingEnvVar {
                    var: "FIREBASE_SERVICE_ACCOUNT",
                }
            })?;
            Self::with_service_account(decode_service_account(&encoded)?)
        };

        match std::env::var("FIRESTORE_ENDPOINT") {
            Ok(endpoint) if !endpoint.is_empty() => Ok(config.with_endpoint(endpoint)),
            _ => Ok(config),
        }
    }

    /// Versioned API root, e.g. `https://firestore.googleapis.com/v1`.
    pub fn api_root(&self) -> String {
        let endpoint = match self.endpoint.as_deref() {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                host.trim_end_matches('/').to_owned()
            }
            Some(host) => format!("http://{}", host.trim_end_matches('/')),
            None => PRODUCTION_ENDPOINT.to_owned(),
        };
        format!("{endpoint}/v1")
    }

    /// Resource path of the documents root, without the API prefix.
    pub fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

/// Decode base64 service account JSON.
///
/// Keys pasted with literal line breaks inside the `private_key` string are repaired
/// before parsing, and double-escaped `\\n` sequences are turned back into newlines.
pub fn decode_service_account(encoded: &str) -> FirestoreResult<ServiceAccount> {
    let bytes = STANDARD
        .decode(encoded.trim())
        .map_err(|source| FirestoreError::ServiceAccountEncoding { source })?;
    let raw = String::from_utf8_lossy(&bytes);

    let mut account: ServiceAccount = match serde_json::from_str(&raw) {
        Ok(account) => account,
        Err(_) => serde_json::from_str(&escape_private_key_newlines(&raw)).map_err(|source| {
            FirestoreError::ServiceAccountJson {
                length: encoded.len(),
                source,
            }
        })?,
    };

    account.private_key = account.private_key.replace("\\n", "\n");
    Ok(account)
}

/// Escape raw line breaks found inside the `private_key` string value.
fn escape_private_key_newlines(raw: &str) -> String {
    let Some(key_pos) = raw.find(PRIVATE_KEY_FIELD) else {
        return raw.to_owned();
    };
    let after_key = key_pos + PRIVATE_KEY_FIELD.len();
    let Some(open) = raw[after_key..].find('"').map(|offset| after_key + offset) else {
        return raw.to_owned();
    };

    let mut repaired = String::with_capacity(raw.len() + 64);
    repaired.push_str(&raw[..=open]);

    let mut chars = raw[open + 1..].char_indices();
    let mut escaped = false;
    let mut rest_start = None;
    for (offset, ch) in chars.by_ref() {
        match ch {
            '\n' => repaired.push_str("\\n"),
            '\r' => {}
            '"' if !escaped => {
                rest_start = Some(open + 1 + offset);
                break;
            }
            other => repaired.push(other),
        }
        escaped = ch == '\\' && !escaped;
    }

    if let Some(start) = rest_start {
        repaired.push_str(&raw[start..]);
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(raw: &str) -> String {
        STANDARD.encode(raw)
    }

    #[test]
    fn decodes_well_formed_account() {
        let raw = r#"{"project_id":"p","private_key":"-----BEGIN\nKEY\n-----END\n","client_email":"a@b"}"#;
        let account = decode_service_account(&encode(raw)).unwrap();
        assert_eq!(account.project_id, "p");
        assert_eq!(account.private_key, "-----BEGIN\nKEY\n-----END\n");
    }

    #[test]
    fn repairs_literal_newlines_in_private_key() {
        let raw = "{\n  \"project_id\": \"p\",\n  \"private_key\": \"-----BEGIN\nKEY\n-----END\n\",\n  \"client_email\": \"a@b\"\n}";
        let account = decode_service_account(&encode(raw)).unwrap();
        assert_eq!(account.private_key, "-----BEGIN\nKEY\n-----END\n");
        assert_eq!(account.client_email, "a@b");
    }

    #[test]
    fn restores_double_escaped_newlines() {
        let raw = r#"{"project_id":"p","private_key":"A\\nB","client_email":"a@b"}"#;
        let account = decode_service_account(&encode(raw)).unwrap();
        assert_eq!(account.private_key, "A\nB");
    }

    #[test]
    fn rejects_invalid_material() {
        assert!(matches!(
            decode_service_account("%%%"),
            Err(FirestoreError::ServiceAccountEncoding { .. })
        ));
        assert!(matches!(
            decode_service_account(&encode("not json")),
            Err(FirestoreError::ServiceAccountJson { .. })
        ));
    }

    #[test]
    fn debug_output_hides_private_key() {
        let account = ServiceAccount {
            project_id: "p".into(),
            private_key: "secret".into(),
            client_email: "a@b".into(),
        };
        assert!(!format!("{account:?}").contains("secret"));
    }

    #[test]
    fn endpoint_override_switches_api_root() {
        let config = FirestoreConfig::emulator("demo-test", "localhost:8080");
        assert_eq!(config.api_root(), "http://localhost:8080/v1");
        assert_eq!(
            config.documents_path(),
            "projects/demo-test/databases/(default)/documents"
        );

        let config = config.with_endpoint("https://firestore.example.com/");
        assert_eq!(config.api_root(), "https://firestore.example.com/v1");
    }

    #[test]
    fn production_endpoint_by_default() {
        let config = FirestoreConfig::with_service_account(ServiceAccount {
            project_id: "prod".into(),
            private_key: String::new(),
            client_email: String::new(),
        });
        assert_eq!(config.api_root(), "https://firestore.googleapis.com/v1");
    }
}
