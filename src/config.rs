//! Application-level configuration: listening port, storage backend and seed catalog.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::dao::{
    document_store::firestore::{CredentialSource, FirestoreConfig, FirestoreError},
    models::{GameCategory, NewGame},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FUN_VAULT_CONFIG_PATH";
const DEFAULT_PORT: u16 = 3000;

/// Errors raised while resolving the startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `PORT` is not a valid port number.
    #[error("invalid port `{value}`")]
    InvalidPort {
        /// Raw environment value.
        value: String,
    },
    /// `STORE_BACKEND` names no known backend.
    #[error("unknown store backend `{value}` (expected firestore or memory)")]
    UnknownBackend {
        /// Raw environment value.
        value: String,
    },
    /// Firestore settings could not be read.
    #[error(transparent)]
    Firestore(#[from] FirestoreError),
}

/// Storage backend selected at startup.
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// Firestore REST API, production or emulator.
    Firestore(FirestoreConfig),
    /// In-process store seeded from the catalog.
    Memory,
}

impl StoreBackend {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Firestore(_) => "firestore",
            StoreBackend::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// HTTP listening port.
    pub port: u16,
    /// Storage the supervisor connects to.
    pub backend: StoreBackend,
    /// Games inserted into an empty in-memory catalog.
    pub catalog: Vec<NewGame>,
}

impl AppConfig {
    /// Resolve the configuration from the process environment and the optional JSON file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match env::var("PORT").or_else(|_| env::var("SERVER_PORT")) {
            Ok(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort { value })?,
            Err(_) => DEFAULT_PORT,
        };

        let backend = select_backend(env::var("STORE_BACKEND").ok().as_deref())?;

        if let StoreBackend::Firestore(firestore) = &backend {
            match &firestore.credentials {
                CredentialSource::ServiceAccount(account) => info!(
                    project_id = %firestore.project_id,
                    client_email = %account.client_email,
                    "using Firestore with service account credentials"
                ),
                CredentialSource::Ambient => info!(
                    project_id = %firestore.project_id,
                    endpoint = firestore.endpoint.as_deref().unwrap_or_default(),
                    "using Firestore emulator with ambient credentials"
                ),
            }
        }

        Ok(Self {
            port,
            backend,
            catalog: load_catalog(),
        })
    }

    /// Configuration for tests and local runs: memory backend, built-in catalog.
    pub fn in_memory() -> Self {
        Self {
            port: DEFAULT_PORT,
            backend: StoreBackend::Memory,
            catalog: default_catalog(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file.
struct RawConfig {
    #[serde(default)]
    games: Vec<NewGame>,
}

/// Load the seed catalog from disk, falling back to the built-in one.
fn select_backend(value: Option<&str>) -> Result<StoreBackend, ConfigError> {
    match value.map(str::to_ascii_lowercase).as_deref() {
        None | Some("firestore") => Ok(StoreBackend::Firestore(FirestoreConfig::from_env()?)),
        Some("memory") => Ok(StoreBackend::Memory),
        Some(other) => Err(ConfigError::UnknownBackend {
            value: other.to_owned(),
        }),
    }
}

fn load_catalog() -> Vec<NewGame> {
    let path = resolve_config_path();
    match fs::read_to_string(&path) {
        Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
            Ok(raw) => {
                info!(
                    path = %path.display(),
                    count = raw.games.len(),
                    "loaded game catalog from config"
                );
                raw.games
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to parse config; falling back to defaults"
                );
                default_catalog()
            }
        },
        Err(err) if err.kind() == ErrorKind::NotFound => {
            info!(
                path = %path.display(),
                "config file not found; using built-in catalog"
            );
            default_catalog()
        }
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "failed to read config; falling back to defaults"
            );
            default_catalog()
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in catalog shipped with the binary.
fn default_catalog() -> Vec<NewGame> {
    vec![
        NewGame {
            game_id: "tic-tac-toe".into(),
            name: "Tic Tac Toe".into(),
            description: "Line up three marks before the computer does.".into(),
            category: GameCategory::Classic,
            icon: "⭕".into(),
            is_active: true,
        },
        NewGame {
            game_id: "connect-four".into(),
            name: "Connect Four".into(),
            description: "Drop discs and connect four in a row.".into(),
            category: GameCategory::Strategy,
            icon: "🔴".into(),
            is_active: true,
        },
        NewGame {
            game_id: "checkers".into(),
            name: "Checkers".into(),
            description: "Jump and capture every piece on the board.".into(),
            category: GameCategory::Strategy,
            icon: "⚫".into(),
            is_active: false,
        },
    ]
}
