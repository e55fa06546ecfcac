//! Firestore REST implementation of the document store.

/// Firestore typed value codec.
pub mod codec;
/// Connection settings.
pub mod config;
/// Backend error type.
pub mod error;
/// `DocumentStore` implementation.
pub mod store;
/// OAuth access tokens.
pub mod token;

pub use config::{CredentialSource, FirestoreConfig, ServiceAccount};
pub use error::FirestoreError;
pub use store::FirestoreDocumentStore;
