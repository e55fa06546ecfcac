use futures::future::BoxFuture;
use tokio::sync::watch;

use super::error::AuthError;

/// Identity issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Provider subject id, also the key of the user's document.
    pub uid: String,
    /// Whether the identity was provisioned anonymously.
    pub is_anonymous: bool,
}

/// Value broadcast by [`IdentityProvider::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStateChange {
    /// The provider has not determined the current identity yet.
    Pending,
    /// The provider settled on an identity, or on none.
    Resolved(Option<Identity>),
}

/// Capabilities the session lifecycle needs from an identity provider.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Identity already known to the provider, without waiting.
    fn current_identity(&self) -> Option<Identity>;

    /// Stream of identity changes, including the initial resolution.
    fn subscribe(&self) -> watch::Receiver<AuthStateChange>;

    /// Create a new anonymous identity and make it current.
    fn sign_in_anonymously(&self) -> BoxFuture<'static, Result<Identity, AuthError>>;

    /// Fresh bearer token for `identity`.
    fn id_token(&self, identity: &Identity) -> BoxFuture<'static, Result<String, AuthError>>;
}
