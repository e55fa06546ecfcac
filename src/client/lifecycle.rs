//! Anonymous session lifecycle: resolve or provision an identity and mirror its
//! bearer token into the credential store.

use std::sync::{
    Arc, OnceLock,
    atomic::{AtomicBool, Ordering},
};

use thiserror::Error;
use tokio::{
    sync::{Mutex, watch},
    task::AbortHandle,
};
use tracing::{debug, info, warn};

use super::{
    credentials::{CredentialStore, TOKEN_COOKIE},
    error::AuthError,
    identity::{AuthStateChange, Identity, IdentityProvider},
};

/// Coarse phase of the anonymous session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPhase {
    /// Not mounted yet.
    Uninitialized,
    /// Waiting for the provider or for provisioning.
    Loading,
    /// An identity is signed in.
    Authenticated,
    /// Provisioning failed; the message is in the snapshot.
    Errored,
    /// No identity, not loading, no error.
    SignedOut,
}

/// Input of [`AuthStateMachine::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// The session starts observing the provider.
    Mount,
    /// The provider settled on an identity, or on none.
    IdentityResolved(Option<Identity>),
    /// Anonymous sign-in was requested.
    ProvisionStarted,
    /// Anonymous sign-in returned an identity.
    ProvisionSucceeded(Identity),
    /// Anonymous sign-in failed with this message.
    ProvisionFailed(String),
    /// Local sign-out.
    SignOut,
}

impl AuthEvent {
    fn name(&self) -> &'static str {
        match self {
            AuthEvent::Mount => "Mount",
            AuthEvent::IdentityResolved(_) => "IdentityResolved",
            AuthEvent::ProvisionStarted => "ProvisionStarted",
            AuthEvent::ProvisionSucceeded(_) => "ProvisionSucceeded",
            AuthEvent::ProvisionFailed(_) => "ProvisionFailed",
            AuthEvent::SignOut => "SignOut",
        }
    }
}

/// Event that the current phase does not accept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event} is not allowed while {phase:?}")]
pub struct InvalidAuthTransition {
    /// Phase the machine was in.
    pub phase: AuthPhase,
    /// Name of the rejected event.
    pub event: &'static str,
}

/// What observers of the session see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    /// Current phase.
    pub phase: AuthPhase,
    /// Signed-in identity.
    pub user: Option<Identity>,
    /// True until the provider or provisioning settles.
    pub loading: bool,
    /// Last provisioning failure.
    pub error: Option<String>,
}

impl AuthSnapshot {
    fn uninitialized() -> Self {
        Self {
            phase: AuthPhase::Uninitialized,
            user: None,
            loading: false,
            error: None,
        }
    }

    /// Whether an identity is signed in.
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Whether the signed-in identity is anonymous.
    pub fn is_anonymous(&self) -> bool {
        self.user.as_ref().is_some_and(|user| user.is_anonymous)
    }

    /// Settled without identity or error: the condition that triggers provisioning.
    fn needs_identity(&self) -> bool {
        self.user.is_none() && !self.loading && self.error.is_none()
    }
}

/// Pure transition table of the lifecycle.
#[derive(Debug, Clone)]
pub struct AuthStateMachine {
    snapshot: AuthSnapshot,
}

impl Default for AuthStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthStateMachine {
    /// Machine in the uninitialized phase.
    pub fn new() -> Self {
        Self {
            snapshot: AuthSnapshot::uninitialized(),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &AuthSnapshot {
        &self.snapshot
    }

    /// Current phase.
    pub fn phase(&self) -> AuthPhase {
        self.snapshot.phase
    }

    /// Apply `event`, leaving the state unchanged when the phase rejects it.
    pub fn apply(&mut self, event: AuthEvent) -> Result<&AuthSnapshot, InvalidAuthTransition> {
        use AuthPhase::*;

        let phase = self.snapshot.phase;
        let rejected = |event: &AuthEvent| InvalidAuthTransition {
            phase,
            event: event.name(),
        };

        let next = match (phase, event) {
            (Uninitialized, AuthEvent::Mount) => AuthSnapshot {
                phase: Loading,
                user: None,
                loading: true,
                error: None,
            },
            (Uninitialized, event) | (_, event @ AuthEvent::Mount) => {
                return Err(rejected(&event));
            }
            (_, AuthEvent::IdentityResolved(Some(identity))) => AuthSnapshot {
                phase: Authenticated,
                user: Some(identity),
                loading: false,
                error: None,
            },
            (_, AuthEvent::IdentityResolved(None)) | (_, AuthEvent::SignOut) => AuthSnapshot {
                phase: SignedOut,
                user: None,
                loading: false,
                error: None,
            },
            (_, AuthEvent::ProvisionStarted) => AuthSnapshot {
                phase: Loading,
                user: self.snapshot.user.take(),
                loading: true,
                error: None,
            },
            (Loading | Authenticated, AuthEvent::ProvisionSucceeded(identity)) => AuthSnapshot {
                phase: Authenticated,
                user: Some(identity),
                loading: false,
                error: None,
            },
            (Loading, AuthEvent::ProvisionFailed(message)) => AuthSnapshot {
                phase: Errored,
                user: self.snapshot.user.take(),
                loading: false,
                error: Some(message),
            },
            (_, event @ (AuthEvent::ProvisionSucceeded(_) | AuthEvent::ProvisionFailed(_))) => {
                return Err(rejected(&event));
            }
        };

        self.snapshot = next;
        Ok(&self.snapshot)
    }
}

struct SessionInner<P, C> {
    provider: P,
    credentials: C,
    machine: Mutex<AuthStateMachine>,
    snapshots: watch::Sender<AuthSnapshot>,
    auto_provisioned: AtomicBool,
}

/// One anonymous session lifecycle instance.
///
/// Construction mounts the machine, so the first observable state is loading.
/// [`AnonymousSession::start`] performs the initial resolution and keeps following
/// the provider afterwards.
pub struct AnonymousSession<P, C> {
    inner: Arc<SessionInner<P, C>>,
    started: AtomicBool,
    listener: OnceLock<AbortHandle>,
}

impl<P: IdentityProvider, C: CredentialStore> AnonymousSession<P, C> {
    /// Mount a session over `provider`; nothing runs until it is started.
    pub fn new(provider: P, credentials: C) -> Self {
        let mut machine = AuthStateMachine::new();
        let mounted = machine
            .apply(AuthEvent::Mount)
            .cloned()
            .unwrap_or_else(|_| AuthSnapshot::uninitialized());
        let (snapshots, _rx) = watch::channel(mounted);

        Self {
            inner: Arc::new(SessionInner {
                provider,
                credentials,
                machine: Mutex::new(machine),
                snapshots,
                auto_provisioned: AtomicBool::new(false),
            }),
            started: AtomicBool::new(false),
            listener: OnceLock::new(),
        }
    }

    /// Resolve the initial identity, provisioning one when none exists, then follow
    /// provider changes in the background. Later calls are no-ops.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut changes = self.inner.provider.subscribe();
        let initial = match self.inner.provider.current_identity() {
            Some(identity) => {
                changes.borrow_and_update();
                Some(identity)
            }
            None => initial_resolution(&mut changes).await,
        };
        self.inner.resolve(initial).await;
        // Emissions caused by the initial resolution are already applied.
        changes.borrow_and_update();

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let change = changes.borrow_and_update().clone();
                if let AuthStateChange::Resolved(identity) = change {
                    inner.resolve(identity).await;
                }
            }
            debug!("identity provider closed its change stream");
        });
        if self.listener.set(handle.abort_handle()).is_err() {
            handle.abort();
        }
    }

    /// Explicit anonymous sign-in; the failure is recorded in the snapshot and returned.
    pub async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        self.inner.provision().await
    }

    /// Forget the identity locally; nothing is revoked at the provider.
    pub async fn sign_out(&self) {
        self.inner.credentials.remove(TOKEN_COOKIE);
        self.inner.transition(AuthEvent::SignOut).await;
    }

    /// Latest snapshot.
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Receiver notified on every snapshot change.
    pub fn subscribe(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.snapshots.subscribe()
    }
}

impl<P, C> Drop for AnonymousSession<P, C> {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.get() {
            listener.abort();
        }
    }
}

/// Wait until the provider has decided on an identity.
async fn initial_resolution(changes: &mut watch::Receiver<AuthStateChange>) -> Option<Identity> {
    loop {
        if let AuthStateChange::Resolved(identity) = &*changes.borrow_and_update() {
            return identity.clone();
        }
        if changes.changed().await.is_err() {
            return None;
        }
    }
}

impl<P: IdentityProvider, C: CredentialStore> SessionInner<P, C> {
    async fn transition(&self, event: AuthEvent) -> AuthSnapshot {
        let mut machine = self.machine.lock().await;
        if let Err(err) = machine.apply(event) {
            debug!(error = %err, "ignored lifecycle event");
        }
        let snapshot = machine.snapshot().clone();
        self.snapshots.send_replace(snapshot.clone());
        snapshot
    }

    /// Store a fresh bearer token for `identity`, or drop the stored one.
    async fn sync_credentials(&self, identity: Option<&Identity>) {
        let Some(identity) = identity else {
            self.credentials.remove(TOKEN_COOKIE);
            return;
        };
        match self.provider.id_token(identity).await {
            Ok(token) => self.credentials.store(TOKEN_COOKIE, &token),
            Err(err) => {
                warn!(uid = %identity.uid, error = %err, "failed to obtain id token");
                self.credentials.remove(TOKEN_COOKIE);
            }
        }
    }

    async fn resolve(&self, identity: Option<Identity>) {
        self.sync_credentials(identity.as_ref()).await;
        let snapshot = self
            .transition(AuthEvent::IdentityResolved(identity))
            .await;

        if snapshot.needs_identity() && !self.auto_provisioned.swap(true, Ordering::AcqRel) {
            info!("no identity found; provisioning an anonymous one");
            // Failure is already recorded in the snapshot.
            let _ = self.provision().await;
        }
    }

    async fn provision(&self) -> Result<Identity, AuthError> {
        self.transition(AuthEvent::ProvisionStarted).await;
        match self.provider.sign_in_anonymously().await {
            Ok(identity) => {
                self.sync_credentials(Some(&identity)).await;
                self.transition(AuthEvent::ProvisionSucceeded(identity.clone()))
                    .await;
                Ok(identity)
            }
            Err(err) => {
                warn!(error = %err, "anonymous sign-in failed");
                self.transition(AuthEvent::ProvisionFailed(err.to_string()))
                    .await;
                Err(err)
            }
        }
    }
}
