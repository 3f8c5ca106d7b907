//! Identity tokens for outgoing requests.

use async_trait::async_trait;
use tokio::sync::watch;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// The bearer token to attach, or `None` when no user is signed in.
    async fn token(&self) -> Option<String>;
}

/// A token fixed at construction, e.g. from the environment.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<String>) -> Self {
        let token = token.filter(|token| !token.trim().is_empty());
        Self { token }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthState {
    /// The identity provider has not reported yet.
    #[default]
    Unknown,
    SignedIn(String),
    SignedOut,
}

/// Follows an identity provider's state changes.
///
/// While the state is [`AuthState::Unknown`], [`TokenProvider::token`] waits
/// for exactly one state change instead of answering, so no request goes out
/// before the provider has made a decision.
#[derive(Debug, Clone)]
pub struct SessionTokenProvider {
    rx: watch::Receiver<AuthState>,
}

/// Write side of a [`SessionTokenProvider`].
#[derive(Debug)]
pub struct AuthHandle {
    tx: watch::Sender<AuthState>,
}

impl SessionTokenProvider {
    pub fn new() -> (Self, AuthHandle) {
        let (tx, rx) = watch::channel(AuthState::Unknown);
        (Self { rx }, AuthHandle { tx })
    }
}

impl AuthHandle {
    pub fn sign_in(&self, token: impl Into<String>) {
        self.tx.send_replace(AuthState::SignedIn(token.into()));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(AuthState::SignedOut);
    }
}

#[async_trait]
impl TokenProvider for SessionTokenProvider {
    async fn token(&self) -> Option<String> {
        let mut rx = self.rx.clone();
        let mut state = rx.borrow_and_update().clone();
        if state == AuthState::Unknown {
            // A dropped handle means no decision will ever come.
            if rx.changed().await.is_err() {
                return None;
            }
            state = rx.borrow_and_update().clone();
        }
        match state {
            AuthState::SignedIn(token) => Some(token),
            AuthState::Unknown | AuthState::SignedOut => None,
        }
    }
}

/// What to do with a request when no token is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    /// Send it without a bearer header and let the backend decide.
    #[default]
    SendAnonymous,
    /// Fail client-side with [`crate::ApiError::Unauthenticated`].
    Block,
}
