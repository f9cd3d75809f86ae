//! Shared session snapshot.
//!
//! One `Session` is shared by the HTTP client and every service. It owns the
//! persisted token/user/admin/CSRF values, the in-memory auth state, and the
//! forced-logout path used when the server rejects the session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::auth::state::AuthState;
use crate::error::{ClientError, ClientResult};
use crate::models::user::User;
use crate::navigation::{LoginReason, Navigator, Route};
use crate::storage::{keys, SessionStorage};

pub struct Session {
    storage: Arc<dyn SessionStorage>,
    navigator: Arc<dyn Navigator>,
    state: RwLock<AuthState>,
    epoch: AtomicU64,
}

impl Session {
    pub fn new(storage: Arc<dyn SessionStorage>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            storage,
            navigator,
            state: RwLock::new(AuthState::Anonymous),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> AuthState {
        self.state
            .read()
            .map(|s| s.clone())
            .unwrap_or(AuthState::Anonymous)
    }

    pub fn set_state(&self, next: AuthState) {
        if let Ok(mut state) = self.state.write() {
            if state.label() != next.label() {
                tracing::info!(from = state.label(), to = next.label(), "Auth state transition");
            }
            *state = next;
        }
    }

    /// Incremented on every clear; lets in-flight work detect it was superseded.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    pub fn token(&self) -> Option<String> {
        self.storage.get(keys::JWT).filter(|t| !t.is_empty())
    }

    pub fn store_token(&self, token: &str) -> ClientResult<()> {
        self.storage.set(keys::JWT, token)
    }

    pub fn user(&self) -> Option<User> {
        let raw = self.storage.get(keys::USER)?;
        serde_json::from_str(&raw).ok()
    }

    /// Username of the signed-in user, from the live state or the stored snapshot.
    pub fn username(&self) -> Option<String> {
        match self.state() {
            AuthState::Authenticated(user) => Some(user.username),
            _ => self.user().map(|u| u.username),
        }
    }

    pub fn require_username(&self) -> ClientResult<String> {
        self.username().ok_or(ClientError::Unauthorized)
    }

    pub fn store_user(&self, user: &User) -> ClientResult<()> {
        self.storage.set(keys::USER, &serde_json::to_string(user)?)?;
        self.storage
            .set(keys::IS_ADMIN, if user.is_admin() { "true" } else { "false" })
    }

    pub fn is_admin(&self) -> bool {
        self.storage.get(keys::IS_ADMIN).as_deref() == Some("true")
    }

    pub fn csrf_token(&self) -> Option<String> {
        self.storage.get(keys::CSRF)
    }

    pub fn store_csrf_token(&self, token: &str) -> ClientResult<()> {
        self.storage.set(keys::CSRF, token)
    }

    pub fn clear_csrf_token(&self) -> ClientResult<()> {
        self.storage.remove(keys::CSRF)
    }

    pub fn current_baby_id(&self) -> Option<i64> {
        self.storage.get(keys::CURRENT_BABY)?.parse().ok()
    }

    pub fn store_current_baby_id(&self, id: Option<i64>) -> ClientResult<()> {
        match id {
            Some(id) => self.storage.set(keys::CURRENT_BABY, &id.to_string()),
            None => self.storage.remove(keys::CURRENT_BABY),
        }
    }

    /// Wipe everything persisted and drop back to `Anonymous`.
    pub fn clear(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        if let Err(e) = self.storage.clear() {
            tracing::error!(error = %e, "Failed to clear session storage");
        }
        self.set_state(AuthState::Anonymous);
    }

    /// Fatal session error: clear and send the user to the login screen.
    pub fn force_logout(&self, reason: LoginReason) {
        tracing::warn!(?reason, "Session ended");
        self.clear();
        self.navigate(Route::Login { reason });
    }

    pub fn navigate(&self, route: Route) {
        self.navigator.navigate(route);
    }
}
