use crate::error::{ClientError, ClientResult};
use crate::models::user::User;

/// Sign-in wizard state.
///
/// `Anonymous → Authenticating → {Authenticated | TwoFactorPending}`;
/// `TwoFactorPending → Authenticated` on a correct code; any state returns to
/// `Anonymous` on logout.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AuthState {
    #[default]
    Anonymous,
    Authenticating,
    TwoFactorPending {
        username: String,
        provisional_token: String,
    },
    Authenticated(User),
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AuthState::Anonymous => "anonymous",
            AuthState::Authenticating => "authenticating",
            AuthState::TwoFactorPending { .. } => "two_factor_pending",
            AuthState::Authenticated(_) => "authenticated",
        }
    }

    /// Password sign-in may start from scratch or restart a pending code step.
    pub fn ensure_can_begin_login(&self) -> ClientResult<()> {
        match self {
            AuthState::Anonymous | AuthState::TwoFactorPending { .. } => Ok(()),
            AuthState::Authenticating => {
                Err(ClientError::Conflict("A sign-in is already in progress".into()))
            }
            AuthState::Authenticated(_) => {
                Err(ClientError::Conflict("Already signed in".into()))
            }
        }
    }

    /// The provisional token, if a code is awaited.
    pub fn pending_token(&self) -> ClientResult<(String, String)> {
        match self {
            AuthState::TwoFactorPending {
                username,
                provisional_token,
            } => Ok((username.clone(), provisional_token.clone())),
            _ => Err(ClientError::Conflict(
                "No two-factor verification is pending".into(),
            )),
        }
    }
}
