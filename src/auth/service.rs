use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::auth::jwt::{self, TokenStatus};
use crate::auth::oauth::{parse_callback, OAuthCallback, OAuthGuard, OAuthOutcome};
use crate::auth::state::AuthState;
use crate::dto::{
    LoginForm, MessageResponse, SignInResponse, SignupForm, TokenResponse, TwoFactorCodeForm,
    TwoFactorStatusResponse, VerifyTwoFactorLoginRequest,
};
use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::models::user::User;
use crate::navigation::{LoginReason, Route};
use crate::session::Session;

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    SignedIn(User),
    /// A 6-digit code must be submitted through `verify_two_factor`.
    TwoFactorRequired,
}

#[derive(Clone)]
pub struct AuthService {
    api: ApiClient,
    session: Arc<Session>,
    oauth: Arc<OAuthGuard>,
}

impl AuthService {
    pub fn new(api: ApiClient) -> Self {
        let session = api.session().clone();
        Self {
            api,
            session,
            oauth: Arc::new(OAuthGuard::new()),
        }
    }

    pub fn state(&self) -> AuthState {
        self.session.state()
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.state().user().cloned()
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    pub async fn login(&self, form: LoginForm) -> ClientResult<LoginOutcome> {
        form.validate()?;
        self.session.state().ensure_can_begin_login()?;

        let epoch = self.session.epoch();
        self.session.set_state(AuthState::Authenticating);

        let result = self
            .api
            .post::<_, SignInResponse>("/auth/public/signin", &form)
            .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                if self.session.epoch() == epoch {
                    self.session.set_state(AuthState::Anonymous);
                }
                return Err(e);
            }
        };

        if self.session.epoch() != epoch {
            return Err(superseded());
        }

        if resp.two_factor_required {
            self.session.set_state(AuthState::TwoFactorPending {
                username: resp.username.unwrap_or(form.username),
                provisional_token: resp.jwt_token,
            });
            return Ok(LoginOutcome::TwoFactorRequired);
        }

        let user = self.complete_login(&resp.jwt_token, epoch).await?;
        Ok(LoginOutcome::SignedIn(user))
    }

    /// Submit the code for a pending two-factor sign-in.
    ///
    /// A rejected code leaves the pending step untouched.
    pub async fn verify_two_factor(&self, code: &str) -> ClientResult<User> {
        let form = TwoFactorCodeForm {
            code: code.trim().to_string(),
        };
        form.validate()?;

        let (username, provisional_token) = self.session.state().pending_token()?;
        let epoch = self.session.epoch();

        let body = VerifyTwoFactorLoginRequest {
            code: form.code,
            jwt_token: provisional_token,
        };
        let resp: TokenResponse = match self
            .api
            .post("/auth/public/verify-2fa-login", &body)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                tracing::info!(username = %username, error = %e, "Two-factor code rejected");
                return Err(e);
            }
        };

        if self.session.epoch() != epoch {
            return Err(superseded());
        }

        self.complete_login(&resp.jwt_token, epoch).await
    }

    pub async fn register(&self, form: SignupForm) -> ClientResult<MessageResponse> {
        form.validate()?;
        let resp: MessageResponse = self.api.post("/auth/public/signup", &form).await?;
        tracing::info!(username = %form.username, "Account registered");
        Ok(resp)
    }

    /// Consume an OAuth2 redirect. Each distinct URL is processed once.
    pub async fn handle_oauth2_redirect(&self, url: &str) -> ClientResult<OAuthOutcome> {
        if !self.oauth.claim(url) {
            tracing::debug!("OAuth2 redirect already processed");
            return Ok(OAuthOutcome::AlreadyProcessed);
        }

        let token = match parse_callback(url) {
            Ok(OAuthCallback::Token(token)) => token,
            Ok(OAuthCallback::Error(error)) => {
                return Ok(self.reject_oauth(format!("Sign-in failed: {}", error)))
            }
            Ok(OAuthCallback::Missing) => {
                return Ok(self.reject_oauth("No token in redirect".into()))
            }
            Err(e) => return Ok(self.reject_oauth(e.to_string())),
        };

        let claims = match jwt::inspect(&token, Utc::now()) {
            TokenStatus::Valid(claims) => claims,
            TokenStatus::Expired(_) => return Ok(self.reject_oauth("Token has expired".into())),
            TokenStatus::Opaque => {
                return Ok(self.reject_oauth("Token could not be decoded".into()))
            }
        };

        let user = claims.to_user();
        if let Err(e) = self.install_oauth_session(&token, &user) {
            // Leave the redirect claimable so the same URL can be retried.
            self.oauth.release(url);
            return Err(e);
        }
        self.session.set_state(AuthState::Authenticated(user.clone()));
        self.session.navigate(Route::Home);
        tracing::info!(username = %user.username, admin = user.is_admin(), "Signed in via OAuth2");

        Ok(OAuthOutcome::SignedIn(user))
    }

    /// Returns false (after logging out) when the stored token has expired.
    pub fn check_token(&self) -> bool {
        let Some(token) = self.session.token() else {
            if !matches!(self.session.state(), AuthState::Anonymous) {
                self.session.set_state(AuthState::Anonymous);
            }
            return false;
        };

        match jwt::inspect(&token, Utc::now()) {
            TokenStatus::Expired(claims) => {
                tracing::info!(username = %claims.sub, "Stored token expired");
                self.session.force_logout(LoginReason::SessionExpired);
                false
            }
            TokenStatus::Valid(_) | TokenStatus::Opaque => true,
        }
    }

    /// Resume a stored session on startup.
    pub async fn restore(&self) -> ClientResult<Option<User>> {
        if !self.check_token() {
            return Ok(None);
        }

        let user = match self.api.get::<User>("/auth/user").await {
            Ok(user) => {
                self.session.store_user(&user)?;
                user
            }
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => match self.session.user() {
                Some(user) => {
                    tracing::warn!(error = %e, "Profile refresh failed; using stored user");
                    user
                }
                None => return Err(e),
            },
        };

        self.session.set_state(AuthState::Authenticated(user.clone()));
        Ok(Some(user))
    }

    pub fn logout(&self) {
        if let Some(user) = self.current_user() {
            tracing::info!(username = %user.username, "Signing out");
        }
        self.session.force_logout(LoginReason::SignedOut);
    }

    pub async fn two_factor_status(&self) -> ClientResult<bool> {
        let resp: TwoFactorStatusResponse = self.api.get("/auth/user/2fa-status").await?;
        Ok(resp.is2fa_enabled)
    }

    /// Start enrolment; returns the provisioning QR code URL.
    pub async fn enable_two_factor(&self) -> ClientResult<String> {
        let raw = self.api.post_text::<()>("/auth/enable-2fa", None).await?;
        let url = serde_json::from_str::<String>(&raw).unwrap_or_else(|_| raw.trim().to_string());
        if url.is_empty() {
            return Err(ClientError::Internal(anyhow::anyhow!(
                "Server returned no QR code URL"
            )));
        }
        Ok(url)
    }

    pub async fn confirm_two_factor(&self, code: &str) -> ClientResult<()> {
        let form = TwoFactorCodeForm {
            code: code.trim().to_string(),
        };
        form.validate()?;
        self.api.post_text("/auth/verify-2fa", Some(&form)).await?;
        Ok(())
    }

    pub async fn disable_two_factor(&self) -> ClientResult<()> {
        self.api.post_text::<()>("/auth/disable-2fa", None).await?;
        Ok(())
    }

    /// Install a final token, load the profile, and enter `Authenticated`.
    async fn complete_login(&self, token: &str, epoch: u64) -> ClientResult<User> {
        if let Err(e) = self.adopt_token(token) {
            self.session.set_state(AuthState::Anonymous);
            return Err(e);
        }

        let user = match self.api.get::<User>("/auth/user").await {
            Ok(user) => user,
            Err(e) => {
                if !e.is_session_fatal() {
                    self.session.clear();
                }
                return Err(e);
            }
        };

        if self.session.epoch() != epoch {
            self.session.clear();
            return Err(superseded());
        }

        self.session.store_user(&user)?;
        self.session.set_state(AuthState::Authenticated(user.clone()));
        self.session.navigate(Route::Home);
        tracing::info!(username = %user.username, admin = user.is_admin(), "Signed in");
        Ok(user)
    }

    /// Store a new token; an already-expired one ends the session instead.
    fn adopt_token(&self, token: &str) -> ClientResult<()> {
        match jwt::inspect(token, Utc::now()) {
            TokenStatus::Expired(claims) => {
                tracing::info!(username = %claims.sub, "Issued token already expired");
                self.session.force_logout(LoginReason::SessionExpired);
                Err(ClientError::Unauthorized)
            }
            TokenStatus::Valid(_) | TokenStatus::Opaque => self.session.store_token(token),
        }
    }

    fn install_oauth_session(&self, token: &str, user: &User) -> ClientResult<()> {
        self.session.store_token(token)?;
        self.session.store_user(user)
    }

    fn reject_oauth(&self, reason: String) -> OAuthOutcome {
        tracing::warn!(reason = %reason, "OAuth2 redirect rejected");
        self.session.force_logout(LoginReason::OAuthFailed);
        OAuthOutcome::Rejected(reason)
    }
}

fn superseded() -> ClientError {
    ClientError::Conflict("Sign-in was superseded by a logout".into())
}
