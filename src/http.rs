use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::dto::CsrfTokenResponse;
use crate::error::{ClientError, ClientResult, GENERIC_ERROR_MESSAGE};
use crate::navigation::LoginReason;
use crate::session::Session;

pub const CSRF_HEADER: &str = "X-XSRF-TOKEN";
pub const CSRF_PATH: &str = "/csrf-token";
const PUBLIC_PREFIX: &str = "/auth/public/";

/// Paths that are called without a bearer token or CSRF header.
pub fn is_public(path: &str) -> bool {
    path == CSRF_PATH || path.starts_with(PUBLIC_PREFIX)
}

/// JSON client for `{API_URL}/api`.
///
/// Protected calls carry `Authorization: Bearer` and `X-XSRF-TOKEN`. A
/// missing token, a 401, or a disabled-account 403 ends the session before
/// the error is returned. Nothing is retried.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
    session: Arc<Session>,
    csrf_lock: Arc<Mutex<()>>,
}

impl ApiClient {
    pub fn new(config: &Config, session: Arc<Session>) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().cookie_store(true);
        if let Some(timeout) = config.http_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base: config.api_base(),
            session,
            csrf_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let raw = self.execute::<()>(Method::GET, path, None).await?;
        decode_body(&raw)
    }

    pub async fn post<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let raw = self.execute(Method::POST, path, Some(body)).await?;
        decode_body(&raw)
    }

    /// POST whose response is plain text (or ignored).
    pub async fn post_text<B>(&self, path: &str, body: Option<&B>) -> ClientResult<String>
    where
        B: Serialize + ?Sized,
    {
        self.execute(Method::POST, path, body).await
    }

    pub async fn put<B, T>(&self, path: &str, body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let raw = self.execute(Method::PUT, path, Some(body)).await?;
        decode_body(&raw)
    }

    /// DELETE; the response body is discarded.
    pub async fn delete(&self, path: &str) -> ClientResult<()> {
        self.execute::<()>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Fetch a fresh CSRF token and cache it in the session.
    pub async fn fetch_csrf_token(&self) -> ClientResult<String> {
        let url = format!("{}{}", self.base, CSRF_PATH);
        let resp = self.http.get(&url).send().await?.error_for_status()?;
        let body: CsrfTokenResponse = resp.json().await?;
        self.session.store_csrf_token(&body.token)?;
        tracing::debug!("CSRF token refreshed");
        Ok(body.token)
    }

    pub fn clear_csrf_token(&self) -> ClientResult<()> {
        self.session.clear_csrf_token()
    }

    /// Cached token, fetching it once if absent. A failed fetch yields `None`.
    async fn csrf_token(&self) -> Option<String> {
        if let Some(token) = self.session.csrf_token() {
            return Some(token);
        }

        let _guard = self.csrf_lock.lock().await;
        if let Some(token) = self.session.csrf_token() {
            return Some(token);
        }

        match self.fetch_csrf_token().await {
            Ok(token) => Some(token),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch CSRF token, sending request without it");
                None
            }
        }
    }

    async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> ClientResult<String>
    where
        B: Serialize + ?Sized,
    {
        let public = is_public(path);
        let url = format!("{}{}", self.base, path);
        let mut req = self.http.request(method.clone(), &url);

        if !public {
            let Some(token) = self.session.token() else {
                tracing::warn!(path = %path, "No session token for protected endpoint");
                self.session.force_logout(LoginReason::SignedOut);
                return Err(ClientError::Unauthorized);
            };
            req = req.bearer_auth(token);
            if let Some(csrf) = self.csrf_token().await {
                req = req.header(CSRF_HEADER, csrf);
            }
        }

        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(method = %method, path = %path, "API request");
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status.is_success() {
            return Ok(text);
        }

        let message = extract_message(&text);
        tracing::debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            message = message.as_deref().unwrap_or(""),
            "API request failed"
        );

        if status == StatusCode::FORBIDDEN {
            if message.as_deref().map(is_disabled_message).unwrap_or(false) {
                self.session.force_logout(LoginReason::AccountDisabled);
                return Err(ClientError::AccountDisabled);
            }
            if !public {
                return Err(ClientError::Forbidden(
                    message.unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string()),
                ));
            }
        }

        if status == StatusCode::UNAUTHORIZED && !public {
            self.session.force_logout(LoginReason::SessionExpired);
            return Err(ClientError::Unauthorized);
        }

        Err(ClientError::from_status(status, message))
    }
}

fn decode_body<T: DeserializeOwned>(raw: &str) -> ClientResult<T> {
    if raw.trim().is_empty() {
        return Ok(serde_json::from_str("null")?);
    }
    Ok(serde_json::from_str(raw)?)
}

/// Pull a human-readable message out of an error body.
fn extract_message(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) => {
            let candidates = [
                value.get("message"),
                value.get("error").filter(|v| v.is_string()),
                value.get("error").and_then(|e| e.get("message")),
            ];
            candidates
                .into_iter()
                .flatten()
                .filter_map(|v| v.as_str())
                .map(|s| s.trim().to_string())
                .find(|s| !s.is_empty())
        }
        // Some endpoints answer errors as plain text.
        Err(_) if raw.len() <= 300 && !raw.starts_with('<') => Some(raw.to_string()),
        Err(_) => None,
    }
}

fn is_disabled_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains("disabled")
}
