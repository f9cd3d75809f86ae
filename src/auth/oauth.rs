use std::collections::HashSet;
use std::sync::Mutex;

use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::models::user::User;

/// Query parameters delivered by the identity provider's redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OAuthCallback {
    Token(String),
    Error(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OAuthOutcome {
    SignedIn(User),
    Rejected(String),
    AlreadyProcessed,
}

/// Parse an absolute or path-relative redirect URL.
///
/// An `error` parameter wins over a `token` parameter.
pub fn parse_callback(raw: &str) -> ClientResult<OAuthCallback> {
    let url = match Url::parse(raw) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse("http://localhost")
            .and_then(|base| base.join(raw))
            .map_err(|e| ClientError::Validation(format!("Invalid redirect URL: {}", e)))?,
        Err(e) => return Err(ClientError::Validation(format!("Invalid redirect URL: {}", e))),
    };

    let mut token = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "token" if !value.is_empty() => token = Some(value.into_owned()),
            "error" if !value.is_empty() => error = Some(value.into_owned()),
            _ => {}
        }
    }

    Ok(match (error, token) {
        (Some(error), _) => OAuthCallback::Error(error),
        (None, Some(token)) => OAuthCallback::Token(token),
        (None, None) => OAuthCallback::Missing,
    })
}

/// Remembers which redirect URLs were already consumed.
#[derive(Default)]
pub struct OAuthGuard {
    processed: Mutex<HashSet<String>>,
}

impl OAuthGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once per distinct URL.
    pub fn claim(&self, url: &str) -> bool {
        match self.processed.lock() {
            Ok(mut processed) => processed.insert(url.to_string()),
            Err(_) => false,
        }
    }

    /// Forget a claimed URL whose processing failed.
    pub fn release(&self, url: &str) {
        if let Ok(mut processed) = self.processed.lock() {
            processed.remove(url);
        }
    }
}
