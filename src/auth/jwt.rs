use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ClientResult;
use crate::models::user::{Role, User, ROLE_ADMIN, ROLE_USER};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub roles: Option<RoleClaim>,
}

/// Backends emit roles either as a list or as one comma-joined string.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum RoleClaim {
    List(Vec<String>),
    Joined(String),
}

impl Claims {
    pub fn roles(&self) -> Vec<String> {
        match &self.roles {
            Some(RoleClaim::List(list)) => list.clone(),
            Some(RoleClaim::Joined(joined)) => joined
                .split(',')
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.roles().iter().any(|r| r == ROLE_ADMIN)
    }

    /// A token without `exp` never expires on the client side.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.exp {
            Some(exp) => exp <= now.timestamp(),
            None => false,
        }
    }

    /// User snapshot derived from the token alone (OAuth2 sign-in).
    pub fn to_user(&self) -> User {
        let role = if self.is_admin() { ROLE_ADMIN } else { ROLE_USER };
        User {
            username: self.sub.clone(),
            email: self.email.clone(),
            role: Role::named(role),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenStatus {
    Valid(Claims),
    Expired(Claims),
    /// Not a JWT; only the server can judge it.
    Opaque,
}

/// Read the claims without checking the signature.
///
/// The client holds no key material. It only needs `exp` and the roles;
/// the server still verifies every request.
pub fn decode_unverified(token: &str) -> ClientResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

pub fn inspect(token: &str, now: DateTime<Utc>) -> TokenStatus {
    match decode_unverified(token) {
        Ok(claims) if claims.is_expired_at(now) => TokenStatus::Expired(claims),
        Ok(claims) => TokenStatus::Valid(claims),
        Err(e) => {
            tracing::debug!(error = %e, "Token is not a decodable JWT");
            TokenStatus::Opaque
        }
    }
}
