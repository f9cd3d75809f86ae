use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "ROLE_USER";
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default)]
    pub role_id: Option<i64>,
    pub role_name: String,
}

impl Role {
    pub fn named(role_name: impl Into<String>) -> Self {
        Self {
            role_id: None,
            role_name: role_name.into(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role_name == ROLE_ADMIN
    }
}

/// Signed-in user snapshot, as returned by `GET /auth/user`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Administrative view of an account (`/admin/users`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub user_id: i64,
    pub user_name: String,
    #[serde(default)]
    pub email: Option<String>,
    pub account_non_locked: bool,
    pub account_non_expired: bool,
    pub credentials_non_expired: bool,
    pub enabled: bool,
    /// `None` means the account never expires.
    #[serde(default, with = "never_expires")]
    pub account_expiry_date: Option<NaiveDate>,
    /// `None` means the credentials never expire.
    #[serde(default, with = "never_expires")]
    pub credentials_expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub two_factor_enabled: bool,
    #[serde(default)]
    pub sign_up_method: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_date: Option<DateTime<Utc>>,
}

/// Serde adapter for the backend's "never expires" date.
///
/// The API encodes "no expiry" as `9999-12-31`; the client models it as
/// `None`. Reads map the sentinel (and `null`) to `None`; writes map `None`
/// back to the sentinel.
pub mod never_expires {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const SENTINEL: &str = "9999-12-31";
    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
            None => serializer.serialize_str(SENTINEL),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        // Accept both dates and ISO timestamps; only the date part matters.
        let date_part = raw.get(..10).unwrap_or(&raw);
        if date_part == SENTINEL {
            return Ok(None);
        }
        NaiveDate::parse_from_str(date_part, FORMAT)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }
}
