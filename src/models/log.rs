use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Audit trail entry shown in the admin panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: i64,
    pub username: String,
    pub action: String,
    #[serde(default)]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}
