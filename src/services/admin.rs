use std::sync::Arc;

use chrono::NaiveDate;

use crate::dto::{BabyRequest, UpdateRoleRequest, UserExpiryRequest, UserStatusRequest};
use crate::error::{ClientError, ClientResult};
use crate::http::ApiClient;
use crate::models::baby::Baby;
use crate::models::log::AuditLog;
use crate::models::user::{AdminUser, ROLE_ADMIN, ROLE_USER};
use crate::services::{upsert_sorted, SessionCache};
use crate::session::Session;

#[derive(Debug, Default)]
struct AdminState {
    users: Vec<AdminUser>,
    babies: Vec<Baby>,
    logs: Vec<AuditLog>,
}

/// Administrative views over every account, baby and audit entry.
///
/// All operations require the stored admin flag and fail with `Forbidden`
/// before touching the network when it is missing.
#[derive(Clone)]
pub struct AdminService {
    api: ApiClient,
    session: Arc<Session>,
    state: Arc<SessionCache<AdminState>>,
}

impl AdminService {
    pub fn new(api: ApiClient) -> Self {
        let session = api.session().clone();
        Self {
            api,
            state: Arc::new(SessionCache::new(session.clone())),
            session,
        }
    }

    pub async fn clear_cache(&self) {
        self.state.clear().await;
    }

    fn ensure_admin(&self) -> ClientResult<()> {
        if self.session.is_admin() {
            Ok(())
        } else {
            Err(ClientError::Forbidden("Administrator access required".into()))
        }
    }

    // ── Users ───────────────────────────────────────────────────────────────

    pub async fn users(&self) -> Vec<AdminUser> {
        self.state.read().await.users.clone()
    }

    pub async fn list_users(&self) -> ClientResult<Vec<AdminUser>> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let mut users: Vec<AdminUser> = self.api.get("/admin/users").await?;
        users.sort_by_key(|u| u.user_id);
        if let Some(mut state) = self.state.write(epoch).await {
            state.users = users.clone();
        }
        Ok(users)
    }

    pub async fn get_user(&self, user_id: i64) -> ClientResult<AdminUser> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let user: AdminUser = self.api.get(&format!("/admin/users/{}", user_id)).await?;
        self.cache_user(epoch, user.clone()).await;
        Ok(user)
    }

    /// Only `ROLE_USER` and `ROLE_ADMIN` are accepted.
    pub async fn update_user_role(&self, user_id: i64, role_name: &str) -> ClientResult<AdminUser> {
        self.ensure_admin()?;
        if role_name != ROLE_USER && role_name != ROLE_ADMIN {
            return Err(ClientError::Validation(format!("Unknown role {}", role_name)));
        }

        let epoch = self.state.epoch();
        let body = UpdateRoleRequest {
            role_name: role_name.to_string(),
        };
        let user: AdminUser = self
            .api
            .put(&format!("/admin/users/{}/role", user_id), &body)
            .await?;
        tracing::info!(user_id, role = %role_name, "User role updated");
        self.cache_user(epoch, user.clone()).await;
        Ok(user)
    }

    pub async fn update_user_status(
        &self,
        user_id: i64,
        status: UserStatusRequest,
    ) -> ClientResult<AdminUser> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let user: AdminUser = self
            .api
            .put(&format!("/admin/users/{}/status", user_id), &status)
            .await?;
        tracing::info!(user_id, enabled = status.enabled, "User status updated");
        self.cache_user(epoch, user.clone()).await;
        Ok(user)
    }

    /// `None` means "never expires".
    pub async fn update_user_expiry(
        &self,
        user_id: i64,
        account_expiry_date: Option<NaiveDate>,
        credentials_expiry_date: Option<NaiveDate>,
    ) -> ClientResult<AdminUser> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let body = UserExpiryRequest {
            account_expiry_date,
            credentials_expiry_date,
        };
        let user: AdminUser = self
            .api
            .put(&format!("/admin/users/{}/expiry", user_id), &body)
            .await?;
        self.cache_user(epoch, user.clone()).await;
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: i64) -> ClientResult<()> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        self.api.delete(&format!("/admin/users/{}", user_id)).await?;
        if let Some(mut state) = self.state.write(epoch).await {
            state.users.retain(|u| u.user_id != user_id);
        }
        tracing::info!(user_id, "User deleted");
        Ok(())
    }

    async fn cache_user(&self, epoch: u64, user: AdminUser) {
        if let Some(mut state) = self.state.write(epoch).await {
            upsert_sorted(&mut state.users, user, |u| u.user_id);
        }
    }

    // ── Babies ──────────────────────────────────────────────────────────────

    pub async fn babies(&self) -> Vec<Baby> {
        self.state.read().await.babies.clone()
    }

    pub async fn list_babies(&self) -> ClientResult<Vec<Baby>> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let mut babies: Vec<Baby> = self.api.get("/admin/babies").await?;
        babies.sort_by_key(|b| b.id);
        if let Some(mut state) = self.state.write(epoch).await {
            state.babies = babies.clone();
        }
        Ok(babies)
    }

    pub async fn update_baby(&self, baby_id: i64, body: BabyRequest) -> ClientResult<Baby> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let baby: Baby = self
            .api
            .put(&format!("/admin/babies/{}", baby_id), &body)
            .await?;
        if let Some(mut state) = self.state.write(epoch).await {
            upsert_sorted(&mut state.babies, baby.clone(), |b| b.id);
        }
        Ok(baby)
    }

    pub async fn delete_baby(&self, baby_id: i64) -> ClientResult<()> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        self.api.delete(&format!("/admin/babies/{}", baby_id)).await?;
        if let Some(mut state) = self.state.write(epoch).await {
            state.babies.retain(|b| b.id != baby_id);
        }
        tracing::info!(baby_id, "Baby deleted by administrator");
        Ok(())
    }

    // ── Audit logs ──────────────────────────────────────────────────────────

    pub async fn logs(&self) -> Vec<AuditLog> {
        self.state.read().await.logs.clone()
    }

    pub async fn list_logs(&self) -> ClientResult<Vec<AuditLog>> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        let mut logs: Vec<AuditLog> = self.api.get("/admin/logs").await?;
        logs.sort_by_key(|l| l.id);
        if let Some(mut state) = self.state.write(epoch).await {
            state.logs = logs.clone();
        }
        Ok(logs)
    }

    pub async fn delete_log(&self, log_id: i64) -> ClientResult<()> {
        self.ensure_admin()?;
        let epoch = self.state.epoch();
        self.api.delete(&format!("/admin/logs/{}", log_id)).await?;
        if let Some(mut state) = self.state.write(epoch).await {
            state.logs.retain(|l| l.id != log_id);
        }
        Ok(())
    }
}
