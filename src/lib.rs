pub mod auth;
pub mod config;
pub mod dto;
pub mod error;
pub mod events;
pub mod guide;
pub mod http;
pub mod models;
pub mod navigation;
pub mod services;
pub mod session;
pub mod storage;
pub mod telemetry;

use std::sync::Arc;

pub use auth::{AuthService, AuthState, LoginOutcome, OAuthOutcome};
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use events::{BabyEvent, BabyObserver, DataChange, EventBus};
pub use guide::GrowthGuideBook;
pub use http::ApiClient;
pub use navigation::{LoginReason, Navigator, Route};
pub use services::{AdminService, BabyService, MeasurementService, RecordService};
pub use session::Session;
pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// Every client-side service, wired to one shared session.
#[derive(Clone)]
pub struct BabyTracker {
    pub config: Arc<Config>,
    pub session: Arc<Session>,
    pub api: ApiClient,
    pub auth: AuthService,
    pub babies: BabyService,
    pub records: RecordService,
    pub measurements: MeasurementService,
    pub admin: AdminService,
    pub guide: Arc<GrowthGuideBook>,
}

impl BabyTracker {
    pub fn new(
        config: Config,
        storage: Arc<dyn SessionStorage>,
        navigator: Arc<dyn Navigator>,
    ) -> ClientResult<Self> {
        let config = Arc::new(config);
        let session = Arc::new(Session::new(storage, navigator));
        let api = ApiClient::new(&config, session.clone())?;

        let babies = BabyService::new(api.clone(), EventBus::default());
        let observer: Arc<dyn BabyObserver> = Arc::new(babies.clone());

        tracing::debug!(api = %config.api_base(), "Client services initialised");

        Ok(Self {
            auth: AuthService::new(api.clone()),
            records: RecordService::new(api.clone(), observer.clone()),
            measurements: MeasurementService::new(api.clone(), observer),
            admin: AdminService::new(api.clone()),
            guide: Arc::new(GrowthGuideBook::embedded()?),
            babies,
            api,
            session,
            config,
        })
    }

    /// Persist to `config.session_file` when set, otherwise keep the session in memory.
    pub fn from_config(config: Config, navigator: Arc<dyn Navigator>) -> ClientResult<Self> {
        let storage: Arc<dyn SessionStorage> = match &config.session_file {
            Some(path) => Arc::new(FileStorage::open(path)?),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::new(config, storage, navigator)
    }

    /// Sign out and release every service cache right away.
    ///
    /// Caches are already invisible after any session clear; this frees them.
    pub async fn logout(&self) {
        self.auth.logout();
        self.babies.clear_cache().await;
        self.records.clear_cache().await;
        self.measurements.clear_cache().await;
        self.admin.clear_cache().await;
    }

    /// Restore the stored session and the previously selected baby.
    pub async fn resume(&self) -> ClientResult<Option<models::User>> {
        let user = self.auth.restore().await?;
        if user.is_some() {
            self.babies.list().await?;
            self.babies.restore_selection().await?;
        }
        Ok(user)
    }
}
