use std::sync::Arc;

use async_trait::async_trait;
use url::form_urlencoded;
use validator::Validate;

use crate::dto::{BabyRequest, BabyUpdateForm, ExistsResponse, NewBabyForm};
use crate::error::{ClientError, ClientResult};
use crate::events::{BabyEvent, BabyObserver, DataChange, EventBus};
use crate::http::ApiClient;
use crate::models::baby::{ensure_owner_is_caregiver, Baby};
use crate::models::measurement::Measurement;
use crate::services::{upsert_sorted, SessionCache};
use crate::session::Session;

#[derive(Debug, Default)]
struct BabyState {
    babies: Vec<Baby>,
    current: Option<Baby>,
}

/// The signed-in user's babies and the currently selected one.
#[derive(Clone)]
pub struct BabyService {
    api: ApiClient,
    session: Arc<Session>,
    state: Arc<SessionCache<BabyState>>,
    events: EventBus,
}

impl BabyService {
    pub fn new(api: ApiClient, events: EventBus) -> Self {
        let session = api.session().clone();
        Self {
            api,
            state: Arc::new(SessionCache::new(session.clone())),
            session,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Forget cached babies without touching the stored selection.
    pub async fn clear_cache(&self) {
        self.state.clear().await;
    }

    pub async fn babies(&self) -> Vec<Baby> {
        self.state.read().await.babies.clone()
    }

    pub async fn current(&self) -> Option<Baby> {
        self.state.read().await.current.clone()
    }

    pub async fn current_id(&self) -> Option<i64> {
        self.state.read().await.current.as_ref().map(|b| b.id)
    }

    pub async fn list(&self) -> ClientResult<Vec<Baby>> {
        let epoch = self.state.epoch();
        let mut babies: Vec<Baby> = self.api.get("/babies").await?;
        babies.sort_by_key(|b| b.id);

        if let Some(mut state) = self.state.write(epoch).await {
            state.babies = babies.clone();
        }
        self.events.publish(BabyEvent::ListLoaded);
        Ok(babies)
    }

    pub async fn select(&self, id: i64) -> ClientResult<Baby> {
        let epoch = self.state.epoch();
        let baby: Baby = self.api.get(&format!("/babies/{}", id)).await?;
        {
            let Some(mut state) = self.state.write(epoch).await else {
                return Err(ClientError::Conflict("Session ended while loading baby".into()));
            };
            upsert_sorted(&mut state.babies, baby.clone(), |b| b.id);
            state.current = Some(baby.clone());
        }
        self.session.store_current_baby_id(Some(id))?;
        self.events.publish(BabyEvent::SelectionChanged(Some(id)));
        Ok(baby)
    }

    pub async fn clear_selection(&self) -> ClientResult<()> {
        if let Some(mut state) = self.state.write(self.state.epoch()).await {
            state.current = None;
        }
        self.session.store_current_baby_id(None)?;
        self.events.publish(BabyEvent::SelectionChanged(None));
        Ok(())
    }

    /// Re-select the baby remembered in storage, forgetting it if it is gone.
    pub async fn restore_selection(&self) -> ClientResult<Option<Baby>> {
        let Some(id) = self.session.current_baby_id() else {
            return Ok(None);
        };
        match self.select(id).await {
            Ok(baby) => Ok(Some(baby)),
            Err(ClientError::NotFound(_)) => {
                tracing::debug!(baby_id = id, "Stored baby selection no longer exists");
                self.clear_selection().await?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn add(&self, form: NewBabyForm) -> ClientResult<Baby> {
        form.validate()?;
        let owner = self.session.require_username()?;
        let epoch = self.state.epoch();

        let body = BabyRequest {
            name: form.name.trim().to_string(),
            gender: form.gender,
            date_of_birth: form.date_of_birth,
            weight: form.weight,
            height: form.height,
            head_circumference: form.head_circumference,
            caregivers: vec![owner.clone()],
            owner,
        };
        let baby: Baby = self.api.post("/babies", &body).await?;

        if let Some(mut state) = self.state.write(epoch).await {
            upsert_sorted(&mut state.babies, baby.clone(), |b| b.id);
        }
        self.events.publish(BabyEvent::Added(baby.id));
        tracing::info!(baby_id = baby.id, "Baby added");
        Ok(baby)
    }

    /// Owner-only. Every caregiver must be a distinct, existing username.
    pub async fn update(&self, id: i64, form: BabyUpdateForm) -> ClientResult<Baby> {
        form.validate()?;
        let epoch = self.state.epoch();
        let existing = self.owned_baby(id).await?;

        let mut caregivers: Vec<String> =
            form.caregivers.iter().map(|c| c.trim().to_string()).collect();
        for username in caregivers.iter().filter(|c| **c != existing.owner) {
            self.ensure_user_exists(username).await?;
        }
        ensure_owner_is_caregiver(&existing.owner, &mut caregivers);

        let body = BabyRequest {
            name: form.name.trim().to_string(),
            gender: form.gender,
            date_of_birth: form.date_of_birth,
            weight: form.weight,
            height: form.height,
            head_circumference: form.head_circumference,
            caregivers,
            owner: existing.owner.clone(),
        };
        let mut baby: Baby = self.api.put(&format!("/babies/{}", id), &body).await?;
        ensure_owner_is_caregiver(&baby.owner.clone(), &mut baby.caregivers);
        if baby.records.is_empty() && baby.measurements.is_empty() {
            baby.records = existing.records;
            baby.measurements = existing.measurements;
        }

        self.replace_cached(epoch, baby.clone()).await;
        self.events.publish(BabyEvent::Updated(id));
        tracing::info!(baby_id = id, "Baby updated");
        Ok(baby)
    }

    /// Owner-only. Records and measurements are removed server-side.
    pub async fn delete(&self, id: i64) -> ClientResult<()> {
        let epoch = self.state.epoch();
        self.owned_baby(id).await?;
        self.api.delete(&format!("/babies/{}", id)).await?;

        let was_selected = match self.state.write(epoch).await {
            Some(mut state) => {
                state.babies.retain(|b| b.id != id);
                let selected = state.current.as_ref().map(|b| b.id) == Some(id);
                if selected {
                    state.current = None;
                }
                selected
            }
            None => false,
        };

        if was_selected {
            self.session.store_current_baby_id(None)?;
            self.events.publish(BabyEvent::SelectionChanged(None));
        }
        self.events.publish(BabyEvent::Removed(id));
        tracing::info!(baby_id = id, "Baby deleted");
        Ok(())
    }

    /// Refetch the selected baby, if any.
    pub async fn refresh_current(&self) -> ClientResult<Option<Baby>> {
        let epoch = self.state.epoch();
        let Some(id) = self.current_id().await else {
            return Ok(None);
        };
        let baby: Baby = self.api.get(&format!("/babies/{}", id)).await?;
        self.replace_cached(epoch, baby.clone()).await;
        self.events.publish(BabyEvent::Updated(id));
        Ok(Some(baby))
    }

    /// Overlay a measurement's readings onto the cached copies of a baby.
    pub async fn apply_headline(&self, baby_id: i64, measurement: &Measurement) {
        let Some(mut state) = self.state.write(self.state.epoch()).await else {
            return;
        };
        if let Some(baby) = state.babies.iter_mut().find(|b| b.id == baby_id) {
            baby.apply_headline(measurement);
        }
        if let Some(baby) = state.current.as_mut().filter(|b| b.id == baby_id) {
            baby.apply_headline(measurement);
        }
    }

    async fn replace_cached(&self, epoch: u64, baby: Baby) {
        let Some(mut state) = self.state.write(epoch).await else {
            return;
        };
        if state.current.as_ref().map(|b| b.id) == Some(baby.id) {
            state.current = Some(baby.clone());
        }
        upsert_sorted(&mut state.babies, baby, |b| b.id);
    }

    /// Cached (or fetched) baby, if the signed-in user owns it.
    async fn owned_baby(&self, id: i64) -> ClientResult<Baby> {
        let username = self.session.require_username()?;

        let cached = {
            let state = self.state.read().await;
            state
                .current
                .iter()
                .chain(state.babies.iter())
                .find(|b| b.id == id)
                .cloned()
        };
        let baby = match cached {
            Some(baby) => baby,
            None => self.api.get(&format!("/babies/{}", id)).await?,
        };

        if !baby.is_owner(&username) {
            return Err(ClientError::Forbidden(
                "Only the owner can change this baby".into(),
            ));
        }
        Ok(baby)
    }

    async fn ensure_user_exists(&self, username: &str) -> ClientResult<()> {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("username", username)
            .finish();
        let resp: ExistsResponse = self.api.get(&format!("/users/exists?{}", query)).await?;
        if !resp.exists {
            return Err(ClientError::Validation(format!(
                "User {} does not exist",
                username
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BabyObserver for BabyService {
    async fn on_change(&self, change: DataChange) -> ClientResult<()> {
        let baby_id = change.baby_id();
        if self.current_id().await == Some(baby_id) {
            self.refresh_current().await?;
        }

        if let DataChange::MeasurementAdded {
            measurement,
            is_latest: true,
            ..
        } = &change
        {
            self.apply_headline(baby_id, measurement).await;
            self.events.publish(BabyEvent::Updated(baby_id));
        }
        Ok(())
    }
}
