use std::sync::Arc;

use validator::Validate;

use crate::dto::MeasurementForm;
use crate::error::ClientResult;
use crate::events::{BabyObserver, DataChange};
use crate::http::ApiClient;
use crate::models::measurement::{self, Measurement};
use crate::services::SessionCache;

#[derive(Debug, Default)]
struct MeasurementState {
    baby_id: Option<i64>,
    measurements: Vec<Measurement>,
}

impl MeasurementState {
    /// Oldest first, so the last entry is the headline reading.
    fn sort(&mut self) {
        self.measurements
            .sort_by(|a, b| a.time.cmp(&b.time).then(a.id.cmp(&b.id)));
    }
}

/// Growth measurements of one baby at a time.
#[derive(Clone)]
pub struct MeasurementService {
    api: ApiClient,
    state: Arc<SessionCache<MeasurementState>>,
    observer: Arc<dyn BabyObserver>,
}

impl MeasurementService {
    pub fn new(api: ApiClient, observer: Arc<dyn BabyObserver>) -> Self {
        Self {
            state: Arc::new(SessionCache::new(api.session().clone())),
            api,
            observer,
        }
    }

    pub async fn clear_cache(&self) {
        self.state.clear().await;
    }

    pub async fn measurements(&self) -> Vec<Measurement> {
        self.state.read().await.measurements.clone()
    }

    pub async fn list(&self, baby_id: i64) -> ClientResult<Vec<Measurement>> {
        let epoch = self.state.epoch();
        let measurements: Vec<Measurement> = self.api.get(&measurements_path(baby_id)).await?;

        let mut fresh = MeasurementState {
            baby_id: Some(baby_id),
            measurements,
        };
        fresh.sort();
        let measurements = fresh.measurements.clone();
        if let Some(mut state) = self.state.write(epoch).await {
            *state = fresh;
        }
        Ok(measurements)
    }

    /// Adds a measurement. If it is strictly later than every earlier one,
    /// the baby's headline readings follow it.
    pub async fn add(&self, baby_id: i64, form: MeasurementForm) -> ClientResult<Measurement> {
        form.validate()?;

        let epoch = self.state.epoch();
        let history = self.history(baby_id).await?;
        let created: Measurement = self.api.post(&measurements_path(baby_id), &form).await?;
        let is_latest = measurement::is_latest(created.time, &history);

        if let Some(mut state) = self.state.write(epoch).await {
            if state.baby_id == Some(baby_id) {
                state.measurements.push(created.clone());
                state.sort();
            }
        }
        tracing::info!(baby_id, measurement_id = created.id, is_latest, "Measurement added");

        self.notify(DataChange::MeasurementAdded {
            baby_id,
            measurement: created.clone(),
            is_latest,
        })
        .await;
        Ok(created)
    }

    pub async fn update(
        &self,
        baby_id: i64,
        measurement_id: i64,
        form: MeasurementForm,
    ) -> ClientResult<Measurement> {
        form.validate()?;
        let epoch = self.state.epoch();
        let path = format!("{}/{}", measurements_path(baby_id), measurement_id);
        let updated: Measurement = self.api.put(&path, &form).await?;

        if let Some(mut state) = self.state.write(epoch).await {
            if state.baby_id == Some(baby_id) {
                match state.measurements.iter_mut().find(|m| m.id == measurement_id) {
                    Some(existing) => *existing = updated.clone(),
                    None => state.measurements.push(updated.clone()),
                }
                state.sort();
            }
        }

        self.notify(DataChange::MeasurementsChanged { baby_id }).await;
        Ok(updated)
    }

    pub async fn delete(&self, baby_id: i64, measurement_id: i64) -> ClientResult<()> {
        let epoch = self.state.epoch();
        self.api
            .delete(&format!("{}/{}", measurements_path(baby_id), measurement_id))
            .await?;

        if let Some(mut state) = self.state.write(epoch).await {
            if state.baby_id == Some(baby_id) {
                state.measurements.retain(|m| m.id != measurement_id);
            }
        }
        tracing::info!(baby_id, measurement_id, "Measurement deleted");

        self.notify(DataChange::MeasurementsChanged { baby_id }).await;
        Ok(())
    }

    /// Known measurements for `baby_id`, loading them if the cache holds another baby.
    async fn history(&self, baby_id: i64) -> ClientResult<Vec<Measurement>> {
        {
            let state = self.state.read().await;
            if state.baby_id == Some(baby_id) {
                return Ok(state.measurements.clone());
            }
        }
        self.list(baby_id).await
    }

    async fn notify(&self, change: DataChange) {
        let baby_id = change.baby_id();
        if let Err(e) = self.observer.on_change(change).await {
            tracing::warn!(baby_id, error = %e, "Failed to refresh baby after measurement change");
        }
    }
}

fn measurements_path(baby_id: i64) -> String {
    format!("/babies/{}/measurements", baby_id)
}
