use std::sync::Arc;

use validator::Validate;

use crate::dto::RecordForm;
use crate::error::ClientResult;
use crate::events::{BabyObserver, DataChange};
use crate::http::ApiClient;
use crate::models::record::Record;
use crate::services::SessionCache;

#[derive(Debug, Default)]
struct RecordState {
    baby_id: Option<i64>,
    records: Vec<Record>,
}

impl RecordState {
    /// Newest first.
    fn sort(&mut self) {
        self.records
            .sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
    }
}

/// Activity records of one baby at a time.
#[derive(Clone)]
pub struct RecordService {
    api: ApiClient,
    state: Arc<SessionCache<RecordState>>,
    observer: Arc<dyn BabyObserver>,
}

impl RecordService {
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

    pub async fn records(&self) -> Vec<Record> {
        self.state.read().await.records.clone()
    }

    pub async fn list(&self, baby_id: i64) -> ClientResult<Vec<Record>> {
        let epoch = self.state.epoch();
        let records: Vec<Record> = self.api.get(&records_path(baby_id)).await?;

        let mut fresh = RecordState {
            baby_id: Some(baby_id),
            records,
        };
        fresh.sort();
        let records = fresh.records.clone();
        if let Some(mut state) = self.state.write(epoch).await {
            *state = fresh;
        }
        Ok(records)
    }

    pub async fn add(&self, baby_id: i64, form: RecordForm) -> ClientResult<Record> {
        form.validate()?;
        let epoch = self.state.epoch();
        let record: Record = self.api.post(&records_path(baby_id), &form).await?;

        self.splice(epoch, baby_id, |records| records.push(record.clone()))
            .await;
        tracing::info!(baby_id, record_id = record.id, "Record added");
        self.notify(baby_id).await;
        Ok(record)
    }

    pub async fn update(&self, baby_id: i64, record_id: i64, form: RecordForm) -> ClientResult<Record> {
        form.validate()?;
        let epoch = self.state.epoch();
        let path = format!("{}/{}", records_path(baby_id), record_id);
        let record: Record = self.api.put(&path, &form).await?;

        self.splice(epoch, baby_id, |records| {
            match records.iter_mut().find(|r| r.id == record_id) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        })
        .await;
        self.notify(baby_id).await;
        Ok(record)
    }

    pub async fn delete(&self, baby_id: i64, record_id: i64) -> ClientResult<()> {
        let epoch = self.state.epoch();
        self.api
            .delete(&format!("{}/{}", records_path(baby_id), record_id))
            .await?;

        self.splice(epoch, baby_id, |records| records.retain(|r| r.id != record_id))
            .await;
        tracing::info!(baby_id, record_id, "Record deleted");
        self.notify(baby_id).await;
        Ok(())
    }

    /// Apply `f` only when the cache holds this baby's records.
    async fn splice<F>(&self, epoch: u64, baby_id: i64, f: F)
    where
        F: FnOnce(&mut Vec<Record>),
    {
        let Some(mut state) = self.state.write(epoch).await else {
            return;
        };
        if state.baby_id == Some(baby_id) {
            f(&mut state.records);
            state.sort();
        }
    }

    async fn notify(&self, baby_id: i64) {
        if let Err(e) = self
            .observer
            .on_change(DataChange::RecordsChanged { baby_id })
            .await
        {
            tracing::warn!(baby_id, error = %e, "Failed to refresh baby after record change");
        }
    }
}

fn records_path(baby_id: i64) -> String {
    format!("/babies/{}/records", baby_id)
}
