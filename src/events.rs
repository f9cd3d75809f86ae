//! Cross-service notifications.
//!
//! Record and measurement services report their mutations through
//! [`BabyObserver`]; the baby service implements it and keeps the current
//! baby snapshot consistent. UI layers subscribe to [`EventBus`] to learn
//! when cached baby data changed.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::ClientResult;
use crate::models::measurement::Measurement;

/// A nested-resource mutation that may stale the baby snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum DataChange {
    RecordsChanged {
        baby_id: i64,
    },
    MeasurementsChanged {
        baby_id: i64,
    },
    MeasurementAdded {
        baby_id: i64,
        measurement: Measurement,
        /// Strictly later than every measurement known before the add.
        is_latest: bool,
    },
}

impl DataChange {
    pub fn baby_id(&self) -> i64 {
        match self {
            DataChange::RecordsChanged { baby_id }
            | DataChange::MeasurementsChanged { baby_id }
            | DataChange::MeasurementAdded { baby_id, .. } => *baby_id,
        }
    }
}

#[async_trait]
pub trait BabyObserver: Send + Sync {
    async fn on_change(&self, change: DataChange) -> ClientResult<()>;
}

/// Observer that ignores everything; for services used on their own.
pub struct NoopObserver;

#[async_trait]
impl BabyObserver for NoopObserver {
    async fn on_change(&self, _change: DataChange) -> ClientResult<()> {
        Ok(())
    }
}

/// Baby cache change published to UI subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum BabyEvent {
    ListLoaded,
    Added(i64),
    Updated(i64),
    Removed(i64),
    SelectionChanged(Option<i64>),
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BabyEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BabyEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: BabyEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
