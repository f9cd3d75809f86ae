pub mod admin;
pub mod babies;
pub mod measurements;
pub mod records;

pub use admin::AdminService;
pub use babies::BabyService;
pub use measurements::MeasurementService;
pub use records::RecordService;

use std::sync::Arc;

use tokio::sync::{RwLock, RwLockMappedWriteGuard, RwLockReadGuard, RwLockWriteGuard};

use crate::session::Session;

struct Slot<T> {
    epoch: u64,
    value: T,
}

/// Per-service cache bound to one signed-in session.
///
/// Every value is tagged with the session epoch it was loaded under. Once the
/// session is cleared (logout, forced logout, expired token) the tag no longer
/// matches and the next access sees `T::default()`.
pub(crate) struct SessionCache<T> {
    session: Arc<Session>,
    slot: RwLock<Slot<T>>,
}

impl<T: Default> SessionCache<T> {
    pub fn new(session: Arc<Session>) -> Self {
        let epoch = session.epoch();
        Self {
            session,
            slot: RwLock::new(Slot {
                epoch,
                value: T::default(),
            }),
        }
    }

    /// Current session epoch; capture it before a request and pass it to `write`.
    pub fn epoch(&self) -> u64 {
        self.session.epoch()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, T> {
        let epoch = self.session.epoch();
        let slot = self.slot.read().await;
        if slot.epoch == epoch {
            return RwLockReadGuard::map(slot, |s| &s.value);
        }
        drop(slot);

        let mut slot = self.slot.write().await;
        reset_if_stale(&mut *slot, epoch);
        RwLockReadGuard::map(slot.downgrade(), |s| &s.value)
    }

    /// Write access for data fetched under `epoch`; `None` once that session is gone.
    pub async fn write(&self, epoch: u64) -> Option<RwLockMappedWriteGuard<'_, T>> {
        let mut slot = self.slot.write().await;
        if self.session.epoch() != epoch {
            tracing::debug!(epoch, "Discarding result of a previous session");
            return None;
        }
        reset_if_stale(&mut *slot, epoch);
        Some(RwLockWriteGuard::map(slot, |s| &mut s.value))
    }

    pub async fn clear(&self) {
        let mut slot = self.slot.write().await;
        slot.epoch = self.session.epoch();
        slot.value = T::default();
    }
}

fn reset_if_stale<T: Default>(slot: &mut Slot<T>, epoch: u64) {
    if slot.epoch != epoch {
        slot.epoch = epoch;
        slot.value = T::default();
    }
}

/// Replace the entry with the same key (or append), then re-sort by key.
pub(crate) fn upsert_sorted<T, K, F>(items: &mut Vec<T>, item: T, key: F)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let k = key(&item);
    match items.iter().position(|existing| key(existing) == k) {
        Some(idx) => items[idx] = item,
        None => items.push(item),
    }
    items.sort_by_key(|e| key(e));
}
