use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use promptrelay_core_types::{timestamp_now, DeliveryId, SiteId};

use crate::{PendingPayload, PendingStore, StoreDocument, StoreError};

/// Process-local store with the same semantics as the file store.
#[derive(Default)]
pub struct InMemoryPendingStore {
    doc: Mutex<StoreDocument>,
}

impl InMemoryPendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StoreDocument {
        self.doc.lock().clone()
    }
}

#[async_trait]
impl PendingStore for InMemoryPendingStore {
    async fn put(&self, payload: PendingPayload) -> Result<(), StoreError> {
        self.doc.lock().put(payload);
        Ok(())
    }

    async fn take(&self, site: SiteId) -> Result<Option<PendingPayload>, StoreError> {
        Ok(self.doc.lock().take(site))
    }

    async fn remove(&self, id: &DeliveryId) -> Result<bool, StoreError> {
        Ok(self.doc.lock().remove(id))
    }

    async fn list(&self) -> Result<Vec<PendingPayload>, StoreError> {
        Ok(self.doc.lock().list())
    }

    async fn clear(&self) -> Result<usize, StoreError> {
        Ok(self.doc.lock().clear())
    }

    async fn try_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, StoreError> {
        Ok(self.doc.lock().try_lock(key, owner, ttl, timestamp_now()))
    }

    async fn release(&self, key: &str, owner: &str) -> Result<(), StoreError> {
        self.doc.lock().release(key, owner);
        Ok(())
    }
}
