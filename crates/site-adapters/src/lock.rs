//! Process flag plus storage lock record for sites that must not receive two prompts at once,
//! and the per-delivery claim every driver takes.
//!
//! Neither half is linearizable with the other. The storage record only narrows the window in
//! which two processes can both deliver to the same site, and its TTL covers a crashed holder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pending_store::{PendingStore, StoreError};
use promptrelay_core_types::{DeliveryId, SiteId};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct DualLock {
    site: SiteId,
    local: Arc<AtomicBool>,
    store: Arc<dyn PendingStore>,
    ttl: Duration,
}

impl DualLock {
    pub fn new(site: SiteId, store: Arc<dyn PendingStore>, ttl: Duration) -> Self {
        Self {
            site,
            local: Arc::new(AtomicBool::new(false)),
            store,
            ttl,
        }
    }

    pub fn key(&self) -> String {
        format!("deliver:{}", self.site)
    }

    /// `Ok(None)` when either half is already held elsewhere.
    pub async fn acquire(&self, owner: &str) -> Result<Option<DualLockGuard>, StoreError> {
        if self
            .local
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(target: "site-adapters", site = %self.site, "local delivery flag held");
            return Ok(None);
        }

        let key = self.key();
        match self.store.try_lock(&key, owner, self.ttl).await {
            Ok(true) => Ok(Some(DualLockGuard {
                local: Arc::clone(&self.local),
                store: Arc::clone(&self.store),
                key,
                owner: owner.to_string(),
                released: false,
            })),
            Ok(false) => {
                self.local.store(false, Ordering::Release);
                debug!(target: "site-adapters", site = %self.site, "storage lock held by another owner");
                Ok(None)
            }
            Err(err) => {
                self.local.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    pub fn is_held_locally(&self) -> bool {
        self.local.load(Ordering::Acquire)
    }
}

/// Releases the local flag on drop. Call [`DualLockGuard::release`] to also drop the storage
/// record; otherwise it lapses after the TTL.
pub struct DualLockGuard {
    local: Arc<AtomicBool>,
    store: Arc<dyn PendingStore>,
    key: String,
    owner: String,
    released: bool,
}

impl DualLockGuard {
    pub async fn release(mut self) {
        if let Err(err) = self.store.release(&self.key, &self.owner).await {
            warn!(target: "site-adapters", key = %self.key, error = %err, "failed to release storage lock");
        }
        self.local.store(false, Ordering::Release);
        self.released = true;
    }
}

impl Drop for DualLockGuard {
    fn drop(&mut self) {
        if !self.released {
            self.local.store(false, Ordering::Release);
        }
    }
}

/// Storage record that lets exactly one attempt, in any process, run a given delivery id.
///
/// The direct path and a pending pickup in another process deliver the same id, so whichever
/// claims it first wins. After a submission the record is kept until its TTL lapses, which
/// turns away a pickup that consumed the payload just before the dispatcher removed it.
pub struct DeliveryClaim {
    store: Arc<dyn PendingStore>,
    key: String,
    owner: String,
}

impl DeliveryClaim {
    pub fn key_for(id: &DeliveryId) -> String {
        format!("delivery:{id}")
    }

    /// `Ok(None)` when another attempt holds the id.
    pub async fn acquire(
        store: &Arc<dyn PendingStore>,
        id: &DeliveryId,
        ttl: Duration,
    ) -> Result<Option<DeliveryClaim>, StoreError> {
        let key = Self::key_for(id);
        let owner = Uuid::new_v4().simple().to_string();
        if !store.try_lock(&key, &owner, ttl).await? {
            debug!(target: "site-adapters", key = %key, "delivery claimed by another attempt");
            return Ok(None);
        }
        Ok(Some(DeliveryClaim {
            store: Arc::clone(store),
            key,
            owner,
        }))
    }

    /// Let a later attempt run this id.
    pub async fn release(self) {
        if let Err(err) = self.store.release(&self.key, &self.owner).await {
            warn!(target: "site-adapters", key = %self.key, error = %err, "failed to release delivery claim");
        }
    }

    /// Leave the record to expire on its own.
    pub fn keep(self) {
        debug!(target: "site-adapters", key = %self.key, "delivery claim kept");
    }
}
