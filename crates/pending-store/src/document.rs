use std::collections::BTreeMap;
use std::time::Duration;

use promptrelay_core_types::{DeliveryId, SiteId};
use serde::{Deserialize, Serialize};

use crate::PendingPayload;

const DOCUMENT_VERSION: u32 = 1;

/// Holder of a storage-backed lock and when it lapses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub owner: String,
    pub expires_at_ms: u64,
}

/// Everything the store persists. Both store flavours apply their mutations to this type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub payloads: BTreeMap<String, PendingPayload>,
    #[serde(default)]
    pub locks: BTreeMap<String, LockRecord>,
}

fn default_version() -> u32 {
    DOCUMENT_VERSION
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            payloads: BTreeMap::new(),
            locks: BTreeMap::new(),
        }
    }
}

impl StoreDocument {
    pub(crate) fn put(&mut self, payload: PendingPayload) {
        self.payloads.insert(payload.site.as_str().to_string(), payload);
    }

    pub(crate) fn take(&mut self, site: SiteId) -> Option<PendingPayload> {
        self.payloads.remove(site.as_str())
    }

    pub(crate) fn remove(&mut self, id: &DeliveryId) -> bool {
        let before = self.payloads.len();
        self.payloads.retain(|_, payload| &payload.id != id);
        self.payloads.len() != before
    }

    pub(crate) fn list(&self) -> Vec<PendingPayload> {
        let mut out: Vec<_> = self.payloads.values().cloned().collect();
        out.sort_by_key(|p| p.created_at_ms);
        out
    }

    pub(crate) fn clear(&mut self) -> usize {
        let removed = self.payloads.len();
        self.payloads.clear();
        removed
    }

    pub(crate) fn try_lock(&mut self, key: &str, owner: &str, ttl: Duration, now_ms: u64) -> bool {
        if let Some(existing) = self.locks.get(key) {
            if existing.owner != owner && existing.expires_at_ms > now_ms {
                return false;
            }
        }
        self.locks.insert(
            key.to_string(),
            LockRecord {
                owner: owner.to_string(),
                expires_at_ms: now_ms.saturating_add(ttl.as_millis() as u64),
            },
        );
        true
    }

    /// Returns true when a record was removed.
    pub(crate) fn release(&mut self, key: &str, owner: &str) -> bool {
        match self.locks.get(key) {
            Some(record) if record.owner == owner => self.locks.remove(key).is_some(),
            _ => false,
        }
    }

    /// Drop lock records that lapsed; keeps the file from accumulating dead keys.
    pub(crate) fn prune_locks(&mut self, now_ms: u64) {
        self.locks.retain(|_, record| record.expires_at_ms > now_ms);
    }
}
