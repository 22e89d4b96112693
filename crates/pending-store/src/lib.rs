//! Pending-prompt handoff storage.
//!
//! A prompt is written here before the direct delivery is attempted, so a destination tab that
//! reloads (or opens after the message was sent) can still pick it up on page load. Entries are
//! keyed by site and the latest write wins.

mod document;
mod errors;
mod file;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use promptrelay_core_types::{DeliveryId, SiteId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use document::{LockRecord, StoreDocument};
pub use errors::StoreError;
pub use file::FilePendingStore;
pub use memory::InMemoryPendingStore;

/// A prompt waiting for its destination tab.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayload {
    pub id: DeliveryId,
    pub site: SiteId,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    pub created_at_ms: u64,
}

impl PendingPayload {
    pub fn new(site: SiteId, prompt: impl Into<String>, source_url: Option<String>) -> Self {
        Self {
            id: DeliveryId::new(),
            site,
            prompt: prompt.into(),
            source_url,
            created_at_ms: promptrelay_core_types::timestamp_now(),
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }
}

#[async_trait]
pub trait PendingStore: Send + Sync {
    /// Store `payload`, replacing any entry already held for its site.
    async fn put(&self, payload: PendingPayload) -> Result<(), StoreError>;

    /// Remove and return the entry for `site`.
    async fn take(&self, site: SiteId) -> Result<Option<PendingPayload>, StoreError>;

    /// Remove the entry with `id` if it is still stored. Returns whether it was.
    async fn remove(&self, id: &DeliveryId) -> Result<bool, StoreError>;

    async fn list(&self) -> Result<Vec<PendingPayload>, StoreError>;

    /// Drop every payload; lock records are kept. Returns how many payloads were removed.
    async fn clear(&self) -> Result<usize, StoreError>;

    /// Acquire `key` for `owner` unless another owner holds an unexpired record.
    async fn try_lock(&self, key: &str, owner: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Release `key` if `owner` holds it.
    async fn release(&self, key: &str, owner: &str) -> Result<(), StoreError>;
}

/// Outcome of looking for a pending payload on page load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Claim {
    Fresh(PendingPayload),
    /// Older than the freshness window; already deleted from the store.
    Stale(PendingPayload),
    Empty,
}

/// Take the payload for `site` and classify it against `window`.
///
/// The entry is removed before the caller gets to act on it, so two tabs racing on the same
/// site never both see it as fresh.
pub async fn claim_fresh(
    store: &dyn PendingStore,
    site: SiteId,
    now_ms: u64,
    window: Duration,
) -> Result<Claim, StoreError> {
    let Some(payload) = store.take(site).await? else {
        return Ok(Claim::Empty);
    };

    let age = payload.age_ms(now_ms);
    if u128::from(age) > window.as_millis() {
        info!(
            target: "pending-store",
            site = %site,
            id = %payload.id,
            age_ms = age,
            window_ms = window.as_millis() as u64,
            "discarded stale pending payload"
        );
        return Ok(Claim::Stale(payload));
    }

    debug!(target: "pending-store", site = %site, id = %payload.id, age_ms = age, "claimed pending payload");
    Ok(Claim::Fresh(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_at(site: SiteId, created_at_ms: u64) -> PendingPayload {
        PendingPayload {
            created_at_ms,
            ..PendingPayload::new(site, "hello", None)
        }
    }

    #[tokio::test]
    async fn fresh_payload_is_claimed_once() {
        let store = InMemoryPendingStore::new();
        store.put(payload_at(SiteId::Claude, 1_000)).await.unwrap();

        let claim = claim_fresh(&store, SiteId::Claude, 20_000, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(claim, Claim::Fresh(ref p) if p.prompt == "hello"));

        let again = claim_fresh(&store, SiteId::Claude, 20_000, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(again, Claim::Empty);
    }

    #[tokio::test]
    async fn stale_payload_is_deleted_on_observation() {
        let store = InMemoryPendingStore::new();
        store.put(payload_at(SiteId::Gemini, 0)).await.unwrap();

        let claim = claim_fresh(&store, SiteId::Gemini, 121_000, Duration::from_secs(120))
            .await
            .unwrap();
        assert!(matches!(claim, Claim::Stale(_)));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn payload_at_window_edge_is_still_fresh() {
        let store = InMemoryPendingStore::new();
        store.put(payload_at(SiteId::Grok, 0)).await.unwrap();
        let claim = claim_fresh(&store, SiteId::Grok, 60_000, Duration::from_secs(60))
            .await
            .unwrap();
        assert!(matches!(claim, Claim::Fresh(_)));
    }

    #[test]
    fn future_timestamps_count_as_zero_age() {
        let payload = payload_at(SiteId::Kimi, 5_000);
        assert_eq!(payload.age_ms(1_000), 0);
    }
}
