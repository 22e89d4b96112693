use std::sync::atomic::{AtomicU64, Ordering};

use lazy_static::lazy_static;
use prometheus::{core::Collector, IntCounterVec, Registry};
use promptrelay_core_types::SiteId;
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryMetricsSnapshot {
    pub submitted: u64,
    pub skipped: u64,
    pub failed: u64,
    pub fallbacks: u64,
    pub stale_discards: u64,
}

static SUBMITTED: AtomicU64 = AtomicU64::new(0);
static SKIPPED: AtomicU64 = AtomicU64::new(0);
static FAILED: AtomicU64 = AtomicU64::new(0);
static FALLBACKS: AtomicU64 = AtomicU64::new(0);
static STALE_DISCARDS: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref SITE_DELIVERIES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("relay_site_deliveries_total", "Prompt deliveries by outcome"),
        &["site", "outcome"]
    )
    .unwrap();
    static ref SITE_FALLBACKS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "relay_site_fallbacks_total",
            "Deliveries that went through the simplified Enter path"
        ),
        &["site"]
    )
    .unwrap();
    static ref SITE_STALE_DISCARDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "relay_site_stale_discards_total",
            "Pending payloads dropped for exceeding the freshness window"
        ),
        &["site"]
    )
    .unwrap();
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector.clone())) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register site metric");
        }
    }
}

pub fn register_metrics(registry: &Registry) {
    register(registry, SITE_DELIVERIES_TOTAL.clone());
    register(registry, SITE_FALLBACKS_TOTAL.clone());
    register(registry, SITE_STALE_DISCARDS_TOTAL.clone());
}

pub(crate) fn record_submitted(site: SiteId) {
    SUBMITTED.fetch_add(1, Ordering::Relaxed);
    SITE_DELIVERIES_TOTAL
        .with_label_values(&[site.as_str(), "submitted"])
        .inc();
}

pub(crate) fn record_skipped(site: SiteId, reason: &str) {
    SKIPPED.fetch_add(1, Ordering::Relaxed);
    SITE_DELIVERIES_TOTAL
        .with_label_values(&[site.as_str(), reason])
        .inc();
}

pub(crate) fn record_failed(site: SiteId) {
    FAILED.fetch_add(1, Ordering::Relaxed);
    SITE_DELIVERIES_TOTAL
        .with_label_values(&[site.as_str(), "failed"])
        .inc();
}

pub(crate) fn record_fallback(site: SiteId) {
    FALLBACKS.fetch_add(1, Ordering::Relaxed);
    SITE_FALLBACKS_TOTAL.with_label_values(&[site.as_str()]).inc();
}

pub(crate) fn record_stale_discard(site: SiteId) {
    STALE_DISCARDS.fetch_add(1, Ordering::Relaxed);
    SITE_STALE_DISCARDS_TOTAL
        .with_label_values(&[site.as_str()])
        .inc();
}

pub fn snapshot() -> DeliveryMetricsSnapshot {
    DeliveryMetricsSnapshot {
        submitted: SUBMITTED.load(Ordering::Relaxed),
        skipped: SKIPPED.load(Ordering::Relaxed),
        failed: FAILED.load(Ordering::Relaxed),
        fallbacks: FALLBACKS.load(Ordering::Relaxed),
        stale_discards: STALE_DISCARDS.load(Ordering::Relaxed),
    }
}

pub fn reset() {
    SUBMITTED.store(0, Ordering::Relaxed);
    SKIPPED.store(0, Ordering::Relaxed);
    FAILED.store(0, Ordering::Relaxed);
    FALLBACKS.store(0, Ordering::Relaxed);
    STALE_DISCARDS.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial(site_metrics)]
    fn counts_by_outcome() {
        reset();
        record_submitted(SiteId::Claude);
        record_skipped(SiteId::Claude, "already_submitted");
        record_failed(SiteId::Grok);
        record_fallback(SiteId::Grok);
        record_stale_discard(SiteId::Gemini);

        let registry = Registry::new();
        register_metrics(&registry);
        assert!(!registry.gather().is_empty());

        let snap = snapshot();
        assert_eq!(snap.submitted, 1);
        assert_eq!(snap.skipped, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.fallbacks, 1);
        assert_eq!(snap.stale_discards, 1);
    }
}
