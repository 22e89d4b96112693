//! Page-load side of the handoff: routes browser events to the site drivers.

use std::collections::HashMap;
use std::sync::Arc;

use cdp_adapter::{Cdp, PageId, RawEvent, PHASE_LOAD};
use promptrelay_core_types::SiteId;
use site_adapters::{DeliveryReport, DriverError, SiteRegistry};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters for one watcher run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub loads: u64,
    pub pickups: u64,
    pub failures: u64,
    pub lagged: u64,
}

pub struct Watcher {
    cdp: Arc<dyn Cdp>,
    registry: Arc<SiteRegistry>,
    events: broadcast::Receiver<RawEvent>,
    pages: HashMap<PageId, SiteId>,
    pickups: JoinSet<(PageId, Result<Option<DeliveryReport>, DriverError>)>,
    summary: WatchSummary,
}

impl Watcher {
    pub fn new(
        cdp: Arc<dyn Cdp>,
        registry: Arc<SiteRegistry>,
        events: broadcast::Receiver<RawEvent>,
    ) -> Self {
        Self {
            cdp,
            registry,
            events,
            pages: HashMap::new(),
            pickups: JoinSet::new(),
            summary: WatchSummary::default(),
        }
    }

    /// Process events until `cancel` fires or the bus closes, then wait for running pickups.
    pub async fn run(mut self, cancel: CancellationToken) -> WatchSummary {
        info!(target: "watcher", "watching page loads");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                Some(joined) = self.pickups.join_next(), if !self.pickups.is_empty() => {
                    self.record(joined);
                }
                received = self.events.recv() => match received {
                    Ok(event) => self.handle(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        self.summary.lagged += skipped;
                        warn!(target: "watcher", skipped, "event bus lagged");
                    }
                    Err(RecvError::Closed) => {
                        debug!(target: "watcher", "event bus closed");
                        break;
                    }
                },
            }
        }

        while let Some(joined) = self.pickups.join_next().await {
            self.record(joined);
        }
        info!(
            target: "watcher",
            loads = self.summary.loads,
            pickups = self.summary.pickups,
            failures = self.summary.failures,
            "watcher stopped"
        );
        self.summary
    }

    async fn handle(&mut self, event: RawEvent) {
        match event {
            RawEvent::PageNavigated { page, url, .. } => self.on_navigated(page, &url),
            RawEvent::PageLifecycle { page, phase, .. } if phase == PHASE_LOAD => {
                self.on_load(page).await
            }
            RawEvent::PageLifecycle { .. } => {}
            RawEvent::PageClosed { page } => {
                self.pages.remove(&page);
                self.registry.forget(page);
            }
            RawEvent::Error { page, message } => {
                debug!(target: "watcher", page = ?page, %message, "adapter error event");
            }
        }
    }

    fn on_navigated(&mut self, page: PageId, url: &str) {
        let site = self.registry.resolve(url);
        let previous = match site {
            Some(site) => self.pages.insert(page, site),
            None => self.pages.remove(&page),
        };

        if let Some(old) = previous.filter(|old| Some(*old) != site) {
            if let Some(driver) = self.registry.driver(old) {
                driver.forget(page);
            }
        }
        if let Some(driver) = site.and_then(|site| self.registry.driver(site)) {
            driver.on_navigated(page);
        }
    }

    async fn on_load(&mut self, page: PageId) {
        self.summary.loads += 1;
        let site = match self.pages.get(&page) {
            Some(site) => Some(*site),
            None => self.resolve_live(page).await,
        };
        let Some(driver) = site.and_then(|site| self.registry.driver(site)) else {
            return;
        };

        debug!(target: "watcher", site = %driver.site(), page = %page, "site page loaded");
        self.pickups
            .spawn(async move { (page, driver.on_page_loaded(page).await) });
    }

    // A load can arrive for a tab whose navigation event predates this watcher.
    async fn resolve_live(&mut self, page: PageId) -> Option<SiteId> {
        let url = match self.cdp.current_url(page).await {
            Ok(url) => url,
            Err(err) => {
                debug!(target: "watcher", page = %page, error = %err, "could not read page url");
                return None;
            }
        };
        let site = self.registry.resolve(&url)?;
        self.pages.insert(page, site);
        Some(site)
    }

    fn record(
        &mut self,
        joined: Result<(PageId, Result<Option<DeliveryReport>, DriverError>), tokio::task::JoinError>,
    ) {
        match joined {
            Ok((_, Ok(Some(report)))) => {
                if report.is_submitted() {
                    self.summary.pickups += 1;
                }
                info!(
                    target: "watcher",
                    site = %report.site,
                    page = %report.page,
                    id = %report.id,
                    outcome = ?report.outcome,
                    "pending pickup finished"
                );
            }
            Ok((_, Ok(None))) => {}
            Ok((page, Err(err))) => {
                self.summary.failures += 1;
                warn!(target: "watcher", page = %page, kind = err.kind(), error = %err, "pending pickup failed");
            }
            Err(err) => {
                self.summary.failures += 1;
                warn!(target: "watcher", error = %err, "pickup task aborted");
            }
        }
    }
}
