//! Direct delivery path: persist the prompt, open the destination tab, deliver with retries.

use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::{AdapterError, Cdp, PageId};
use pending_store::{PendingPayload, PendingStore, StoreError};
use promptrelay_core_types::{DeliveryId, SiteId};
use serde::Serialize;
use site_adapters::{DeliveryReport, DeliveryRequest, DriverError, SiteProfile, SiteRegistry};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::config::DeliveryConfig;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("prompt is empty")]
    EmptyPrompt,
    #[error("prompt exceeds {max} chars")]
    TooLong { max: usize },
    #[error("no driver registered for {0}")]
    NoDriver(SiteId),
    #[error("pending store failed: {0}")]
    Store(#[from] StoreError),
    #[error("could not open a tab: {0}")]
    Browser(#[from] AdapterError),
    #[error("delivery failed after {attempts} attempt(s): {source}")]
    Delivery {
        attempts: u32,
        #[source]
        source: DriverError,
    },
}

#[derive(Clone, Debug)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub reuse_tabs: bool,
    pub ready_timeout: Duration,
    pub navigate_deadline: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&DeliveryConfig::default())
    }
}

impl From<&DeliveryConfig> for DispatchPolicy {
    fn from(cfg: &DeliveryConfig) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: cfg.base_delay(),
            max_delay: cfg.max_delay(),
            reuse_tabs: cfg.reuse_tabs,
            ready_timeout: Duration::from_secs(15),
            navigate_deadline: Duration::from_secs(30),
        }
    }
}

impl DispatchPolicy {
    /// `min(base * 2^retry, max)`, where `retry` counts from zero.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DispatchOutcome {
    pub id: DeliveryId,
    pub site: SiteId,
    pub page: PageId,
    pub reused_tab: bool,
    pub attempts: u32,
    /// Whether the pending entry was still stored and has been removed.
    pub pending_removed: bool,
    pub report: DeliveryReport,
}

pub struct Dispatcher {
    cdp: Arc<dyn Cdp>,
    registry: Arc<SiteRegistry>,
    store: Arc<dyn PendingStore>,
    policy: DispatchPolicy,
}

impl Dispatcher {
    pub fn new(
        cdp: Arc<dyn Cdp>,
        registry: Arc<SiteRegistry>,
        store: Arc<dyn PendingStore>,
        policy: DispatchPolicy,
    ) -> Self {
        Self {
            cdp,
            registry,
            store,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.registry
    }

    pub fn policy(&self) -> &DispatchPolicy {
        &self.policy
    }

    /// Send `prompt` to `site`.
    ///
    /// The prompt is stored as a pending payload before anything touches the browser. It is
    /// removed once a direct delivery reports a submission, or once a submit was sent without
    /// confirmation; on any other failure it stays for a reload (or the watcher) to pick up
    /// within the site's freshness window.
    #[instrument(skip_all, fields(site = %site))]
    pub async fn dispatch(
        &self,
        site: SiteId,
        prompt: &str,
        source_url: Option<String>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let driver = self
            .registry
            .driver(site)
            .ok_or(DispatchError::NoDriver(site))?;
        driver.check_prompt(prompt).map_err(|err| match err {
            DriverError::PromptTooLong(max) => DispatchError::TooLong { max },
            _ => DispatchError::EmptyPrompt,
        })?;

        let payload = PendingPayload::new(site, prompt, source_url);
        let id = payload.id.clone();
        self.store.put(payload).await?;
        debug!(target: "dispatcher", id = %id, "pending payload stored");

        let (page, reused_tab) = self.open_tab(driver.profile()).await?;
        if reused_tab {
            driver.on_navigated(page);
        }
        if let Err(err) = self.cdp.wait_dom_ready(page, self.policy.ready_timeout).await {
            debug!(target: "dispatcher", page = %page, error = %err, "dom not ready; driver will poll");
        }

        let mut attempts = 0u32;
        let report = loop {
            attempts += 1;
            let request = DeliveryRequest::direct(id.clone(), site, prompt);
            match driver.deliver(page, request).await {
                Ok(report) => break report,
                Err(err) if err.is_retriable() && attempts < self.policy.max_attempts => {
                    let delay = self.policy.backoff(attempts - 1);
                    warn!(
                        target: "dispatcher",
                        id = %id,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "delivery failed; retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) if err.may_have_submitted() => {
                    warn!(
                        target: "dispatcher",
                        id = %id,
                        attempts,
                        error = %err,
                        "submit not confirmed; prompt dropped instead of resent"
                    );
                    self.remove_pending(&id).await;
                    return Err(DispatchError::Delivery {
                        attempts,
                        source: err,
                    });
                }
                Err(err) => {
                    warn!(
                        target: "dispatcher",
                        id = %id,
                        attempts,
                        kind = err.kind(),
                        error = %err,
                        "delivery failed; prompt left pending"
                    );
                    return Err(DispatchError::Delivery {
                        attempts,
                        source: err,
                    });
                }
            }
        };

        let pending_removed = report.is_submitted() && self.remove_pending(&id).await;

        info!(
            target: "dispatcher",
            id = %id,
            page = %page,
            attempts,
            submitted = report.is_submitted(),
            pending_removed,
            "dispatch finished"
        );
        Ok(DispatchOutcome {
            id,
            site,
            page,
            reused_tab,
            attempts,
            pending_removed,
            report,
        })
    }

    async fn remove_pending(&self, id: &DeliveryId) -> bool {
        match self.store.remove(id).await {
            Ok(removed) => removed,
            Err(err) => {
                warn!(target: "dispatcher", id = %id, error = %err, "could not remove pending entry");
                false
            }
        }
    }

    async fn open_tab(&self, profile: &SiteProfile) -> Result<(PageId, bool), DispatchError> {
        if self.policy.reuse_tabs {
            if let Some(page) = self.cdp.find_page_by_host(profile.primary_host()) {
                info!(target: "dispatcher", page = %page, url = %profile.start_url, "reusing open tab");
                self.cdp
                    .navigate(page, &profile.start_url, self.policy.navigate_deadline)
                    .await?;
                return Ok((page, true));
            }
        }

        let page = self.cdp.create_page(&profile.start_url).await?;
        info!(target: "dispatcher", page = %page, url = %profile.start_url, "opened tab");
        Ok((page, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = DispatchPolicy {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(3_000),
            ..DispatchPolicy::default()
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(3_000));
        assert_eq!(policy.backoff(40), Duration::from_millis(3_000));
    }

    #[test]
    fn policy_follows_delivery_config() {
        let cfg = DeliveryConfig {
            max_attempts: 0,
            reuse_tabs: false,
            ..DeliveryConfig::default()
        };
        let policy = DispatchPolicy::from(&cfg);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.reuse_tabs);
    }
}
