use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::PageId;
use pending_store::{claim_fresh, Claim, PendingStore};
use promptrelay_core_types::{timestamp_now, SiteId};
use tracing::{debug, info};

use crate::errors::DriverError;
use crate::guard::SubmissionGuard;
use crate::lock::{DeliveryClaim, DualLock};
use crate::metrics;
use crate::model::{DeliveryReport, DeliveryRequest, Origin, SkipReason};
use crate::policy::DriverPolicy;
use crate::ports::DomPort;
use crate::runner::{self, RuntimeDeps};
use crate::sites::SiteProfile;

/// Delivers prompts to one chat site, at most once per tab until the tab navigates.
pub struct SiteDriver {
    profile: SiteProfile,
    dom: Arc<dyn DomPort>,
    store: Arc<dyn PendingStore>,
    policy: DriverPolicy,
    guard: SubmissionGuard,
    lock: Option<DualLock>,
}

impl SiteDriver {
    pub fn new(
        profile: SiteProfile,
        dom: Arc<dyn DomPort>,
        store: Arc<dyn PendingStore>,
        policy: DriverPolicy,
    ) -> Self {
        let lock = profile
            .exclusive
            .then(|| DualLock::new(profile.id, Arc::clone(&store), policy.lock_ttl()));
        Self {
            profile,
            dom,
            store,
            policy,
            guard: SubmissionGuard::new(),
            lock,
        }
    }

    pub fn site(&self) -> SiteId {
        self.profile.id
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    pub fn guard(&self) -> &SubmissionGuard {
        &self.guard
    }

    /// Run the delivery protocol on `page` unless the tab is already submitting or submitted.
    ///
    /// Skips are reported as `Ok` with a skipped outcome; only protocol failures are errors.
    pub async fn deliver(
        &self,
        page: PageId,
        request: DeliveryRequest,
    ) -> Result<DeliveryReport, DriverError> {
        self.check_prompt(&request.prompt)?;

        let ticket = match self.guard.try_begin(page) {
            Ok(ticket) => ticket,
            Err(reason) => {
                info!(
                    target: "site-adapters",
                    site = %self.site(),
                    page = %page,
                    id = %request.id,
                    reason = reason.as_str(),
                    "delivery skipped"
                );
                metrics::record_skipped(self.site(), reason.as_str());
                return Ok(DeliveryReport::skipped(&request, page, reason));
            }
        };

        let claim = match DeliveryClaim::acquire(&self.store, &request.id, self.claim_ttl()).await? {
            Some(claim) => claim,
            None => {
                info!(
                    target: "site-adapters",
                    site = %self.site(),
                    page = %page,
                    id = %request.id,
                    "delivery already claimed elsewhere; skipped"
                );
                return Ok(self.skip_locked(&request, page));
            }
        };

        let lock_guard = match &self.lock {
            Some(lock) => match lock.acquire(&request.id.0).await {
                Ok(Some(held)) => Some(held),
                Ok(None) => {
                    claim.release().await;
                    info!(
                        target: "site-adapters",
                        site = %self.site(),
                        page = %page,
                        id = %request.id,
                        "site lock held elsewhere; delivery skipped"
                    );
                    return Ok(self.skip_locked(&request, page));
                }
                Err(err) => {
                    claim.release().await;
                    return Err(err.into());
                }
            },
            None => None,
        };

        let result = runner::execute(
            page,
            &request,
            RuntimeDeps {
                dom: self.dom.as_ref(),
                profile: &self.profile,
            },
        )
        .await;

        if let Some(held) = lock_guard {
            held.release().await;
        }

        match result {
            Ok(report) => {
                claim.keep();
                ticket.succeed();
                metrics::record_submitted(self.site());
                if report.fallback_used {
                    metrics::record_fallback(self.site());
                }
                Ok(report)
            }
            Err(err) if err.may_have_submitted() => {
                // Treat the tab as submitted so neither a retry nor a pickup sends it again.
                claim.keep();
                ticket.succeed();
                metrics::record_failed(self.site());
                Err(err)
            }
            Err(err) => {
                claim.release().await;
                metrics::record_failed(self.site());
                Err(err)
            }
        }
    }

    /// Check a prompt against the length limits without touching the page.
    pub fn check_prompt(&self, prompt: &str) -> Result<(), DriverError> {
        if prompt.trim().is_empty() {
            return Err(DriverError::PromptEmpty);
        }
        if prompt.chars().count() > self.policy.max_prompt_chars {
            return Err(DriverError::PromptTooLong(self.policy.max_prompt_chars));
        }
        Ok(())
    }

    /// Long enough to outlive the pickup window of the payload it guards.
    fn claim_ttl(&self) -> Duration {
        self.profile.freshness.max(self.policy.lock_ttl())
    }

    fn skip_locked(&self, request: &DeliveryRequest, page: PageId) -> DeliveryReport {
        let reason = SkipReason::Locked;
        metrics::record_skipped(self.site(), reason.as_str());
        DeliveryReport::skipped(request, page, reason)
    }

    /// The tab loaded a new document; it may be delivered to again.
    pub fn on_navigated(&self, page: PageId) {
        debug!(target: "site-adapters", site = %self.site(), page = %page, "tab navigated; guard reset");
        self.guard.reset(page);
    }

    /// Deliver a fresh pending payload for this site, if one is stored.
    ///
    /// A tab that is mid-delivery or already submitted leaves the store untouched.
    pub async fn on_page_loaded(
        &self,
        page: PageId,
    ) -> Result<Option<DeliveryReport>, DriverError> {
        if self.guard.is_busy(page) || self.guard.is_submitted(page) {
            debug!(target: "site-adapters", site = %self.site(), page = %page, "tab not idle; pickup skipped");
            return Ok(None);
        }

        let claim = claim_fresh(
            self.store.as_ref(),
            self.site(),
            timestamp_now(),
            self.profile.freshness,
        )
        .await?;

        match claim {
            Claim::Empty => Ok(None),
            Claim::Stale(_) => {
                metrics::record_stale_discard(self.site());
                Ok(None)
            }
            Claim::Fresh(payload) => {
                info!(
                    target: "site-adapters",
                    site = %self.site(),
                    page = %page,
                    id = %payload.id,
                    "picking up pending prompt"
                );
                let request = DeliveryRequest {
                    id: payload.id,
                    site: self.site(),
                    prompt: payload.prompt,
                    origin: Origin::PendingPickup,
                };
                self.deliver(page, request).await.map(Some)
            }
        }
    }

    /// Drop guard state for a closed tab.
    pub fn forget(&self, page: PageId) {
        self.guard.forget(page);
    }
}
