use std::collections::BTreeMap;
use std::sync::Arc;

use cdp_adapter::PageId;
use pending_store::PendingStore;
use promptrelay_core_types::SiteId;
use url::Url;

use crate::driver::SiteDriver;
use crate::policy::{DriverPolicy, SiteOverride};
use crate::ports::DomPort;
use crate::sites::SiteProfile;

/// One driver per known site, sharing a DOM port and a pending store.
pub struct SiteRegistry {
    drivers: BTreeMap<SiteId, Arc<SiteDriver>>,
}

impl SiteRegistry {
    pub fn builder(dom: Arc<dyn DomPort>, store: Arc<dyn PendingStore>) -> SiteRegistryBuilder {
        SiteRegistryBuilder::new(dom, store)
    }

    /// Site whose hosts include the host of `url`.
    pub fn resolve(&self, url: &str) -> Option<SiteId> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        self.drivers
            .values()
            .find(|driver| driver.profile().matches_host(host))
            .map(|driver| driver.site())
    }

    pub fn driver(&self, site: SiteId) -> Option<Arc<SiteDriver>> {
        self.drivers.get(&site).cloned()
    }

    /// Driver for the site serving `url`.
    pub fn driver_for_url(&self, url: &str) -> Option<Arc<SiteDriver>> {
        self.resolve(url).and_then(|site| self.driver(site))
    }

    pub fn drivers(&self) -> impl Iterator<Item = &Arc<SiteDriver>> {
        self.drivers.values()
    }

    pub fn profiles(&self) -> impl Iterator<Item = &SiteProfile> {
        self.drivers.values().map(|driver| driver.profile())
    }

    /// Drop guard state for `page` in every driver.
    pub fn forget(&self, page: PageId) {
        for driver in self.drivers.values() {
            driver.forget(page);
        }
    }
}

pub struct SiteRegistryBuilder {
    dom: Arc<dyn DomPort>,
    store: Arc<dyn PendingStore>,
    policy: DriverPolicy,
    overrides: BTreeMap<SiteId, SiteOverride>,
}

impl SiteRegistryBuilder {
    pub fn new(dom: Arc<dyn DomPort>, store: Arc<dyn PendingStore>) -> Self {
        Self {
            dom,
            store,
            policy: DriverPolicy::default(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_policy(mut self, policy: DriverPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_override(mut self, site: SiteId, patch: SiteOverride) -> Self {
        self.overrides.insert(site, patch);
        self
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<SiteId, SiteOverride>) -> Self {
        self.overrides.extend(overrides);
        self
    }

    pub fn build(self) -> SiteRegistry {
        let drivers = SiteId::ALL
            .into_iter()
            .map(|site| {
                let mut profile = SiteProfile::builtin(site);
                if let Some(patch) = self.overrides.get(&site) {
                    profile.apply(patch);
                }
                let driver = SiteDriver::new(
                    profile,
                    Arc::clone(&self.dom),
                    Arc::clone(&self.store),
                    self.policy.clone(),
                );
                (site, Arc::new(driver))
            })
            .collect();
        SiteRegistry { drivers }
    }
}
