use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cdp_adapter::{event_bus, Cdp, CdpAdapter};
use pending_store::{FilePendingStore, PendingStore};
use promptrelay_core_types::SiteId;
use site_adapters::{CdpDomPort, SiteOverride, SiteProfile, SiteRegistry};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::RelayConfig;
use crate::dispatcher::{DispatchPolicy, Dispatcher};

use super::output::OutputFormat;

const EVENT_BUFFER: usize = 512;

/// Browser-backed services, started on first use.
pub struct RelayRuntime {
    pub adapter: Arc<CdpAdapter>,
    pub registry: Arc<SiteRegistry>,
    pub dispatcher: Dispatcher,
}

impl RelayRuntime {
    pub fn cdp(&self) -> Arc<dyn Cdp> {
        Arc::clone(&self.adapter) as Arc<dyn Cdp>
    }
}

pub struct CliContext {
    config: Arc<RelayConfig>,
    config_path: PathBuf,
    output: OutputFormat,
    store: OnceCell<Arc<FilePendingStore>>,
    runtime: OnceCell<Arc<RelayRuntime>>,
}

impl CliContext {
    pub fn new(config: RelayConfig, config_path: PathBuf, output: OutputFormat) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            output,
            store: OnceCell::new(),
            runtime: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        self.config.as_ref()
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    /// Built-in profiles with config overrides applied; no browser needed.
    pub fn site_profiles(&self) -> Result<Vec<SiteProfile>> {
        let overrides = self.site_overrides()?;
        Ok(SiteId::ALL
            .into_iter()
            .map(|site| {
                let mut profile = SiteProfile::builtin(site);
                if let Some(patch) = overrides.get(&site) {
                    profile.apply(patch);
                }
                profile
            })
            .collect())
    }

    fn site_overrides(&self) -> Result<BTreeMap<SiteId, SiteOverride>> {
        self.config
            .site_overrides()
            .with_context(|| format!("in {}", self.config_path.display()))
    }

    pub async fn store(&self) -> Result<Arc<FilePendingStore>> {
        self.store
            .get_or_try_init(|| async {
                let path = self.config.store_path()?;
                Ok::<_, anyhow::Error>(Arc::new(FilePendingStore::new(path)))
            })
            .await
            .map(Arc::clone)
    }

    pub async fn runtime(&self) -> Result<Arc<RelayRuntime>> {
        self.runtime
            .get_or_try_init(|| async { self.start_runtime().await.map(Arc::new) })
            .await
            .map(Arc::clone)
    }

    async fn start_runtime(&self) -> Result<RelayRuntime> {
        let store: Arc<dyn PendingStore> = self.store().await?;
        let (bus, _rx) = event_bus(EVENT_BUFFER);
        let adapter = Arc::new(
            CdpAdapter::new(self.config.browser.clone(), bus)
                .context("Failed to initialize the CDP adapter")?,
        );
        Arc::clone(&adapter)
            .start()
            .await
            .context("Failed to start the browser")?;
        info!(mode = adapter.mode().as_str(), "browser ready");

        let cdp: Arc<dyn Cdp> = Arc::clone(&adapter) as Arc<dyn Cdp>;
        let delivery = &self.config.delivery;
        let registry = Arc::new(
            SiteRegistry::builder(Arc::new(CdpDomPort::new(Arc::clone(&cdp))), Arc::clone(&store))
                .with_policy(delivery.driver_policy())
                .with_overrides(self.site_overrides()?)
                .build(),
        );
        let dispatcher = Dispatcher::new(
            cdp,
            Arc::clone(&registry),
            store,
            DispatchPolicy::from(delivery),
        );

        Ok(RelayRuntime {
            adapter,
            registry,
            dispatcher,
        })
    }
}
