//! Application configuration, loaded from YAML and patched from `PROMPTRELAY_*` variables.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use cdp_adapter::CdpConfig;
use page_extract::{PromptTemplate, TemplateSet};
use pending_store::{FilePendingStore, StoreError};
use promptrelay_core_types::{SiteId, UnknownSite};
use serde::{Deserialize, Serialize};
use site_adapters::{DriverPolicy, SiteOverride};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("sites section: {0}")]
    UnknownSite(#[from] UnknownSite),
    #[error("delivery section: {0}")]
    InvalidDelivery(String),
    #[error("store section: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub browser: CdpConfig,
    pub store: StoreConfig,
    pub delivery: DeliveryConfig,
    /// Per-site overrides keyed by site name (`chatgpt`, `claude`, ...).
    pub sites: BTreeMap<String, SiteOverride>,
    pub templates: Vec<PromptTemplate>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Defaults to `<data dir>/promptrelay/pending.json`.
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Reuse an open tab on the destination host instead of opening a new one.
    pub reuse_tabs: bool,
    pub default_site: String,
    pub default_template: String,
    /// Extracted page content is cut to this many chars before templating.
    pub max_content_chars: usize,
    pub max_prompt_chars: usize,
    pub lock_ttl_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            reuse_tabs: true,
            default_site: "chatgpt".into(),
            default_template: "summarize".into(),
            max_content_chars: 24_000,
            max_prompt_chars: 100_000,
            lock_ttl_ms: 30_000,
        }
    }
}

impl DeliveryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn driver_policy(&self) -> DriverPolicy {
        DriverPolicy {
            max_prompt_chars: self.max_prompt_chars,
            lock_ttl_ms: self.lock_ttl_ms,
        }
    }
}

impl RelayConfig {
    /// Apply `PROMPTRELAY_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = get("PROMPTRELAY_CHROME") {
            self.browser.executable = PathBuf::from(path);
        }
        if let Some(flag) = get("PROMPTRELAY_HEADLESS").and_then(|v| parse_flag(&v)) {
            self.browser.headless = flag;
        }
        if let Some(url) = get("PROMPTRELAY_WS_URL") {
            self.browser.websocket_url = Some(url);
        }
        if let Some(path) = get("PROMPTRELAY_STORE") {
            self.store.path = Some(PathBuf::from(path));
        }
    }

    /// Check the parts serde cannot: site names and delivery bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.site_overrides()?;
        self.default_site()?;
        if self.delivery.max_attempts == 0 {
            return Err(ConfigError::InvalidDelivery(
                "max_attempts must be at least 1".into(),
            ));
        }
        if self.delivery.base_delay_ms > self.delivery.max_delay_ms {
            return Err(ConfigError::InvalidDelivery(
                "base_delay_ms exceeds max_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn site_overrides(&self) -> Result<BTreeMap<SiteId, SiteOverride>, ConfigError> {
        self.sites
            .iter()
            .map(|(name, patch)| Ok((name.parse::<SiteId>()?, patch.clone())))
            .collect()
    }

    pub fn default_site(&self) -> Result<SiteId, ConfigError> {
        Ok(self.delivery.default_site.parse()?)
    }

    pub fn store_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.store.path {
            Some(path) => Ok(path.clone()),
            None => Ok(FilePendingStore::default_path()?),
        }
    }

    /// Built-in templates with the configured ones layered on top.
    pub fn template_set(&self) -> TemplateSet {
        let mut set = TemplateSet::builtin();
        set.extend(self.templates.iter().cloned());
        set
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_sections_parse_with_defaults() {
        let yaml = r#"
browser:
  headless: true
delivery:
  reuse_tabs: false
  default_site: claude
sites:
  gemini:
    acquire_ms: 45000
    freshness_secs: 180
templates:
  - name: tldr
    body: "TL;DR {{title}}: {{content}}"
"#;
        let config: RelayConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.browser.headless);
        assert!(!config.delivery.reuse_tabs);
        assert_eq!(config.delivery.max_attempts, 4);
        assert_eq!(config.default_site().unwrap(), SiteId::Claude);

        let overrides = config.site_overrides().unwrap();
        assert_eq!(overrides[&SiteId::Gemini].acquire_ms, Some(45_000));
        assert!(config.template_set().get("tldr").is_some());
        assert!(config.template_set().get("summarize").is_some());
        config.validate().unwrap();
    }

    #[test]
    fn unknown_site_and_bad_delays_fail_validation() {
        let mut config = RelayConfig::default();
        config.sites.insert("bard".into(), SiteOverride::default());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownSite(_))
        ));

        let mut config = RelayConfig::default();
        config.delivery.base_delay_ms = 10_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDelivery(_))
        ));
    }

    #[test]
    fn unknown_override_fields_are_rejected() {
        let yaml = "sites:\n  claude:\n    acquire_msec: 10\n";
        assert!(serde_yaml::from_str::<RelayConfig>(yaml).is_err());
    }

    #[test]
    fn env_overrides_patch_browser_and_store() {
        let vars: HashMap<&str, &str> = [
            ("PROMPTRELAY_HEADLESS", "yes"),
            ("PROMPTRELAY_WS_URL", " ws://127.0.0.1:9222/devtools/browser/x "),
            ("PROMPTRELAY_STORE", "/tmp/relay/pending.json"),
            ("PROMPTRELAY_CHROME", ""),
        ]
        .into_iter()
        .collect();
        let mut config = RelayConfig::default();
        let before = config.browser.executable.clone();
        config.apply_env_with(|key| vars.get(key).map(|v| v.to_string()));

        assert!(config.browser.headless);
        assert_eq!(
            config.browser.websocket_url.as_deref(),
            Some("ws://127.0.0.1:9222/devtools/browser/x")
        );
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/tmp/relay/pending.json")
        );
        assert_eq!(config.browser.executable, before);
    }
}
