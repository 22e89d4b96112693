use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-site timing knobs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteTimeouts {
    /// How long to poll for the input control.
    pub acquire_ms: u64,
    /// How long the submit control may stay disabled after injection.
    pub enable_ms: u64,
    pub poll_ms: u64,
    /// Pause after each injection attempt before reading the editor back.
    pub settle_ms: u64,
}

impl SiteTimeouts {
    pub const fn new(acquire_ms: u64, enable_ms: u64) -> Self {
        Self {
            acquire_ms,
            enable_ms,
            poll_ms: 100,
            settle_ms: 150,
        }
    }

    pub fn acquire(&self) -> Duration {
        Duration::from_millis(self.acquire_ms)
    }

    pub fn enable(&self) -> Duration {
        Duration::from_millis(self.enable_ms)
    }

    pub fn poll(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(10))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

impl Default for SiteTimeouts {
    fn default() -> Self {
        Self::new(15_000, 5_000)
    }
}

/// User overrides for one site, merged over the built-in profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteOverride {
    pub start_url: Option<String>,
    pub acquire_ms: Option<u64>,
    pub enable_ms: Option<u64>,
    pub poll_ms: Option<u64>,
    pub settle_ms: Option<u64>,
    pub freshness_secs: Option<u64>,
    /// Tried before the built-in selectors.
    pub input_selectors: Vec<String>,
    pub submit_selectors: Vec<String>,
}

/// Limits shared by every driver.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverPolicy {
    pub max_prompt_chars: usize,
    /// Lifetime of the storage lock record for exclusive sites.
    pub lock_ttl_ms: u64,
}

impl DriverPolicy {
    pub fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.lock_ttl_ms)
    }
}

impl Default for DriverPolicy {
    fn default() -> Self {
        Self {
            max_prompt_chars: 100_000,
            lock_ttl_ms: 30_000,
        }
    }
}
