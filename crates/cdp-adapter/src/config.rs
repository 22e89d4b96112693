use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::discover;

/// How the adapter reaches a browser and how long it waits on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CdpConfig {
    pub executable: PathBuf,
    /// Persistent profile; chat sites keep their login cookies here.
    pub user_data_dir: PathBuf,
    pub headless: bool,
    pub no_sandbox: bool,
    pub default_deadline_ms: u64,
    /// Attach to an already running browser instead of launching one.
    pub websocket_url: Option<String>,
    /// Zero disables the `Browser.getVersion` heartbeat.
    pub heartbeat_interval_ms: u64,
    pub extra_args: Vec<String>,
}

impl Default for CdpConfig {
    fn default() -> Self {
        Self {
            executable: discover::find_chrome().unwrap_or_default(),
            user_data_dir: env_value("PROMPTRELAY_CHROME_PROFILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_profile_dir),
            headless: env_flag("PROMPTRELAY_HEADLESS").unwrap_or(false),
            no_sandbox: env_flag("PROMPTRELAY_DISABLE_SANDBOX").unwrap_or(false),
            default_deadline_ms: 30_000,
            websocket_url: env_value("PROMPTRELAY_WS_URL"),
            heartbeat_interval_ms: 15_000,
            extra_args: Vec::new(),
        }
    }
}

impl CdpConfig {
    pub fn has_executable(&self) -> bool {
        !self.executable.as_os_str().is_empty()
    }
}

fn default_profile_dir() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("promptrelay").join("profile"),
        None => PathBuf::from(".promptrelay-profile"),
    }
}

/// Trimmed, non-empty value of `key`.
pub(crate) fn env_value(key: &str) -> Option<String> {
    let raw = env::var(key).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub(crate) fn env_flag(key: &str) -> Option<bool> {
    match env_value(key)?.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
