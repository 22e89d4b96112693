//! Spawning Chromium and reading its DevTools endpoint.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::async_process::Child;
use chromiumoxide::browser::BrowserConfig;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::StreamExt;
use serde_json::json;
use tokio::time::timeout;

use crate::config::CdpConfig;
use crate::error::AdapterError;

const LAUNCH_WAIT: Duration = Duration::from_secs(20);
const STDERR_PREVIEW_LINES: usize = 8;

const BASE_FLAGS: &[&str] = &[
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-hang-monitor",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--remote-allow-origins=*",
    "--use-mock-keychain",
];

const HEADLESS_FLAGS: &[&str] = &["--headless=new", "--hide-scrollbars", "--mute-audio"];

pub(crate) fn flags(cfg: &CdpConfig) -> Vec<String> {
    let headless: &[&str] = if cfg.headless { HEADLESS_FLAGS } else { &[] };
    BASE_FLAGS
        .iter()
        .chain(headless)
        .map(|flag| flag.to_string())
        .chain(cfg.extra_args.iter().cloned())
        .collect()
}

fn profile_dir(cfg: &CdpConfig) -> Result<PathBuf, AdapterError> {
    let dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        std::env::current_dir()
            .map_err(|err| AdapterError::internal(format!("cannot resolve profile dir: {err}")))?
            .join(&cfg.user_data_dir)
    };
    fs::create_dir_all(&dir).map_err(|err| {
        AdapterError::internal(format!("cannot create profile dir {}: {err}", dir.display()))
    })?;
    Ok(dir)
}

pub(crate) fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    if cfg.has_executable() && !cfg.executable.exists() {
        return Err(AdapterError::io(format!(
            "chrome executable not found at {}",
            cfg.executable.display()
        ))
        .retriable(false)
        .with_data(json!({
            "expected": cfg.executable,
            "remediation": "Set PROMPTRELAY_CHROME to the full path of chrome/chromium.",
        })));
    }

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.default_deadline_ms))
        .launch_timeout(LAUNCH_WAIT)
        .args(flags(cfg))
        .user_data_dir(profile_dir(cfg)?);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if cfg.no_sandbox {
        builder = builder.no_sandbox();
    }
    if cfg.has_executable() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }
    builder
        .build()
        .map_err(|err| AdapterError::internal(format!("invalid browser config: {err}")))
}

/// Launch Chromium and return the child with its browser websocket URL.
pub(crate) async fn spawn(cfg: &CdpConfig) -> Result<(Child, String), AdapterError> {
    let mut child = browser_config(cfg)?
        .launch()
        .map_err(|err| AdapterError::internal(format!("failed to launch chromium: {err}")))?;
    let url = devtools_url(&mut child).await?;
    Ok((child, url))
}

/// The websocket URL from a `DevTools listening on ws://...` banner line.
fn banner_url(line: &str) -> Option<&str> {
    let (_, tail) = line.rsplit_once("listening on ")?;
    let url = tail.trim();
    (url.starts_with("ws") && url.contains("devtools/browser")).then_some(url)
}

async fn devtools_url(child: &mut Child) -> Result<String, AdapterError> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AdapterError::internal("chromium stderr is not piped"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut preview = Vec::with_capacity(STDERR_PREVIEW_LINES);

    let scan = async {
        while let Some(line) = lines.next().await {
            let line = line.map_err(|err| AdapterError::io(err.to_string()))?;
            if let Some(url) = banner_url(&line) {
                return Ok(url.to_string());
            }
            if preview.len() < STDERR_PREVIEW_LINES {
                preview.push(line);
            }
        }
        Err(AdapterError::io(format!(
            "chromium exited without a devtools endpoint; stderr: {}",
            preview.join(" | ")
        ))
        .retriable(false))
    };

    timeout(LAUNCH_WAIT, scan)
        .await
        .map_err(|_| AdapterError::io("timed out waiting for the devtools endpoint"))?
}
