//! Runs against a real Chromium. Ignored by default:
//! `PROMPTRELAY_CDP_CONTRACT=1 cargo test -p cdp-adapter -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use cdp_adapter::transport::ChromiumTransport;
use cdp_adapter::{
    event_bus, AdapterMode, Cdp, CdpAdapter, CdpConfig, CdpTransport, CommandTarget, KeyPress,
    PageId, RawEvent,
};
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

const READY: Duration = Duration::from_secs(10);

/// Headless config with a throwaway profile, or `None` when the contract run is not requested.
fn contract_config() -> Option<(CdpConfig, TempDir)> {
    let enabled = std::env::var("PROMPTRELAY_CDP_CONTRACT")
        .map(|value| matches!(value.trim(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);
    if !enabled {
        return None;
    }
    let profile = tempfile::tempdir().expect("profile dir");
    let cfg = CdpConfig {
        headless: true,
        user_data_dir: profile.path().into(),
        ..CdpConfig::default()
    };
    Some((cfg, profile))
}

async fn browser(cfg: CdpConfig) -> Arc<CdpAdapter> {
    let (bus, _rx) = event_bus(64);
    let adapter = Arc::new(CdpAdapter::new(cfg, bus).expect("adapter"));
    assert_eq!(adapter.mode(), AdapterMode::Real, "no Chrome/Chromium found");
    Arc::clone(&adapter).start().await.expect("start");
    adapter
}

async fn open(adapter: &CdpAdapter, html: &str) -> PageId {
    let page = adapter
        .create_page(&format!("data:text/html,{html}"))
        .await
        .expect("create page");
    adapter.wait_dom_ready(page, READY).await.expect("dom ready");
    page
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set PROMPTRELAY_CDP_CONTRACT=1"]
async fn transport_reports_browser_version() {
    let Some((cfg, _profile)) = contract_config() else {
        return;
    };
    let transport = ChromiumTransport::new(cfg);
    transport.start().await.expect("transport start");
    let version = transport
        .send_command(CommandTarget::Browser, "Browser.getVersion", json!({}))
        .await
        .expect("Browser.getVersion");
    assert!(version["product"].as_str().is_some());
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set PROMPTRELAY_CDP_CONTRACT=1"]
async fn native_typing_and_keys_reach_a_textarea() {
    let Some((cfg, _profile)) = contract_config() else {
        return;
    };
    let adapter = browser(cfg).await;
    let page = open(&adapter, "<textarea id=t></textarea>").await;

    adapter
        .evaluate_script(page, "document.getElementById('t').focus()")
        .await
        .expect("focus");
    adapter.insert_text(page, "hello relay").await.expect("insert");
    adapter
        .dispatch_key(page, &KeyPress::backspace())
        .await
        .expect("backspace");

    let value = adapter
        .evaluate_script(page, "document.getElementById('t').value")
        .await
        .expect("read back");
    assert_eq!(value, json!("hello rela"));
    adapter.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome/Chromium; set PROMPTRELAY_CDP_CONTRACT=1"]
async fn reload_is_seen_as_navigation_then_load() {
    let Some((cfg, _profile)) = contract_config() else {
        return;
    };
    let adapter = browser(cfg).await;
    let mut events = adapter.subscribe();
    let page = open(&adapter, "<p>reload me</p>").await;
    adapter.reload(page).await.expect("reload");

    let seen = timeout(READY, wait_for_reload(&mut events, page)).await;
    assert_eq!(seen, Ok((true, true)));
    adapter.shutdown().await;
}

async fn wait_for_reload(events: &mut broadcast::Receiver<RawEvent>, page: PageId) -> (bool, bool) {
    let (mut navigated, mut loaded) = (false, false);
    while !(navigated && loaded) {
        match events.recv().await {
            Ok(event) if event.page() != Some(page) => {}
            Ok(RawEvent::PageNavigated { .. }) => navigated = true,
            Ok(event) if event.is_load() => loaded = navigated,
            Ok(_) => {}
            Err(_) => break,
        }
    }
    (navigated, loaded)
}
