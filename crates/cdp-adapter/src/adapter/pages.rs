use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tokio::time::{sleep, timeout};
use tracing::info;

use super::{Cdp, CdpAdapter};
use crate::commands::{KeyPress, ScreenshotFormat};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::ids::PageId;
use crate::transport::CommandTarget;

/// How long a new tab may take to get its session attached.
const ATTACH_WAIT: Duration = Duration::from_secs(5);
const ATTACH_POLL: Duration = Duration::from_millis(50);
const READY_POLL: Duration = Duration::from_millis(100);

impl CdpAdapter {
    /// The page's CDP session, waiting briefly for a tab that is still attaching.
    async fn session_for(&self, page: PageId) -> Result<String, AdapterError> {
        let waited = timeout(ATTACH_WAIT, async {
            loop {
                if !self.tabs.contains(&page) {
                    return Err(AdapterError::new(AdapterErrorKind::TargetNotFound)
                        .with_hint(format!("{page} is not open")));
                }
                if let Some(session) = self.tabs.session(&page) {
                    return Ok(session);
                }
                sleep(ATTACH_POLL).await;
            }
        })
        .await;
        waited.unwrap_or_else(|_| {
            Err(AdapterError::new(AdapterErrorKind::PageNotReady)
                .with_hint(format!("no cdp session for {page} yet")))
        })
    }

    /// Stub mode has no sessions; let the transport produce its remediation error instead.
    async fn page_call(
        &self,
        page: PageId,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        if self.mode.is_stub() {
            return self.send(CommandTarget::Browser, method, params).await;
        }
        let session = self.session_for(page).await?;
        self.send(CommandTarget::Session(session), method, params)
            .await
    }
}

#[async_trait]
impl Cdp for CdpAdapter {
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError> {
        let created = self
            .send(
                CommandTarget::Browser,
                "Target.createTarget",
                json!({ "url": url }),
            )
            .await?;
        let target_id = created
            .get("targetId")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::internal("Target.createTarget returned no targetId"))?
            .to_string();

        let attached = timeout(ATTACH_WAIT, async {
            loop {
                let page = self.tabs.page_for_target(&target_id);
                if let Some(page) = page.filter(|page| self.tabs.session(page).is_some()) {
                    return page;
                }
                sleep(ATTACH_POLL).await;
            }
        })
        .await
        .map_err(|_| {
            AdapterError::new(AdapterErrorKind::PageNotReady)
                .with_hint(format!("target {target_id} never attached"))
        })?;
        info!(target: "cdp-adapter", page = %attached, url, "tab opened");
        Ok(attached)
    }

    async fn navigate(
        &self,
        page: PageId,
        url: &str,
        deadline: Duration,
    ) -> Result<(), AdapterError> {
        let reply = self
            .page_call(page, "Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = reply.get("errorText").and_then(Value::as_str) {
            return Err(AdapterError::io(format!("navigation to {url} failed: {error}")));
        }
        self.tabs.set_url(&page, url);
        self.wait_dom_ready(page, deadline).await
    }

    async fn reload(&self, page: PageId) -> Result<(), AdapterError> {
        self.page_call(page, "Page.reload", json!({ "ignoreCache": false }))
            .await
            .map(drop)
    }

    async fn close_page(&self, page: PageId) -> Result<(), AdapterError> {
        let target_id = self
            .tabs
            .get(&page)
            .and_then(|tab| tab.target_id)
            .ok_or_else(|| {
                AdapterError::new(AdapterErrorKind::TargetNotFound)
                    .with_hint(format!("{page} has no target"))
            })?;
        self.send(
            CommandTarget::Browser,
            "Target.closeTarget",
            json!({ "targetId": target_id }),
        )
        .await
        .map(drop)
    }

    async fn evaluate_script(&self, page: PageId, expression: &str) -> Result<Value, AdapterError> {
        let mut reply = self
            .page_call(
                page,
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "awaitPromise": true,
                    "returnByValue": true,
                    "userGesture": true,
                }),
            )
            .await?;
        if let Some(details) = reply.get("exceptionDetails") {
            return Err(AdapterError::new(AdapterErrorKind::ScriptException)
                .with_hint("script threw")
                .with_data(details.clone()));
        }
        Ok(reply
            .pointer_mut("/result/value")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn insert_text(&self, page: PageId, text: &str) -> Result<(), AdapterError> {
        self.page_call(page, "Input.insertText", json!({ "text": text }))
            .await
            .map(drop)
    }

    async fn dispatch_key(&self, page: PageId, key: &KeyPress) -> Result<(), AdapterError> {
        for payload in key.event_payloads() {
            self.page_call(page, "Input.dispatchKeyEvent", payload)
                .await?;
        }
        Ok(())
    }

    async fn wait_dom_ready(&self, page: PageId, limit: Duration) -> Result<(), AdapterError> {
        let ready = timeout(limit, async {
            loop {
                let state = self.evaluate_script(page, "document.readyState").await;
                if matches!(
                    state.as_ref().ok().and_then(Value::as_str),
                    Some("interactive" | "complete")
                ) {
                    return;
                }
                sleep(READY_POLL).await;
            }
        })
        .await;
        ready.map_err(|_| {
            AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(format!("{page} not ready after {}ms", limit.as_millis()))
        })
    }

    async fn current_url(&self, page: PageId) -> Result<String, AdapterError> {
        if let Some(url) = self.tabs.url(&page) {
            return Ok(url);
        }
        match self.evaluate_script(page, "location.href").await? {
            Value::String(url) => Ok(url),
            other => Err(AdapterError::internal(format!(
                "location.href evaluated to {other}"
            ))),
        }
    }

    async fn screenshot(
        &self,
        page: PageId,
        format: ScreenshotFormat,
    ) -> Result<Vec<u8>, AdapterError> {
        let reply = self
            .page_call(page, "Page.captureScreenshot", format.params())
            .await?;
        let data = reply
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| AdapterError::internal("screenshot reply has no data"))?;
        STANDARD
            .decode(data)
            .map_err(|err| AdapterError::internal(format!("screenshot is not base64: {err}")))
    }

    fn find_page_by_host(&self, host: &str) -> Option<PageId> {
        self.tabs.find_by_host(host)
    }
}
