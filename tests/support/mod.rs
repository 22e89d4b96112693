//! A scripted browser and chat page for driving the dispatcher and watcher without Chrome.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, AdapterErrorKind, Cdp, KeyPress, PageId, ScreenshotFormat};
use pending_store::{InMemoryPendingStore, PendingStore};
use promptrelay::{DispatchPolicy, Dispatcher};
use promptrelay_core_types::SiteId;
use serde_json::Value;
use site_adapters::{DomPort, SiteOverride, SiteRegistry, SubmitState};
use url::Url;

fn unsupported(what: &str) -> AdapterError {
    AdapterError::new(AdapterErrorKind::Internal).with_hint(format!("{what} not scripted"))
}

/// Tabs are only URLs; navigation just rewrites the entry.
#[derive(Default)]
pub struct MockBrowser {
    pub tabs: Mutex<HashMap<PageId, String>>,
    pub created: AtomicU32,
    pub navigations: Mutex<Vec<(PageId, String)>>,
}

impl MockBrowser {
    pub fn with_tab(url: &str) -> (Self, PageId) {
        let browser = Self::default();
        let page = PageId::new();
        browser.tabs.lock().unwrap().insert(page, url.to_string());
        (browser, page)
    }
}

#[async_trait]
impl Cdp for MockBrowser {
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError> {
        let page = PageId::new();
        self.created.fetch_add(1, Ordering::SeqCst);
        self.tabs.lock().unwrap().insert(page, url.to_string());
        Ok(page)
    }

    async fn navigate(&self, page: PageId, url: &str, _: Duration) -> Result<(), AdapterError> {
        self.tabs.lock().unwrap().insert(page, url.to_string());
        self.navigations.lock().unwrap().push((page, url.to_string()));
        Ok(())
    }

    async fn reload(&self, _: PageId) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn close_page(&self, page: PageId) -> Result<(), AdapterError> {
        self.tabs.lock().unwrap().remove(&page);
        Ok(())
    }

    async fn evaluate_script(&self, _: PageId, _: &str) -> Result<Value, AdapterError> {
        Err(unsupported("evaluate"))
    }

    async fn insert_text(&self, _: PageId, _: &str) -> Result<(), AdapterError> {
        Err(unsupported("insert_text"))
    }

    async fn dispatch_key(&self, _: PageId, _: &KeyPress) -> Result<(), AdapterError> {
        Err(unsupported("dispatch_key"))
    }

    async fn wait_dom_ready(&self, _: PageId, _: Duration) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn current_url(&self, page: PageId) -> Result<String, AdapterError> {
        self.tabs
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .ok_or_else(|| AdapterError::new(AdapterErrorKind::TargetNotFound))
    }

    async fn screenshot(&self, _: PageId, _: ScreenshotFormat) -> Result<Vec<u8>, AdapterError> {
        Err(unsupported("screenshot"))
    }

    fn find_page_by_host(&self, host: &str) -> Option<PageId> {
        self.tabs.lock().unwrap().iter().find_map(|(page, url)| {
            let parsed = Url::parse(url).ok()?;
            let current = parsed.host_str()?;
            (current == host || current.ends_with(&format!(".{host}"))).then_some(*page)
        })
    }
}

/// A chat page whose editor accepts every injection path and submits on click or Enter.
#[derive(Default)]
pub struct FakeChat {
    pub editor: Mutex<String>,
    pub submissions: Mutex<Vec<(PageId, String)>>,
    /// Probes left that fail as if the page session were still attaching.
    pub failing_probes: AtomicU32,
    /// When set, no input ever matches.
    pub no_input: std::sync::atomic::AtomicBool,
    /// Clicks left that submit but lose their reply to a timeout.
    pub lost_click_replies: AtomicU32,
}

impl FakeChat {
    pub fn submitted(&self) -> Vec<(PageId, String)> {
        self.submissions.lock().unwrap().clone()
    }

    fn submit(&self, page: PageId) {
        let text = std::mem::take(&mut *self.editor.lock().unwrap());
        self.submissions.lock().unwrap().push((page, text));
    }
}

#[async_trait]
impl DomPort for FakeChat {
    async fn probe(&self, _: PageId, selectors: &[String]) -> Result<Option<String>, AdapterError> {
        let pending = self.failing_probes.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_probes.store(pending - 1, Ordering::SeqCst);
            return Err(AdapterError::new(AdapterErrorKind::PageNotReady).with_hint("session attaching"));
        }
        if self.no_input.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(selectors.first().cloned())
    }

    async fn set_value(&self, _: PageId, _: &str, text: &str) -> Result<(), AdapterError> {
        *self.editor.lock().unwrap() = text.to_string();
        Ok(())
    }

    async fn clear_editor(&self, _: PageId, _: &str) -> Result<(), AdapterError> {
        self.editor.lock().unwrap().clear();
        Ok(())
    }

    async fn exec_insert(&self, _: PageId, _: &str, text: &str) -> Result<bool, AdapterError> {
        *self.editor.lock().unwrap() = text.to_string();
        Ok(true)
    }

    async fn paste(&self, _: PageId, _: &str, text: &str) -> Result<(), AdapterError> {
        *self.editor.lock().unwrap() = text.to_string();
        Ok(())
    }

    async fn native_insert(&self, _: PageId, text: &str) -> Result<(), AdapterError> {
        self.editor.lock().unwrap().push_str(text);
        Ok(())
    }

    async fn read_text(&self, _: PageId, _: &str) -> Result<String, AdapterError> {
        Ok(self.editor.lock().unwrap().clone())
    }

    async fn submit_state(&self, _: PageId, _: &[String]) -> Result<SubmitState, AdapterError> {
        let selector = "button.send".to_string();
        if self.editor.lock().unwrap().trim().is_empty() {
            Ok(SubmitState::Disabled(selector))
        } else {
            Ok(SubmitState::Enabled(selector))
        }
    }

    async fn click(&self, page: PageId, _: &str) -> Result<bool, AdapterError> {
        self.submit(page);
        let lost = self.lost_click_replies.load(Ordering::SeqCst);
        if lost > 0 {
            self.lost_click_replies.store(lost - 1, Ordering::SeqCst);
            return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint("Input.dispatchMouseEvent timed out")
                .retriable(true));
        }
        Ok(true)
    }

    async fn press_enter(&self, page: PageId, _: &str) -> Result<(), AdapterError> {
        self.submit(page);
        Ok(())
    }

    async fn focus(&self, _: PageId, _: &str) -> Result<bool, AdapterError> {
        Ok(true)
    }
}

/// Short timings so a missing input fails fast.
pub fn quick_override() -> SiteOverride {
    SiteOverride {
        acquire_ms: Some(200),
        enable_ms: Some(200),
        poll_ms: Some(20),
        settle_ms: Some(0),
        ..SiteOverride::default()
    }
}

pub fn registry(chat: Arc<FakeChat>, store: Arc<InMemoryPendingStore>) -> Arc<SiteRegistry> {
    let overrides = SiteId::ALL
        .into_iter()
        .map(|site| (site, quick_override()))
        .collect();
    Arc::new(
        SiteRegistry::builder(chat as Arc<dyn DomPort>, store as Arc<dyn PendingStore>)
            .with_overrides(overrides)
            .build(),
    )
}

/// A second registry over the same page and store, standing in for a `watch` process.
pub fn other_process(rig: &Rig) -> Arc<SiteRegistry> {
    registry(Arc::clone(&rig.chat), Arc::clone(&rig.store))
}

pub struct Rig {
    pub browser: Arc<MockBrowser>,
    pub chat: Arc<FakeChat>,
    pub store: Arc<InMemoryPendingStore>,
    pub registry: Arc<SiteRegistry>,
    pub dispatcher: Dispatcher,
}

pub fn rig(browser: MockBrowser, policy: DispatchPolicy) -> Rig {
    let browser = Arc::new(browser);
    let chat = Arc::new(FakeChat::default());
    let store = Arc::new(InMemoryPendingStore::new());
    let registry = registry(Arc::clone(&chat), Arc::clone(&store));
    let dispatcher = Dispatcher::new(
        Arc::clone(&browser) as Arc<dyn Cdp>,
        Arc::clone(&registry),
        Arc::clone(&store) as Arc<dyn PendingStore>,
        policy,
    );
    Rig {
        browser,
        chat,
        store,
        registry,
        dispatcher,
    }
}

pub fn fast_policy() -> DispatchPolicy {
    DispatchPolicy {
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(200),
        ready_timeout: Duration::from_millis(100),
        ..DispatchPolicy::default()
    }
}
