//! In-process stand-in for a chat page.
//!
//! The fake keeps a framework-side editor model separate from what a selector sees, so an
//! injection path the "framework" ignores leaves the model (and thus the submission) empty.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cdp_adapter::{AdapterError, AdapterErrorKind, PageId};
use pending_store::{InMemoryPendingStore, PendingStore};
use site_adapters::{
    DomPort, DriverPolicy, EditorKind, InjectStrategy, SiteDriver, SiteProfile, SubmitState,
};
use promptrelay_core_types::SiteId;

pub const SEND: &str = "button.send";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendButton {
    /// No submit control in the page.
    Missing,
    /// Disabled while the editor model is empty.
    FollowsModel,
    AlwaysDisabled,
}

#[derive(Debug)]
pub struct PageModel {
    pub editor: EditorKind,
    /// Number of probes that miss before the input shows up; `None` means never.
    pub input_after_probes: Option<u32>,
    pub probes: u32,
    pub model: String,
    pub focused: bool,
    pub exec_insert_handled: bool,
    pub paste_handled: bool,
    pub native_insert_handled: bool,
    pub button: SendButton,
    pub enter_submits: bool,
    pub submissions: Vec<String>,
    pub enters: u32,
    pub clicks: u32,
    /// Clicks that submit and then report a retriable timeout instead of their reply.
    pub click_timeouts: u32,
    /// Same for Enter presses.
    pub enter_timeouts: u32,
}

impl PageModel {
    fn input_present(&self) -> bool {
        matches!(self.input_after_probes, Some(n) if self.probes > n)
    }

    fn submit(&mut self) {
        let text = std::mem::take(&mut self.model);
        self.submissions.push(text);
    }
}

pub struct FakeDom {
    pub page: Mutex<PageModel>,
    /// Latency added to each probe, to hold a delivery in flight.
    pub probe_delay: Duration,
}

impl FakeDom {
    pub fn new(editor: EditorKind) -> Self {
        Self {
            page: Mutex::new(PageModel {
                editor,
                input_after_probes: Some(0),
                probes: 0,
                model: String::new(),
                focused: false,
                exec_insert_handled: true,
                paste_handled: true,
                native_insert_handled: true,
                button: SendButton::FollowsModel,
                enter_submits: true,
                submissions: Vec::new(),
                enters: 0,
                clicks: 0,
                click_timeouts: 0,
                enter_timeouts: 0,
            }),
            probe_delay: Duration::ZERO,
        }
    }

    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }

    pub fn configure(&self, f: impl FnOnce(&mut PageModel)) {
        f(&mut self.page.lock().unwrap());
    }

    pub fn submissions(&self) -> Vec<String> {
        self.page.lock().unwrap().submissions.clone()
    }

    pub fn clicks(&self) -> u32 {
        self.page.lock().unwrap().clicks
    }

    fn lost_reply() -> AdapterError {
        AdapterError::new(AdapterErrorKind::NavTimeout)
            .with_hint("no reply to the input command")
            .retriable(true)
    }

    fn script_error(message: &str) -> AdapterError {
        AdapterError::new(AdapterErrorKind::ScriptException).with_hint(message.to_string())
    }

    fn require_input(&self) -> Result<(), AdapterError> {
        if self.page.lock().unwrap().input_present() {
            Ok(())
        } else {
            Err(Self::script_error("no visible element"))
        }
    }
}

#[async_trait]
impl DomPort for FakeDom {
    async fn probe(
        &self,
        _page: PageId,
        selectors: &[String],
    ) -> Result<Option<String>, AdapterError> {
        if !self.probe_delay.is_zero() {
            tokio::time::sleep(self.probe_delay).await;
        }
        let mut page = self.page.lock().unwrap();
        page.probes += 1;
        Ok(page.input_present().then(|| selectors[0].clone()))
    }

    async fn set_value(&self, _page: PageId, _selector: &str, text: &str) -> Result<(), AdapterError> {
        self.require_input()?;
        let mut page = self.page.lock().unwrap();
        if page.editor == EditorKind::RichText {
            return Err(Self::script_error("value setter needs a textarea or input"));
        }
        page.model = text.to_string();
        Ok(())
    }

    async fn clear_editor(&self, _page: PageId, _selector: &str) -> Result<(), AdapterError> {
        self.require_input()?;
        self.page.lock().unwrap().model.clear();
        Ok(())
    }

    async fn exec_insert(
        &self,
        _page: PageId,
        _selector: &str,
        text: &str,
    ) -> Result<bool, AdapterError> {
        self.require_input()?;
        let mut page = self.page.lock().unwrap();
        if page.exec_insert_handled {
            page.model.push_str(text);
        }
        Ok(page.exec_insert_handled)
    }

    async fn paste(&self, _page: PageId, _selector: &str, text: &str) -> Result<(), AdapterError> {
        self.require_input()?;
        let mut page = self.page.lock().unwrap();
        if page.paste_handled {
            page.model.push_str(text);
        }
        Ok(())
    }

    async fn native_insert(&self, _page: PageId, text: &str) -> Result<(), AdapterError> {
        let mut page = self.page.lock().unwrap();
        if page.focused && page.native_insert_handled {
            page.model.push_str(text);
        }
        Ok(())
    }

    async fn read_text(&self, _page: PageId, _selector: &str) -> Result<String, AdapterError> {
        let page = self.page.lock().unwrap();
        Ok(match page.editor {
            EditorKind::PlainText => page.model.clone(),
            // Paragraph-per-line rendering with a trailing break, like ProseMirror.
            EditorKind::RichText if page.model.is_empty() => "\n".to_string(),
            EditorKind::RichText => format!("{}\n", page.model.replace('\n', "\n\n")),
        })
    }

    async fn submit_state(
        &self,
        _page: PageId,
        _selectors: &[String],
    ) -> Result<SubmitState, AdapterError> {
        let page = self.page.lock().unwrap();
        Ok(match page.button {
            SendButton::Missing => SubmitState::Missing,
            SendButton::AlwaysDisabled => SubmitState::Disabled(SEND.into()),
            SendButton::FollowsModel if page.model.trim().is_empty() => {
                SubmitState::Disabled(SEND.into())
            }
            SendButton::FollowsModel => SubmitState::Enabled(SEND.into()),
        })
    }

    async fn click(&self, _page: PageId, selector: &str) -> Result<bool, AdapterError> {
        let mut page = self.page.lock().unwrap();
        if selector != SEND || page.button == SendButton::Missing {
            return Ok(false);
        }
        page.clicks += 1;
        page.submit();
        if page.click_timeouts > 0 {
            page.click_timeouts -= 1;
            return Err(Self::lost_reply());
        }
        Ok(true)
    }

    async fn press_enter(&self, _page: PageId, _selector: &str) -> Result<(), AdapterError> {
        let mut page = self.page.lock().unwrap();
        page.focused = true;
        page.enters += 1;
        if page.enter_submits {
            page.submit();
        }
        if page.enter_timeouts > 0 {
            page.enter_timeouts -= 1;
            return Err(Self::lost_reply());
        }
        Ok(())
    }

    async fn focus(&self, _page: PageId, _selector: &str) -> Result<bool, AdapterError> {
        let mut page = self.page.lock().unwrap();
        let present = page.input_present();
        page.focused = present;
        Ok(present)
    }
}

/// Built-in profile with timings shrunk for tests.
pub fn quick_profile(site: SiteId) -> SiteProfile {
    let mut profile = SiteProfile::builtin(site);
    profile.timeouts.acquire_ms = 400;
    profile.timeouts.enable_ms = 300;
    profile.timeouts.poll_ms = 20;
    profile.timeouts.settle_ms = 0;
    profile
}

pub fn profile_with(site: SiteId, strategies: &[InjectStrategy]) -> SiteProfile {
    let mut profile = quick_profile(site);
    profile.strategies = strategies.to_vec();
    profile
}

pub struct Harness {
    pub dom: Arc<FakeDom>,
    pub store: Arc<InMemoryPendingStore>,
    pub driver: SiteDriver,
}

pub fn harness(profile: SiteProfile, dom: FakeDom) -> Harness {
    let dom = Arc::new(dom);
    let store = Arc::new(InMemoryPendingStore::new());
    let driver = SiteDriver::new(
        profile,
        dom.clone(),
        store.clone() as Arc<dyn PendingStore>,
        DriverPolicy::default(),
    );
    Harness { dom, store, driver }
}

impl Harness {
    /// A driver with its own guard over the same page and store, as another process would have.
    pub fn other_process(&self, profile: SiteProfile) -> SiteDriver {
        SiteDriver::new(
            profile,
            self.dom.clone(),
            self.store.clone() as Arc<dyn PendingStore>,
            DriverPolicy::default(),
        )
    }
}
