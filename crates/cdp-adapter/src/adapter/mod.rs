mod pages;
mod protocol;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{KeyPress, ScreenshotFormat};
use crate::config::{env_flag, CdpConfig};
use crate::discover;
use crate::error::{AdapterError, AdapterErrorKind};
use crate::events::RawEvent;
use crate::ids::{BrowserId, PageId};
use crate::metrics;
use crate::registry::TabRegistry;
use crate::transport::{CdpTransport, ChromiumTransport, CommandTarget, StubTransport};

/// Broadcast sender carrying [`RawEvent`]s to every subscriber.
pub type EventBus = broadcast::Sender<RawEvent>;

const RESTART_STEP: Duration = Duration::from_millis(100);
const RESTART_CAP: Duration = Duration::from_secs(5);

/// Browser operations the drivers, the dispatcher and the extractor rely on.
#[async_trait]
pub trait Cdp: Send + Sync {
    /// Open a tab at `url` and return once its CDP session is attached.
    async fn create_page(&self, url: &str) -> Result<PageId, AdapterError>;
    async fn navigate(&self, page: PageId, url: &str, deadline: Duration)
        -> Result<(), AdapterError>;
    async fn reload(&self, page: PageId) -> Result<(), AdapterError>;
    async fn close_page(&self, page: PageId) -> Result<(), AdapterError>;
    /// Evaluate `expression`, awaiting promises, and return the value as JSON.
    async fn evaluate_script(&self, page: PageId, expression: &str)
        -> Result<Value, AdapterError>;
    /// Type `text` into whatever element has focus.
    async fn insert_text(&self, page: PageId, text: &str) -> Result<(), AdapterError>;
    async fn dispatch_key(&self, page: PageId, key: &KeyPress) -> Result<(), AdapterError>;
    /// Wait until `document.readyState` is `interactive` or `complete`.
    async fn wait_dom_ready(&self, page: PageId, timeout: Duration) -> Result<(), AdapterError>;
    async fn current_url(&self, page: PageId) -> Result<String, AdapterError>;
    async fn screenshot(&self, page: PageId, format: ScreenshotFormat)
        -> Result<Vec<u8>, AdapterError>;

    /// An open tab on `host` or one of its subdomains.
    fn find_page_by_host(&self, _host: &str) -> Option<PageId> {
        None
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdapterMode {
    Real,
    /// No browser was found; commands fail with a remediation hint.
    Stub,
}

impl AdapterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterMode::Real => "real",
            AdapterMode::Stub => "stub",
        }
    }

    pub fn is_stub(&self) -> bool {
        matches!(self, AdapterMode::Stub)
    }
}

pub struct CdpAdapter {
    browser_id: BrowserId,
    bus: EventBus,
    tabs: TabRegistry,
    mode: AdapterMode,
    transport: Arc<dyn CdpTransport>,
    shutdown: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl CdpAdapter {
    /// Connect to `websocket_url` or launch a local browser, falling back to stub mode when
    /// neither is available. `PROMPTRELAY_USE_REAL_CHROME` forces either choice.
    pub fn new(cfg: CdpConfig, bus: EventBus) -> Result<Self, AdapterError> {
        let transport = select_transport(cfg)?;
        Ok(Self::with_transport(bus, transport))
    }

    pub fn with_transport(bus: EventBus, transport: Arc<dyn CdpTransport>) -> Self {
        let mode = if transport.is_stub() {
            AdapterMode::Stub
        } else {
            AdapterMode::Real
        };
        Self {
            browser_id: BrowserId::new(),
            bus,
            tabs: TabRegistry::new(),
            mode,
            transport,
            shutdown: CancellationToken::new(),
            pump: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> AdapterMode {
        self.mode
    }

    pub fn tabs(&self) -> &TabRegistry {
        &self.tabs
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RawEvent> {
        self.bus.subscribe()
    }

    /// Start the transport and, for a real browser, the event loop. Idempotent.
    pub async fn start(self: Arc<Self>) -> Result<(), AdapterError> {
        let mut pump = self.pump.lock().await;
        if pump.is_some() {
            return Ok(());
        }
        self.transport.start().await?;
        if self.mode.is_stub() {
            debug!(target: "cdp-adapter", "stub transport; no event loop");
            return Ok(());
        }
        *pump = Some(tokio::spawn(Arc::clone(&self).event_loop()));
        info!(target: "cdp-adapter", browser = %self.browser_id, "event loop started");
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.pump.lock().await.take() {
            let _ = handle.await;
        }
    }

    /// Track a tab whose CDP ids are known out of band.
    pub fn register_page(&self, page: PageId, target_id: Option<String>, session: Option<String>) {
        self.tabs.insert(page, target_id, session);
    }

    fn publish(&self, event: RawEvent) {
        // No subscribers is fine.
        let _ = self.bus.send(event);
    }

    async fn event_loop(self: Arc<Self>) {
        let mut restarts: u32 = 0;
        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                event = self.transport.next_event() => event,
            };
            match event {
                Some(event) => {
                    restarts = 0;
                    self.on_transport_event(event);
                }
                None if self.shutdown.is_cancelled() => break,
                None => {
                    restarts = restarts.saturating_add(1);
                    self.reset_after_disconnect();
                    warn!(target: "cdp-adapter", restarts, "event stream ended; restarting transport");
                    if let Err(err) = self.transport.start().await {
                        warn!(target: "cdp-adapter", %err, "transport restart failed");
                    }
                    sleep(RESTART_STEP.saturating_mul(restarts).min(RESTART_CAP)).await;
                }
            }
        }
        debug!(target: "cdp-adapter", "event loop stopped");
    }

    /// Every tab belonged to the dead connection; report them closed.
    fn reset_after_disconnect(&self) {
        let pages = self.tabs.clear();
        let message = if pages.is_empty() {
            "cdp transport restarted"
        } else {
            "cdp transport restarted; open pages were reset"
        };
        for page in pages {
            self.publish(RawEvent::PageClosed { page });
        }
        self.publish(RawEvent::Error {
            page: None,
            message: message.to_string(),
        });
    }

    async fn send(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        let started = Instant::now();
        let result = self.transport.send_command(target, method, params).await;
        metrics::observe_command(method, started.elapsed(), result.is_ok());
        result
    }
}

fn select_transport(mut cfg: CdpConfig) -> Result<Arc<dyn CdpTransport>, AdapterError> {
    let forced = env_flag("PROMPTRELAY_USE_REAL_CHROME");
    if forced == Some(false) {
        return Ok(stub_transport());
    }
    if cfg.websocket_url.is_some() {
        info!(target: "cdp-adapter", "attaching to a running browser");
        return Ok(Arc::new(ChromiumTransport::new(cfg)));
    }

    let executable = if cfg.has_executable() && cfg.executable.exists() {
        Some(cfg.executable.clone())
    } else {
        discover::find_chrome()
    };
    match (executable, forced) {
        (Some(path), _) => {
            info!(target: "cdp-adapter", executable = %path.display(), "launching local browser");
            cfg.executable = path;
            Ok(Arc::new(ChromiumTransport::new(cfg)))
        }
        (None, Some(true)) => Err(AdapterError::new(AdapterErrorKind::Internal)
            .with_hint("PROMPTRELAY_USE_REAL_CHROME is set but no Chrome/Chromium was found")
            .with_data(json!({
                "remediation": "Set PROMPTRELAY_CHROME=/path/to/chrome or PROMPTRELAY_WS_URL"
            }))),
        (None, _) => Ok(stub_transport()),
    }
}

fn stub_transport() -> Arc<dyn CdpTransport> {
    warn!(
        target: "cdp-adapter",
        remediation = "install Chrome/Chromium, or set PROMPTRELAY_CHROME / PROMPTRELAY_WS_URL",
        "no browser available; deliveries will fail"
    );
    Arc::new(StubTransport)
}
