use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::async_process::Child;
use chromiumoxide::cdp::browser_protocol::target::SessionId as CdpSessionId;
use chromiumoxide::cdp::events::CdpEventMessage;
use chromiumoxide::conn::Connection;
use chromiumoxide::error::CdpError;
use chromiumoxide_types::{CallId, CdpJsonEventMessage, Message, MethodId, Response};
use futures::future::BoxFuture;
use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{launch, CdpTransport, CommandTarget, TransportEvent};
use crate::config::CdpConfig;
use crate::error::{AdapterError, AdapterErrorKind};

const REQUEST_QUEUE: usize = 128;
const EVENT_QUEUE: usize = 512;
const HEARTBEAT_PATIENCE_CAP: Duration = Duration::from_secs(5);

type Reply = oneshot::Sender<Result<Value, AdapterError>>;
type LinkFuture = BoxFuture<'static, Result<Link, AdapterError>>;
type Connector = Box<dyn Fn(CdpConfig) -> LinkFuture + Send + Sync>;

/// CDP over the browser websocket.
///
/// The link is opened on first use and reopened once its pump stops, so a browser the user
/// closed is relaunched by the next command.
pub struct ChromiumTransport {
    cfg: CdpConfig,
    link: Mutex<Option<Arc<Link>>>,
    connect: Connector,
}

impl ChromiumTransport {
    pub fn new(cfg: CdpConfig) -> Self {
        Self::with_connector(
            cfg,
            Box::new(|cfg: CdpConfig| -> LinkFuture { Box::pin(Link::open(cfg)) }),
        )
    }

    fn with_connector(cfg: CdpConfig, connect: Connector) -> Self {
        Self {
            cfg,
            link: Mutex::new(None),
            connect,
        }
    }

    async fn link(&self) -> Result<Arc<Link>, AdapterError> {
        let mut slot = self.link.lock().await;
        if let Some(link) = slot.as_ref() {
            if !link.closed.is_cancelled() {
                return Ok(Arc::clone(link));
            }
            debug!(target: "cdp-transport", "browser link closed; reconnecting");
        }
        let link = Arc::new((self.connect)(self.cfg.clone()).await?);
        *slot = Some(Arc::clone(&link));
        Ok(link)
    }

    fn deadline(&self) -> Duration {
        Duration::from_millis(self.cfg.default_deadline_ms)
    }
}

#[async_trait]
impl CdpTransport for ChromiumTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        let link = self.link().await?;
        let deadline = self.deadline();
        link.call(
            CommandTarget::Browser,
            "Target.setDiscoverTargets",
            json!({ "discover": true }),
            deadline,
        )
        .await?;
        link.call(
            CommandTarget::Browser,
            "Target.setAutoAttach",
            json!({ "autoAttach": true, "waitForDebuggerOnStart": false, "flatten": true }),
            deadline,
        )
        .await?;
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        match self.link().await {
            Ok(link) => link.next_event().await,
            Err(err) => {
                warn!(target: "cdp-transport", %err, "no browser link for events");
                None
            }
        }
    }

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError> {
        self.link()
            .await?
            .call(target, method, params, self.deadline())
            .await
    }
}

struct Request {
    target: CommandTarget,
    method: String,
    params: Value,
    reply: Reply,
}

/// One websocket connection plus the task pumping it.
struct Link {
    requests: mpsc::Sender<Request>,
    events: Mutex<mpsc::Receiver<TransportEvent>>,
    closed: CancellationToken,
    pump: JoinHandle<()>,
    browser: std::sync::Mutex<Option<Child>>,
}

impl Link {
    async fn open(cfg: CdpConfig) -> Result<Self, AdapterError> {
        let (browser, ws_url) = match cfg.websocket_url.clone() {
            Some(url) => (None, url),
            None => {
                let (child, url) = launch::spawn(&cfg).await?;
                (Some(child), url)
            }
        };
        let conn = Connection::<CdpEventMessage>::connect(&ws_url)
            .await
            .map_err(|err| AdapterError::io(format!("connect {ws_url}: {err}")))?;

        let (requests, inbox) = mpsc::channel(REQUEST_QUEUE);
        let (outbox, events) = mpsc::channel(EVENT_QUEUE);
        let closed = CancellationToken::new();
        let pump = Pump {
            conn,
            pending: HashMap::new(),
            outbox,
            heartbeat: Heartbeat::from_config(&cfg),
        };
        let pump = tokio::spawn(pump.run(inbox, closed.clone()));
        info!(
            target: "cdp-transport",
            url = %ws_url,
            launched = browser.is_some(),
            "browser link open"
        );

        Ok(Self {
            requests,
            events: Mutex::new(events),
            closed,
            pump,
            browser: std::sync::Mutex::new(browser),
        })
    }

    #[cfg(test)]
    fn idle() -> Self {
        let (requests, _inbox) = mpsc::channel(1);
        let (_outbox, events) = mpsc::channel(1);
        Self {
            requests,
            events: Mutex::new(events),
            closed: CancellationToken::new(),
            pump: tokio::spawn(std::future::pending()),
            browser: std::sync::Mutex::new(None),
        }
    }

    async fn call(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
        deadline: Duration,
    ) -> Result<Value, AdapterError> {
        let (reply, answer) = oneshot::channel();
        let request = Request {
            target,
            method: method.to_string(),
            params,
            reply,
        };
        self.requests
            .send(request)
            .await
            .map_err(|_| link_closed())?;

        match timeout(deadline, answer).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(link_closed()),
            Err(_) => Err(AdapterError::new(AdapterErrorKind::NavTimeout).with_hint(format!(
                "{method} got no reply within {}ms",
                deadline.as_millis()
            ))),
        }
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        self.events.lock().await.recv().await
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.closed.cancel();
        self.pump.abort();
        let child = self.browser.lock().ok().and_then(|mut slot| slot.take());
        if let (Some(mut child), Ok(runtime)) = (child, tokio::runtime::Handle::try_current()) {
            runtime.spawn(async move {
                if let Err(err) = child.kill().await {
                    warn!(target: "cdp-transport", ?err, "failed to stop chromium");
                }
            });
        }
    }
}

/// `Browser.getVersion` probe; an unanswered probe past `patience` closes the link.
struct Heartbeat {
    every: Duration,
    patience: Duration,
    outstanding: Option<(CallId, Instant)>,
}

impl Heartbeat {
    fn from_config(cfg: &CdpConfig) -> Option<Self> {
        (cfg.heartbeat_interval_ms > 0).then(|| Self {
            every: Duration::from_millis(cfg.heartbeat_interval_ms),
            patience: Duration::from_millis(cfg.default_deadline_ms).min(HEARTBEAT_PATIENCE_CAP),
            outstanding: None,
        })
    }
}

struct Pump {
    conn: Connection<CdpEventMessage>,
    pending: HashMap<CallId, Reply>,
    outbox: mpsc::Sender<TransportEvent>,
    heartbeat: Option<Heartbeat>,
}

impl Pump {
    async fn run(mut self, mut inbox: mpsc::Receiver<Request>, closed: CancellationToken) {
        let outcome = self.drive(&mut inbox, &closed).await;
        closed.cancel();
        let reason = match outcome {
            Ok(()) => link_closed(),
            Err(err) => {
                error!(target: "cdp-transport", %err, "browser link failed");
                err
            }
        };
        for (_, reply) in self.pending.drain() {
            let _ = reply.send(Err(reason.clone()));
        }
    }

    async fn drive(
        &mut self,
        inbox: &mut mpsc::Receiver<Request>,
        closed: &CancellationToken,
    ) -> Result<(), AdapterError> {
        let beat_every = self
            .heartbeat
            .as_ref()
            .map_or(Duration::from_secs(3600), |beat| beat.every);
        let mut ticker = interval(beat_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.reset();

        loop {
            tokio::select! {
                _ = closed.cancelled() => return Ok(()),
                request = inbox.recv() => match request {
                    Some(request) => self.submit(request),
                    None => return Ok(()),
                },
                message = self.conn.next() => match message {
                    Some(Ok(Message::Response(response))) => self.settle(response)?,
                    Some(Ok(Message::Event(event))) => self.forward(event).await,
                    Some(Err(err)) => return Err(err.into()),
                    None => return Ok(()),
                },
                _ = ticker.tick(), if self.heartbeat.is_some() => self.beat()?,
            }
        }
    }

    fn submit(&mut self, request: Request) {
        let session = match request.target {
            CommandTarget::Browser => None,
            CommandTarget::Session(id) => Some(CdpSessionId::from(id)),
        };
        let method: MethodId = request.method.into();
        match self.conn.submit_command(method, session, request.params) {
            Ok(call) => {
                self.pending.insert(call, request.reply);
            }
            Err(err) => {
                let _ = request
                    .reply
                    .send(Err(AdapterError::internal(format!("unencodable command: {err}"))));
            }
        }
    }

    fn settle(&mut self, response: Response) -> Result<(), AdapterError> {
        if let Some(beat) = self.heartbeat.as_mut() {
            if matches!(&beat.outstanding, Some((call, _)) if *call == response.id) {
                beat.outstanding = None;
                return response_value(response).map(|_| ());
            }
        }
        if let Some(reply) = self.pending.remove(&response.id) {
            let _ = reply.send(response_value(response));
        }
        Ok(())
    }

    async fn forward(&self, event: CdpEventMessage) {
        let decoded: Result<CdpJsonEventMessage, _> = event.try_into();
        let raw = match decoded {
            Ok(raw) => raw,
            Err(err) => {
                warn!(target: "cdp-transport", %err, "undecodable cdp event");
                return;
            }
        };
        let event = TransportEvent {
            method: raw.method.into_owned(),
            params: raw.params,
            session_id: raw.session_id,
        };
        if self.outbox.send(event).await.is_err() {
            debug!(target: "cdp-transport", "event consumer gone");
        }
    }

    fn beat(&mut self) -> Result<(), AdapterError> {
        let Some(beat) = self.heartbeat.as_mut() else {
            return Ok(());
        };
        if let Some((_, sent)) = &beat.outstanding {
            if sent.elapsed() > beat.patience {
                return Err(AdapterError::new(AdapterErrorKind::NavTimeout)
                    .with_hint("heartbeat unanswered")
                    .retriable(true));
            }
            return Ok(());
        }
        let call = self
            .conn
            .submit_command("Browser.getVersion".into(), None, json!({}))
            .map_err(|err| AdapterError::internal(err.to_string()))?;
        beat.outstanding = Some((call, Instant::now()));
        Ok(())
    }
}

fn link_closed() -> AdapterError {
    AdapterError::io("browser connection closed")
}

fn response_value(response: Response) -> Result<Value, AdapterError> {
    match (response.result, response.error) {
        (Some(value), _) => Ok(value),
        (None, Some(error)) => Err(AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(format!("cdp error {}: {}", error.code, error.message))
            .retriable(error.code >= 500)),
        (None, None) => Err(AdapterError::internal("empty cdp response")),
    }
}

impl From<CdpError> for AdapterError {
    fn from(err: CdpError) -> Self {
        let hint = err.to_string();
        match err {
            CdpError::Timeout => AdapterError::new(AdapterErrorKind::NavTimeout)
                .with_hint(hint)
                .retriable(true),
            CdpError::FrameNotFound(_) | CdpError::JavascriptException(_) | CdpError::Serde(_) => {
                AdapterError::internal(hint)
            }
            _ => AdapterError::io(hint),
        }
    }
}
