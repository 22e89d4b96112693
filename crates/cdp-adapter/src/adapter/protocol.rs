//! Turning raw target and page events into registry updates and [`RawEvent`]s.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::CdpAdapter;
use crate::error::AdapterError;
use crate::events::{now_ms, RawEvent, PHASE_OPENED};
use crate::ids::PageId;
use crate::metrics;
use crate::transport::{CommandTarget, TransportEvent};

/// Commands that make a freshly attached session report navigation and lifecycle events.
const SESSION_SETUP: [&str; 3] = ["Page.enable", "Page.setLifecycleEventsEnabled", "Runtime.enable"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    target_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    url: String,
}

impl TargetInfo {
    fn is_page(&self) -> bool {
        self.kind == "page"
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetEnvelope {
    target_info: TargetInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Attached {
    session_id: String,
    target_info: TargetInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Frame {
    id: String,
    parent_id: Option<String>,
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Lifecycle {
    name: String,
    frame_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExceptionDetails {
    text: Option<String>,
    exception: Option<RemoteObject>,
}

#[derive(Debug, Deserialize)]
struct RemoteObject {
    description: Option<String>,
}

/// The protocol events the adapter acts on.
#[derive(Debug)]
enum Incoming {
    TargetCreated(TargetInfo),
    TargetDestroyed(String),
    TargetChanged(TargetInfo),
    Attached(Attached),
    Detached(String),
    FrameNavigated(Frame),
    Lifecycle(Lifecycle),
    Exception(String),
}

impl Incoming {
    fn parse(method: &str, mut params: Value) -> Result<Option<Self>, AdapterError> {
        let incoming = match method {
            "Target.targetCreated" => Self::TargetCreated(field::<TargetEnvelope>(params)?.target_info),
            "Target.targetInfoChanged" => {
                Self::TargetChanged(field::<TargetEnvelope>(params)?.target_info)
            }
            "Target.targetDestroyed" => Self::TargetDestroyed(string_param(&params, "targetId")?),
            "Target.attachedToTarget" => Self::Attached(field(params)?),
            "Target.detachedFromTarget" => Self::Detached(string_param(&params, "sessionId")?),
            "Page.frameNavigated" => Self::FrameNavigated(field(take(&mut params, "frame"))?),
            "Page.lifecycleEvent" => Self::Lifecycle(field(params)?),
            "Runtime.exceptionThrown" => {
                let details: ExceptionDetails = field(take(&mut params, "exceptionDetails"))?;
                Self::Exception(
                    details
                        .exception
                        .and_then(|object| object.description)
                        .or(details.text)
                        .unwrap_or_else(|| "runtime exception".to_string()),
                )
            }
            _ => return Ok(None),
        };
        Ok(Some(incoming))
    }
}

fn take(params: &mut Value, key: &str) -> Value {
    params.get_mut(key).map(Value::take).unwrap_or_default()
}

fn field<T: DeserializeOwned>(params: Value) -> Result<T, AdapterError> {
    serde_json::from_value(params)
        .map_err(|err| AdapterError::internal(format!("malformed cdp event: {err}")))
}

fn string_param(params: &Value, key: &str) -> Result<String, AdapterError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AdapterError::internal(format!("cdp event missing {key}")))
}

impl CdpAdapter {
    pub(super) fn on_transport_event(&self, event: TransportEvent) {
        metrics::observe_event(&event.method);
        let session = event.session_id;
        let incoming = match Incoming::parse(&event.method, event.params) {
            Ok(Some(incoming)) => incoming,
            Ok(None) => {
                debug!(target: "cdp-adapter", method = %event.method, "ignored cdp event");
                return;
            }
            Err(err) => {
                self.publish(RawEvent::Error {
                    page: None,
                    message: format!("{}: {err}", event.method),
                });
                return;
            }
        };
        self.apply(incoming, session.as_deref());
    }

    fn apply(&self, incoming: Incoming, session: Option<&str>) {
        let page = session.and_then(|session| self.tabs.page_for_session(session));
        match incoming {
            Incoming::TargetCreated(info) if info.is_page() => {
                let page = self.tabs.track_target(&info.target_id);
                self.tabs.set_url(&page, info.url);
                self.publish(RawEvent::PageLifecycle {
                    page,
                    frame: None,
                    phase: PHASE_OPENED.to_string(),
                    ts: now_ms(),
                });
            }
            Incoming::TargetChanged(info) if info.is_page() => {
                // URL bookkeeping only; navigations are reported from Page.frameNavigated.
                if let Some(page) = self.tabs.page_for_target(&info.target_id) {
                    self.tabs.set_url(&page, info.url);
                }
            }
            Incoming::TargetDestroyed(target_id) => {
                if let Some(page) = self.tabs.remove_target(&target_id) {
                    self.publish(RawEvent::PageClosed { page });
                }
            }
            Incoming::Attached(attached) if attached.target_info.is_page() => {
                let page = self
                    .tabs
                    .attach(&attached.target_info.target_id, &attached.session_id);
                self.tabs.set_url(&page, attached.target_info.url);
                self.prepare_session(page, attached.session_id);
            }
            Incoming::Detached(session) => self.tabs.detach(&session),
            Incoming::FrameNavigated(frame) => {
                let Some(page) = page else { return };
                if frame.parent_id.is_some() {
                    return;
                }
                self.tabs.set_main_frame(&page, frame.id);
                self.tabs.set_url(&page, frame.url.clone());
                self.publish(RawEvent::PageNavigated {
                    page,
                    url: frame.url,
                    ts: now_ms(),
                });
            }
            Incoming::Lifecycle(lifecycle) => {
                let Some(page) = page else { return };
                if !self.tabs.is_main_frame(&page, lifecycle.frame_id.as_deref()) {
                    return;
                }
                self.publish(RawEvent::PageLifecycle {
                    page,
                    frame: lifecycle.frame_id,
                    phase: lifecycle.name.to_ascii_lowercase(),
                    ts: now_ms(),
                });
            }
            Incoming::Exception(message) => self.publish(RawEvent::Error { page, message }),
            Incoming::TargetCreated(_) | Incoming::TargetChanged(_) | Incoming::Attached(_) => {}
        }
    }

    /// Runs off the event loop, which must stay free to read the replies.
    fn prepare_session(&self, page: PageId, session: String) {
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            for method in SESSION_SETUP {
                let params = if method == "Page.setLifecycleEventsEnabled" {
                    json!({ "enabled": true })
                } else {
                    json!({})
                };
                let started = Instant::now();
                let sent = transport
                    .send_command(CommandTarget::Session(session.clone()), method, params)
                    .await;
                metrics::observe_command(method, started.elapsed(), sent.is_ok());
                if let Err(err) = sent {
                    warn!(target: "cdp-adapter", %page, method, %err, "session setup failed");
                    return;
                }
            }
            debug!(target: "cdp-adapter", %page, "session ready for lifecycle events");
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_prefers_the_object_description() {
        let parsed = Incoming::parse(
            "Runtime.exceptionThrown",
            json!({"exceptionDetails": {
                "text": "Uncaught",
                "exception": {"description": "TypeError: x is undefined"}
            }}),
        )
        .unwrap();
        assert!(matches!(
            parsed,
            Some(Incoming::Exception(message)) if message == "TypeError: x is undefined"
        ));
    }

    #[test]
    fn unknown_methods_are_skipped_and_bad_payloads_rejected() {
        assert!(Incoming::parse("Network.requestWillBeSent", Value::Null)
            .unwrap()
            .is_none());
        assert!(Incoming::parse("Target.targetDestroyed", json!({})).is_err());
    }
}
