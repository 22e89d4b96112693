//! Byte-level side of the adapter: sends CDP commands and yields raw protocol events.

mod chromium;
mod launch;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AdapterError, AdapterErrorKind};

pub use chromium::ChromiumTransport;

#[derive(Clone, Debug)]
pub struct TransportEvent {
    pub method: String,
    pub params: Value,
    pub session_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandTarget {
    Browser,
    Session(String),
}

#[async_trait]
pub trait CdpTransport: Send + Sync {
    async fn start(&self) -> Result<(), AdapterError>;

    /// Next protocol event; `None` once the underlying connection is gone.
    async fn next_event(&self) -> Option<TransportEvent>;

    async fn send_command(
        &self,
        target: CommandTarget,
        method: &str,
        params: Value,
    ) -> Result<Value, AdapterError>;

    /// True when no browser sits behind this transport.
    fn is_stub(&self) -> bool {
        false
    }
}

/// Stand-in used when no browser could be found. Every command fails with a remediation hint.
#[derive(Debug, Default)]
pub struct StubTransport;

#[async_trait]
impl CdpTransport for StubTransport {
    async fn start(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn next_event(&self) -> Option<TransportEvent> {
        None
    }

    async fn send_command(
        &self,
        _target: CommandTarget,
        method: &str,
        _params: Value,
    ) -> Result<Value, AdapterError> {
        Err(AdapterError::new(AdapterErrorKind::Internal).with_hint(format!(
            "{method} needs a browser: install Chrome/Chromium, or set PROMPTRELAY_CHROME or PROMPTRELAY_WS_URL"
        )))
    }

    fn is_stub(&self) -> bool {
        true
    }
}
