//! Chromium DevTools Protocol adapter used by promptrelay.
//!
//! Launches or attaches to a Chromium instance, tracks open tabs and their CDP sessions, and
//! republishes the page lifecycle as [`RawEvent`]s on a broadcast bus. Site drivers talk to
//! pages only through the [`Cdp`] trait.

mod adapter;
mod config;
mod discover;
mod error;
mod events;
mod ids;

pub mod commands;
pub mod metrics;
pub mod registry;
pub mod transport;

use tokio::sync::broadcast;

pub use adapter::{AdapterMode, Cdp, CdpAdapter, EventBus};
pub use commands::{KeyPress, ScreenshotFormat};
pub use config::CdpConfig;
pub use error::{AdapterError, AdapterErrorKind};
pub use events::{RawEvent, PHASE_LOAD, PHASE_OPENED};
pub use ids::{BrowserId, PageId};
pub use metrics::AdapterMetricsSnapshot;
pub use registry::{Tab, TabRegistry};
pub use transport::{CdpTransport, CommandTarget, TransportEvent};

/// Create the broadcast bus the adapter publishes [`RawEvent`]s on.
pub fn event_bus(buffer: usize) -> (EventBus, broadcast::Receiver<RawEvent>) {
    broadcast::channel(buffer)
}
