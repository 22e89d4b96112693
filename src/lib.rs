//! promptrelay: capture a page, wrap it in a prompt and hand it to an AI chat site over CDP.
//!
//! The library half holds config, the direct dispatcher and the page-load watcher so they can
//! be driven from integration tests; `cli` wires them to the binary.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod watcher;

pub use config::{ConfigError, DeliveryConfig, RelayConfig, StoreConfig};
pub use dispatcher::{DispatchError, DispatchOutcome, DispatchPolicy, Dispatcher};
pub use watcher::{WatchSummary, Watcher};
