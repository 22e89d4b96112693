//! Per-site chat drivers.
//!
//! Each driver locates the site's prompt editor, injects text so the page's editor framework
//! registers it, waits for the send control and submits, falling back once to focus + Enter.
//! Drivers are idempotent per tab and pick up pending prompts on page load.

pub mod api;
pub mod cdp_port;
pub mod errors;
pub mod guard;
pub mod lock;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod ports;
pub mod scripts;
pub mod sites;

mod driver;
mod runner;
mod wait;

pub use api::{SiteRegistry, SiteRegistryBuilder};
pub use cdp_port::CdpDomPort;
pub use driver::SiteDriver;
pub use errors::DriverError;
pub use guard::{SubmissionGuard, SubmissionTicket};
pub use lock::{DeliveryClaim, DualLock, DualLockGuard};
pub use metrics::DeliveryMetricsSnapshot;
pub use model::{
    normalized_len, DeliveryReport, DeliveryRequest, EditorKind, InjectStrategy, Origin, Outcome,
    SkipReason, SubmitPath,
};
pub use policy::{DriverPolicy, SiteOverride, SiteTimeouts};
pub use ports::{DomPort, SubmitState};
pub use sites::SiteProfile;
