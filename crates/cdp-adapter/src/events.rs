use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::ids::PageId;

/// Lifecycle phase the adapter emits when a new tab target appears.
pub const PHASE_OPENED: &str = "opened";
/// Lifecycle phase for a finished main-frame load.
pub const PHASE_LOAD: &str = "load";

/// Page-level events republished from the raw CDP stream.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RawEvent {
    /// Main-frame `Page.lifecycleEvent` (`init`, `domcontentloaded`, `load`, ...) or
    /// [`PHASE_OPENED`].
    PageLifecycle {
        page: PageId,
        frame: Option<String>,
        phase: String,
        ts: u64,
    },
    /// Main-frame cross-document navigation, reloads included.
    PageNavigated { page: PageId, url: String, ts: u64 },
    PageClosed { page: PageId },
    Error {
        page: Option<PageId>,
        message: String,
    },
}

impl RawEvent {
    pub fn page(&self) -> Option<PageId> {
        match self {
            RawEvent::PageLifecycle { page, .. }
            | RawEvent::PageNavigated { page, .. }
            | RawEvent::PageClosed { page } => Some(*page),
            RawEvent::Error { page, .. } => *page,
        }
    }

    pub fn is_load(&self) -> bool {
        matches!(self, RawEvent::PageLifecycle { phase, .. } if phase == PHASE_LOAD)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|since| since.as_millis() as u64)
        .unwrap_or_default()
}
