//! Per-tab `submitting` / `submitted` flags.

use std::collections::HashMap;
use std::sync::Arc;

use cdp_adapter::PageId;
use parking_lot::Mutex;

use crate::model::SkipReason;

#[derive(Clone, Copy, Debug, Default)]
struct TabFlags {
    submitting: bool,
    submitted: bool,
    /// Bumped on every navigation so a ticket from the previous document cannot mark the new one.
    generation: u64,
}

/// Idempotency flags for every tab one driver has seen.
#[derive(Clone, Debug, Default)]
pub struct SubmissionGuard {
    tabs: Arc<Mutex<HashMap<PageId, TabFlags>>>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `submitting` for `page`, or report why the tab is not available.
    pub fn try_begin(&self, page: PageId) -> Result<SubmissionTicket, SkipReason> {
        let mut tabs = self.tabs.lock();
        let flags = tabs.entry(page).or_default();
        if flags.submitting {
            return Err(SkipReason::AlreadySubmitting);
        }
        if flags.submitted {
            return Err(SkipReason::AlreadySubmitted);
        }
        flags.submitting = true;
        Ok(SubmissionTicket {
            tabs: Arc::clone(&self.tabs),
            page,
            generation: flags.generation,
            done: false,
        })
    }

    /// Whether a delivery is currently in flight on `page`.
    pub fn is_busy(&self, page: PageId) -> bool {
        self.tabs
            .lock()
            .get(&page)
            .map(|flags| flags.submitting)
            .unwrap_or(false)
    }

    pub fn is_submitted(&self, page: PageId) -> bool {
        self.tabs
            .lock()
            .get(&page)
            .map(|flags| flags.submitted)
            .unwrap_or(false)
    }

    /// Clear `submitted` after the tab navigated. An in-flight ticket keeps `submitting`.
    pub fn reset(&self, page: PageId) {
        let mut tabs = self.tabs.lock();
        if let Some(flags) = tabs.get_mut(&page) {
            flags.submitted = false;
            flags.generation = flags.generation.wrapping_add(1);
        }
    }

    pub fn forget(&self, page: PageId) {
        self.tabs.lock().remove(&page);
    }

    pub fn tracked(&self) -> usize {
        self.tabs.lock().len()
    }
}

/// Holds `submitting` for one tab until dropped.
#[derive(Debug)]
pub struct SubmissionTicket {
    tabs: Arc<Mutex<HashMap<PageId, TabFlags>>>,
    page: PageId,
    generation: u64,
    done: bool,
}

impl SubmissionTicket {
    /// Mark the tab submitted, unless it navigated while this ticket was held.
    pub fn succeed(mut self) {
        self.finish(true);
    }

    fn finish(&mut self, submitted: bool) {
        if self.done {
            return;
        }
        self.done = true;
        let mut tabs = self.tabs.lock();
        if let Some(flags) = tabs.get_mut(&self.page) {
            flags.submitting = false;
            if submitted && flags.generation == self.generation {
                flags.submitted = true;
            }
        }
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.finish(false);
    }
}
