use std::time::Instant;

use cdp_adapter::PageId;
use promptrelay_core_types::{DeliveryId, SiteId};
use serde::{Deserialize, Serialize};

/// How a prompt reached the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Sent by the dispatcher right after it opened the tab.
    Direct,
    /// Claimed from the pending store on page load.
    PendingPickup,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub id: DeliveryId,
    pub site: SiteId,
    pub prompt: String,
    pub origin: Origin,
}

impl DeliveryRequest {
    pub fn direct(id: DeliveryId, site: SiteId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            site,
            prompt: prompt.into(),
            origin: Origin::Direct,
        }
    }
}

/// Which editor family a site uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKind {
    /// `textarea` / `input`: the value setter plus `input`/`change` events is enough.
    PlainText,
    /// contenteditable frameworks (ProseMirror, Quill, Lexical) that keep their own model.
    RichText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectStrategy {
    /// Native `value` setter followed by synthetic `input` and `change`.
    NativeSetter,
    /// `document.execCommand('insertText')` after select-all + delete.
    ExecCommand,
    /// Synthetic `paste` event carrying a `DataTransfer`.
    Paste,
    /// CDP `Input.insertText` into the focused editor.
    NativeInsert,
}

impl InjectStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InjectStrategy::NativeSetter => "native_setter",
            InjectStrategy::ExecCommand => "exec_command",
            InjectStrategy::Paste => "paste",
            InjectStrategy::NativeInsert => "native_insert",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPath {
    Click,
    /// No submit control matched, so Enter was pressed on the input.
    Enter,
    /// The protocol failed and the simplified focus + Enter path submitted instead.
    FallbackEnter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AlreadySubmitting,
    AlreadySubmitted,
    /// Another tab holds the site's exclusive lock.
    Locked,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::AlreadySubmitting => "already_submitting",
            SkipReason::AlreadySubmitted => "already_submitted",
            SkipReason::Locked => "locked",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Outcome {
    Submitted,
    Skipped(SkipReason),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub id: DeliveryId,
    pub site: SiteId,
    pub page: PageId,
    pub origin: Origin,
    pub outcome: Outcome,
    pub strategy: Option<InjectStrategy>,
    pub submit_path: Option<SubmitPath>,
    pub fallback_used: bool,
    pub latency_ms: u64,
    pub injected_len: usize,
    pub observed_len: Option<usize>,
}

impl DeliveryReport {
    pub(crate) fn skipped(request: &DeliveryRequest, page: PageId, reason: SkipReason) -> Self {
        Self {
            id: request.id.clone(),
            site: request.site,
            page,
            origin: request.origin,
            outcome: Outcome::Skipped(reason),
            strategy: None,
            submit_path: None,
            fallback_used: false,
            latency_ms: 0,
            injected_len: normalized_len(&request.prompt),
            observed_len: None,
        }
    }

    pub(crate) fn submitted(
        request: &DeliveryRequest,
        page: PageId,
        started: Instant,
        strategy: Option<InjectStrategy>,
        submit_path: SubmitPath,
        observed_len: Option<usize>,
    ) -> Self {
        Self {
            id: request.id.clone(),
            site: request.site,
            page,
            origin: request.origin,
            outcome: Outcome::Submitted,
            strategy,
            submit_path: Some(submit_path),
            fallback_used: matches!(submit_path, SubmitPath::FallbackEnter),
            latency_ms: started.elapsed().as_millis() as u64,
            injected_len: normalized_len(&request.prompt),
            observed_len,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self.outcome, Outcome::Submitted)
    }
}

/// Character count after collapsing whitespace runs to one space and trimming.
///
/// Rich editors turn newlines into paragraph boundaries and may add trailing breaks, so raw
/// lengths of injected and read-back text never line up.
pub fn normalized_len(text: &str) -> usize {
    let mut count = 0usize;
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            pending_space = count > 0;
        } else {
            if pending_space {
                count += 1;
                pending_space = false;
            }
            count += 1;
        }
    }
    count
}
