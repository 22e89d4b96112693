use async_trait::async_trait;
use cdp_adapter::{AdapterError, PageId};
use serde::{Deserialize, Serialize};

/// Submit control state as seen by one probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "selector", rename_all = "snake_case")]
pub enum SubmitState {
    /// No selector matched a visible element.
    Missing,
    Disabled(String),
    Enabled(String),
}

/// Semantic DOM operations the delivery runner needs from a tab.
///
/// Selector lists are tried in order and the first visible match wins.
#[async_trait]
pub trait DomPort: Send + Sync {
    /// First selector with a visible match, if any.
    async fn probe(&self, page: PageId, selectors: &[String])
        -> Result<Option<String>, AdapterError>;
    /// Native value setter plus `input`/`change` events. Textareas and inputs only.
    async fn set_value(&self, page: PageId, selector: &str, text: &str)
        -> Result<(), AdapterError>;
    /// Focus, select-all and delete through the editing pipeline.
    async fn clear_editor(&self, page: PageId, selector: &str) -> Result<(), AdapterError>;
    /// `execCommand('insertText')`; returns what the command reported.
    async fn exec_insert(&self, page: PageId, selector: &str, text: &str)
        -> Result<bool, AdapterError>;
    /// Synthetic paste event with a `DataTransfer` payload.
    async fn paste(&self, page: PageId, selector: &str, text: &str) -> Result<(), AdapterError>;
    /// Trusted text insertion into the focused element.
    async fn native_insert(&self, page: PageId, text: &str) -> Result<(), AdapterError>;
    /// `value` for text controls, rendered text for contenteditable.
    async fn read_text(&self, page: PageId, selector: &str) -> Result<String, AdapterError>;
    async fn submit_state(&self, page: PageId, selectors: &[String])
        -> Result<SubmitState, AdapterError>;
    /// Returns false when nothing matched `selector`.
    async fn click(&self, page: PageId, selector: &str) -> Result<bool, AdapterError>;
    /// Focus `selector` and press Enter.
    async fn press_enter(&self, page: PageId, selector: &str) -> Result<(), AdapterError>;
    /// Focus `selector` with the caret at the end. Returns false when nothing matched.
    async fn focus(&self, page: PageId, selector: &str) -> Result<bool, AdapterError>;
}
