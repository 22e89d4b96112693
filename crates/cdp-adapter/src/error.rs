use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterErrorKind {
    #[error("navigation timed out")]
    NavTimeout,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("page not ready")]
    PageNotReady,
    #[error("target not found")]
    TargetNotFound,
    #[error("script raised an exception")]
    ScriptException,
    #[error("internal error")]
    Internal,
}

impl AdapterErrorKind {
    /// Whether an error of this kind is worth retrying when nothing more specific is known.
    pub fn retriable_by_default(self) -> bool {
        matches!(self, AdapterErrorKind::PageNotReady)
    }
}

/// Failure from a browser operation, with an optional hint and structured detail for callers.
#[derive(Clone, Debug, Error, Serialize, Deserialize)]
#[error("{}{}", .kind, hint_suffix(.hint))]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<Value>,
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_deref()
        .map(|hint| format!(": {hint}"))
        .unwrap_or_default()
}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: kind.retriable_by_default(),
            data: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn io(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::CdpIo).with_hint(hint).retriable(true)
    }

    pub(crate) fn internal(hint: impl Into<String>) -> Self {
        Self::new(AdapterErrorKind::Internal).with_hint(hint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_hint_when_present() {
        let bare = AdapterError::new(AdapterErrorKind::TargetNotFound);
        assert_eq!(bare.to_string(), "target not found");

        let hinted = AdapterError::new(AdapterErrorKind::CdpIo).with_hint("socket reset");
        assert_eq!(hinted.to_string(), "cdp i/o failure: socket reset");
    }

    #[test]
    fn only_unready_pages_retry_by_default() {
        assert!(AdapterError::new(AdapterErrorKind::PageNotReady).retriable);
        assert!(!AdapterError::new(AdapterErrorKind::ScriptException).retriable);
        assert!(AdapterError::io("closed").retriable);
    }
}
