use std::time::Duration;

use cdp_adapter::AdapterError;
use pending_store::StoreError;
use promptrelay_core_types::{RelayError, SiteId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{site}: no input matched within {}ms", waited.as_millis())]
    TargetTimeout { site: SiteId, waited: Duration },
    #[error("{site}: editor holds {observed} chars after injection, expected {expected}")]
    InjectionMismatch {
        site: SiteId,
        expected: usize,
        observed: usize,
    },
    #[error("{site}: submit control still disabled after {}ms", waited.as_millis())]
    SubmitUnavailable { site: SiteId, waited: Duration },
    /// The submit action was sent but its reply never confirmed it; redelivery could send twice.
    #[error("{site}: submit outcome unknown: {source}")]
    SubmitUncertain {
        site: SiteId,
        #[source]
        source: AdapterError,
    },
    #[error("prompt is empty")]
    PromptEmpty,
    #[error("prompt exceeds max length ({0} chars)")]
    PromptTooLong(usize),
    #[error("browser port failed: {0}")]
    Port(#[from] AdapterError),
    #[error("pending store failed: {0}")]
    Store(#[from] StoreError),
}

impl DriverError {
    /// Whether redelivering the same request can succeed; only transport-level failures qualify.
    pub fn is_retriable(&self) -> bool {
        match self {
            DriverError::Port(err) => err.retriable,
            _ => false,
        }
    }

    /// The page may already hold the submitted prompt even though the delivery failed.
    pub fn may_have_submitted(&self) -> bool {
        matches!(self, DriverError::SubmitUncertain { .. })
    }

    /// Whether the simplified Enter path is worth trying after this failure.
    pub(crate) fn allows_fallback(&self) -> bool {
        !matches!(
            self,
            DriverError::SubmitUncertain { .. }
                | DriverError::PromptEmpty
                | DriverError::PromptTooLong(_)
                | DriverError::Store(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            DriverError::TargetTimeout { .. } => "target_timeout",
            DriverError::InjectionMismatch { .. } => "injection_mismatch",
            DriverError::SubmitUnavailable { .. } => "submit_unavailable",
            DriverError::SubmitUncertain { .. } => "submit_uncertain",
            DriverError::PromptEmpty => "prompt_empty",
            DriverError::PromptTooLong(_) => "prompt_too_long",
            DriverError::Port(_) => "port",
            DriverError::Store(_) => "store",
        }
    }
}

impl From<DriverError> for RelayError {
    fn from(err: DriverError) -> Self {
        if err.is_retriable() {
            RelayError::retriable(err.to_string())
        } else {
            RelayError::new(err.to_string())
        }
    }
}
