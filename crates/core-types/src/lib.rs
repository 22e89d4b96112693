use std::fmt;
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use uuid::Uuid;

/// Shared error type passed across crate seams.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("{message}")]
    Message { message: String, retriable: bool },
}

impl RelayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
            retriable: false,
        }
    }

    pub fn retriable(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
            retriable: true,
        }
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Message { retriable, .. } => *retriable,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Message { message, .. } => message,
        }
    }
}

/// Identifier for one prompt delivery, shared by the direct and pending paths.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DeliveryId(pub String);

impl DeliveryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Destination chat sites.
#[cfg_attr(
    feature = "serde-full",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum SiteId {
    ChatGpt,
    Claude,
    Gemini,
    Grok,
    Mistral,
    DeepSeek,
    Perplexity,
    Kimi,
    AiStudio,
}

impl SiteId {
    pub const ALL: [SiteId; 9] = [
        SiteId::ChatGpt,
        SiteId::Claude,
        SiteId::Gemini,
        SiteId::Grok,
        SiteId::Mistral,
        SiteId::DeepSeek,
        SiteId::Perplexity,
        SiteId::Kimi,
        SiteId::AiStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SiteId::ChatGpt => "chatgpt",
            SiteId::Claude => "claude",
            SiteId::Gemini => "gemini",
            SiteId::Grok => "grok",
            SiteId::Mistral => "mistral",
            SiteId::DeepSeek => "deepseek",
            SiteId::Perplexity => "perplexity",
            SiteId::Kimi => "kimi",
            SiteId::AiStudio => "aistudio",
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown site '{0}'")]
pub struct UnknownSite(pub String);

impl FromStr for SiteId {
    type Err = UnknownSite;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let lower = raw.trim().to_ascii_lowercase();
        let site = match lower.as_str() {
            "chatgpt" | "openai" => SiteId::ChatGpt,
            "claude" => SiteId::Claude,
            "gemini" => SiteId::Gemini,
            "grok" => SiteId::Grok,
            "mistral" | "lechat" => SiteId::Mistral,
            "deepseek" => SiteId::DeepSeek,
            "perplexity" => SiteId::Perplexity,
            "kimi" => SiteId::Kimi,
            "aistudio" | "ai-studio" => SiteId::AiStudio,
            _ => return Err(UnknownSite(raw.to_string())),
        };
        Ok(site)
    }
}

/// Wall-clock milliseconds since the unix epoch.
pub fn timestamp_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_millis() as u64
}

/// Render a millisecond timestamp as RFC 3339 for listings.
#[cfg(feature = "serde-full")]
pub fn format_timestamp(ms: u64) -> String {
    use chrono::{TimeZone, Utc};
    match Utc.timestamp_millis_opt(ms as i64) {
        chrono::LocalResult::Single(ts) => ts.to_rfc3339(),
        _ => ms.to_string(),
    }
}
