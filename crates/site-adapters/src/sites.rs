//! Built-in site table.
//!
//! Selectors and timings are tuned against live markup and go stale when a site ships a new UI;
//! every field can be overridden from config (see [`SiteOverride`]).

use std::time::Duration;

use promptrelay_core_types::SiteId;
use serde::Serialize;

use crate::model::{EditorKind, InjectStrategy};
use crate::policy::{SiteOverride, SiteTimeouts};

const DEFAULT_FRESHNESS: Duration = Duration::from_secs(60);
const SLOW_SITE_FRESHNESS: Duration = Duration::from_secs(120);

const RICH_DEFAULT: &[InjectStrategy] = &[
    InjectStrategy::ExecCommand,
    InjectStrategy::Paste,
    InjectStrategy::NativeInsert,
];
const PLAIN_DEFAULT: &[InjectStrategy] = &[InjectStrategy::NativeSetter, InjectStrategy::NativeInsert];

#[derive(Clone, Debug, Serialize)]
pub struct SiteProfile {
    pub id: SiteId,
    pub display_name: &'static str,
    pub start_url: String,
    /// Hosts served by the site; subdomains match too.
    pub hosts: Vec<&'static str>,
    pub input_selectors: Vec<String>,
    pub submit_selectors: Vec<String>,
    pub editor: EditorKind,
    pub strategies: Vec<InjectStrategy>,
    pub timeouts: SiteTimeouts,
    #[serde(serialize_with = "serialize_secs")]
    pub freshness: Duration,
    /// Only one tab may deliver at a time (in-memory flag + storage lock).
    pub exclusive: bool,
}

fn serialize_secs<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(value.as_secs())
}

impl SiteProfile {
    pub fn builtin(id: SiteId) -> Self {
        let selectors = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        match id {
            SiteId::ChatGpt => Self {
                id,
                display_name: "ChatGPT",
                start_url: "https://chatgpt.com/".into(),
                hosts: vec!["chatgpt.com", "chat.openai.com"],
                input_selectors: selectors(&[
                    "#prompt-textarea[contenteditable='true']",
                    "div.ProseMirror[contenteditable='true']",
                    "textarea#prompt-textarea",
                ]),
                submit_selectors: selectors(&[
                    "button[data-testid='send-button']",
                    "button#composer-submit-button",
                    "form button[type='submit']",
                ]),
                editor: EditorKind::RichText,
                strategies: RICH_DEFAULT.to_vec(),
                timeouts: SiteTimeouts::new(15_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: false,
            },
            SiteId::Claude => Self {
                id,
                display_name: "Claude",
                start_url: "https://claude.ai/new".into(),
                hosts: vec!["claude.ai"],
                input_selectors: selectors(&[
                    "div.ProseMirror[contenteditable='true']",
                    "[contenteditable='true'][role='textbox']",
                ]),
                submit_selectors: selectors(&[
                    "button[aria-label='Send message']",
                    "button[aria-label*='Send']",
                ]),
                editor: EditorKind::RichText,
                strategies: vec![
                    InjectStrategy::Paste,
                    InjectStrategy::ExecCommand,
                    InjectStrategy::NativeInsert,
                ],
                timeouts: SiteTimeouts::new(15_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: false,
            },
            SiteId::Gemini => Self {
                id,
                display_name: "Gemini",
                start_url: "https://gemini.google.com/app".into(),
                hosts: vec!["gemini.google.com"],
                input_selectors: selectors(&[
                    "rich-textarea .ql-editor[contenteditable='true']",
                    ".ql-editor[contenteditable='true']",
                    "rich-textarea [contenteditable='true']",
                ]),
                submit_selectors: selectors(&[
                    "button.send-button",
                    "button[aria-label*='Send']",
                    "button[mattooltip*='Send']",
                ]),
                editor: EditorKind::RichText,
                strategies: vec![InjectStrategy::ExecCommand, InjectStrategy::NativeInsert],
                timeouts: SiteTimeouts::new(30_000, 8_000),
                freshness: SLOW_SITE_FRESHNESS,
                exclusive: false,
            },
            SiteId::Grok => Self {
                id,
                display_name: "Grok",
                start_url: "https://grok.com/".into(),
                hosts: vec!["grok.com"],
                input_selectors: selectors(&[
                    "textarea[aria-label*='Grok']",
                    "form textarea",
                    "textarea",
                ]),
                submit_selectors: selectors(&[
                    "button[type='submit'][aria-label*='Submit']",
                    "form button[type='submit']",
                ]),
                editor: EditorKind::PlainText,
                strategies: PLAIN_DEFAULT.to_vec(),
                timeouts: SiteTimeouts::new(10_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: false,
            },
            SiteId::Mistral => Self {
                id,
                display_name: "Le Chat",
                start_url: "https://chat.mistral.ai/chat".into(),
                hosts: vec!["chat.mistral.ai"],
                input_selectors: selectors(&[
                    "div.ProseMirror[contenteditable='true']",
                    "textarea[name='message.text']",
                    "textarea",
                ]),
                submit_selectors: selectors(&[
                    "button[aria-label='Send question']",
                    "form button[type='submit']",
                ]),
                editor: EditorKind::RichText,
                strategies: vec![InjectStrategy::ExecCommand, InjectStrategy::NativeInsert],
                timeouts: SiteTimeouts::new(10_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: false,
            },
            SiteId::DeepSeek => Self {
                id,
                display_name: "DeepSeek",
                start_url: "https://chat.deepseek.com/".into(),
                hosts: vec!["chat.deepseek.com"],
                input_selectors: selectors(&["textarea#chat-input", "textarea"]),
                submit_selectors: selectors(&["div[role='button'][aria-disabled]"]),
                editor: EditorKind::PlainText,
                strategies: PLAIN_DEFAULT.to_vec(),
                timeouts: SiteTimeouts::new(8_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: false,
            },
            SiteId::Perplexity => Self {
                id,
                display_name: "Perplexity",
                start_url: "https://www.perplexity.ai/".into(),
                hosts: vec!["perplexity.ai"],
                input_selectors: selectors(&[
                    "#ask-input[contenteditable='true']",
                    "div[contenteditable='true'][data-lexical-editor='true']",
                    "textarea[placeholder]",
                ]),
                submit_selectors: selectors(&[
                    "button[data-testid='submit-button']",
                    "button[aria-label='Submit']",
                ]),
                editor: EditorKind::RichText,
                strategies: vec![
                    InjectStrategy::Paste,
                    InjectStrategy::ExecCommand,
                    InjectStrategy::NativeInsert,
                ],
                timeouts: SiteTimeouts::new(10_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: false,
            },
            SiteId::Kimi => Self {
                id,
                display_name: "Kimi",
                start_url: "https://www.kimi.com/".into(),
                hosts: vec!["kimi.com", "kimi.moonshot.cn"],
                input_selectors: selectors(&[
                    "div.chat-input-editor[contenteditable='true']",
                    "[contenteditable='true'][data-lexical-editor='true']",
                ]),
                submit_selectors: selectors(&[
                    "div.send-button-container .send-button",
                    ".send-button",
                ]),
                editor: EditorKind::RichText,
                strategies: vec![
                    InjectStrategy::Paste,
                    InjectStrategy::ExecCommand,
                    InjectStrategy::NativeInsert,
                ],
                timeouts: SiteTimeouts::new(12_000, 5_000),
                freshness: DEFAULT_FRESHNESS,
                exclusive: true,
            },
            SiteId::AiStudio => Self {
                id,
                display_name: "AI Studio",
                start_url: "https://aistudio.google.com/prompts/new_chat".into(),
                hosts: vec!["aistudio.google.com"],
                input_selectors: selectors(&[
                    "ms-prompt-input-wrapper textarea",
                    "ms-autosize-textarea textarea",
                    "textarea[aria-label]",
                ]),
                submit_selectors: selectors(&["run-button button", "button[aria-label='Run']"]),
                editor: EditorKind::PlainText,
                strategies: PLAIN_DEFAULT.to_vec(),
                timeouts: SiteTimeouts::new(30_000, 8_000),
                freshness: SLOW_SITE_FRESHNESS,
                exclusive: false,
            },
        }
    }

    pub fn apply(&mut self, patch: &SiteOverride) {
        if let Some(url) = &patch.start_url {
            self.start_url = url.clone();
        }
        if let Some(ms) = patch.acquire_ms {
            self.timeouts.acquire_ms = ms;
        }
        if let Some(ms) = patch.enable_ms {
            self.timeouts.enable_ms = ms;
        }
        if let Some(ms) = patch.poll_ms {
            self.timeouts.poll_ms = ms;
        }
        if let Some(ms) = patch.settle_ms {
            self.timeouts.settle_ms = ms;
        }
        if let Some(secs) = patch.freshness_secs {
            self.freshness = Duration::from_secs(secs);
        }
        prepend(&mut self.input_selectors, &patch.input_selectors);
        prepend(&mut self.submit_selectors, &patch.submit_selectors);
    }

    /// Whether `host` belongs to this site.
    pub fn matches_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.hosts
            .iter()
            .any(|known| host == *known || host.ends_with(&format!(".{known}")))
    }

    /// Host used to look for an already-open tab.
    pub fn primary_host(&self) -> &str {
        self.hosts.first().copied().unwrap_or_default()
    }
}

fn prepend(target: &mut Vec<String>, extra: &[String]) {
    if extra.is_empty() {
        return;
    }
    let mut merged: Vec<String> = extra.to_vec();
    merged.extend(target.drain(..).filter(|s| !extra.contains(s)));
    *target = merged;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_site_has_inputs_and_strategies() {
        for site in SiteId::ALL {
            let profile = SiteProfile::builtin(site);
            assert_eq!(profile.id, site);
            assert!(!profile.input_selectors.is_empty(), "{site}");
            assert!(!profile.strategies.is_empty(), "{site}");
            let acquire = profile.timeouts.acquire();
            assert!(acquire >= Duration::from_secs(8) && acquire <= Duration::from_secs(30));
            if profile.editor == EditorKind::RichText {
                assert!(!profile.strategies.contains(&InjectStrategy::NativeSetter));
            }
        }
    }

    #[test]
    fn slow_sites_get_longer_freshness() {
        assert_eq!(SiteProfile::builtin(SiteId::Gemini).freshness.as_secs(), 120);
        assert_eq!(SiteProfile::builtin(SiteId::AiStudio).freshness.as_secs(), 120);
        assert_eq!(SiteProfile::builtin(SiteId::Claude).freshness.as_secs(), 60);
    }

    #[test]
    fn only_kimi_is_exclusive() {
        let exclusive: Vec<_> = SiteId::ALL
            .into_iter()
            .filter(|s| SiteProfile::builtin(*s).exclusive)
            .collect();
        assert_eq!(exclusive, vec![SiteId::Kimi]);
    }

    #[test]
    fn override_prepends_selectors_and_patches_timing() {
        let mut profile = SiteProfile::builtin(SiteId::Grok);
        profile.apply(&SiteOverride {
            acquire_ms: Some(2_000),
            freshness_secs: Some(90),
            input_selectors: vec!["#custom".into(), "textarea".into()],
            ..SiteOverride::default()
        });
        assert_eq!(profile.timeouts.acquire_ms, 2_000);
        assert_eq!(profile.freshness, Duration::from_secs(90));
        assert_eq!(profile.input_selectors[0], "#custom");
        assert_eq!(
            profile
                .input_selectors
                .iter()
                .filter(|s| s.as_str() == "textarea")
                .count(),
            1
        );
    }

    #[test]
    fn host_matching_accepts_subdomains_only() {
        let profile = SiteProfile::builtin(SiteId::Perplexity);
        assert!(profile.matches_host("www.perplexity.ai"));
        assert!(profile.matches_host("perplexity.ai"));
        assert!(!profile.matches_host("notperplexity.ai"));
    }
}
