mod support;

use std::sync::Arc;

use cdp_adapter::PageId;
use pending_store::InMemoryPendingStore;
use promptrelay_core_types::SiteId;
use site_adapters::{EditorKind, SiteOverride, SiteRegistry};
use support::FakeDom;

fn registry() -> SiteRegistry {
    SiteRegistry::builder(
        Arc::new(FakeDom::new(EditorKind::PlainText)),
        Arc::new(InMemoryPendingStore::new()),
    )
    .with_override(
        SiteId::Claude,
        SiteOverride {
            acquire_ms: Some(1_234),
            ..SiteOverride::default()
        },
    )
    .build()
}

#[test]
fn urls_resolve_to_sites_by_host() {
    let registry = registry();
    let cases = [
        ("https://chatgpt.com/c/abc", Some(SiteId::ChatGpt)),
        ("https://chat.openai.com/", Some(SiteId::ChatGpt)),
        ("https://claude.ai/new", Some(SiteId::Claude)),
        ("https://gemini.google.com/app/123", Some(SiteId::Gemini)),
        ("https://aistudio.google.com/prompts/new_chat", Some(SiteId::AiStudio)),
        ("https://www.perplexity.ai/search?q=x", Some(SiteId::Perplexity)),
        ("https://kimi.moonshot.cn/", Some(SiteId::Kimi)),
        ("https://www.google.com/", None),
        ("about:blank", None),
        ("not a url", None),
    ];
    for (url, expected) in cases {
        assert_eq!(registry.resolve(url), expected, "{url}");
    }
}

#[test]
fn every_site_has_a_driver_and_overrides_apply() {
    let registry = registry();
    assert_eq!(registry.drivers().count(), SiteId::ALL.len());
    let claude = registry.driver(SiteId::Claude).unwrap();
    assert_eq!(claude.profile().timeouts.acquire_ms, 1_234);
    assert_eq!(
        registry
            .driver_for_url("https://grok.com/chat")
            .map(|d| d.site()),
        Some(SiteId::Grok)
    );
}

#[test]
fn forget_clears_every_driver() {
    let registry = registry();
    let page = PageId::new();
    for driver in registry.drivers() {
        driver.guard().try_begin(page).unwrap().succeed();
    }
    registry.forget(page);
    assert!(registry.drivers().all(|d| d.guard().tracked() == 0));
}
