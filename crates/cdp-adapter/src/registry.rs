//! Open tabs, keyed by [`PageId`], with reverse indexes from CDP target and session ids.

use dashmap::DashMap;
use serde::Serialize;
use url::Url;

use crate::ids::PageId;

#[derive(Clone, Debug, Default, Serialize)]
pub struct Tab {
    pub target_id: Option<String>,
    /// Flattened CDP session; commands for the tab are routed through it.
    pub session: Option<String>,
    pub url: Option<String>,
    pub main_frame: Option<String>,
}

#[derive(Default)]
pub struct TabRegistry {
    tabs: DashMap<PageId, Tab>,
    by_target: DashMap<String, PageId>,
    by_session: DashMap<String, PageId>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tab whose ids are already known.
    pub fn insert(&self, page: PageId, target_id: Option<String>, session: Option<String>) {
        if let Some(target) = &target_id {
            self.by_target.insert(target.clone(), page);
        }
        if let Some(session) = &session {
            self.by_session.insert(session.clone(), page);
        }
        self.tabs.insert(
            page,
            Tab {
                target_id,
                session,
                ..Tab::default()
            },
        );
    }

    /// Page for `target_id`, registering a fresh tab on first sight.
    pub fn track_target(&self, target_id: &str) -> PageId {
        if let Some(page) = self.page_for_target(target_id) {
            return page;
        }
        let page = PageId::new();
        self.insert(page, Some(target_id.to_string()), None);
        page
    }

    pub fn attach(&self, target_id: &str, session: &str) -> PageId {
        let page = self.track_target(target_id);
        self.by_session.insert(session.to_string(), page);
        if let Some(mut tab) = self.tabs.get_mut(&page) {
            tab.session = Some(session.to_string());
        }
        page
    }

    pub fn detach(&self, session: &str) {
        if let Some((_, page)) = self.by_session.remove(session) {
            if let Some(mut tab) = self.tabs.get_mut(&page) {
                if tab.session.as_deref() == Some(session) {
                    tab.session = None;
                }
            }
        }
    }

    /// Forget the tab behind `target_id`, returning its page.
    pub fn remove_target(&self, target_id: &str) -> Option<PageId> {
        let (_, page) = self.by_target.remove(target_id)?;
        self.by_session.retain(|_, owner| *owner != page);
        self.tabs.remove(&page);
        Some(page)
    }

    /// Forget every tab, returning the pages that were open.
    pub fn clear(&self) -> Vec<PageId> {
        let pages = self.pages();
        self.tabs.clear();
        self.by_target.clear();
        self.by_session.clear();
        pages
    }

    pub fn page_for_target(&self, target_id: &str) -> Option<PageId> {
        self.by_target.get(target_id).map(|entry| *entry)
    }

    pub fn page_for_session(&self, session: &str) -> Option<PageId> {
        self.by_session.get(session).map(|entry| *entry)
    }

    pub fn get(&self, page: &PageId) -> Option<Tab> {
        self.tabs.get(page).map(|tab| tab.clone())
    }

    pub fn contains(&self, page: &PageId) -> bool {
        self.tabs.contains_key(page)
    }

    pub fn session(&self, page: &PageId) -> Option<String> {
        self.tabs.get(page)?.session.clone()
    }

    pub fn url(&self, page: &PageId) -> Option<String> {
        self.tabs.get(page)?.url.clone()
    }

    pub fn set_url(&self, page: &PageId, url: impl Into<String>) {
        let url = url.into();
        if url.is_empty() {
            return;
        }
        if let Some(mut tab) = self.tabs.get_mut(page) {
            tab.url = Some(url);
        }
    }

    pub fn set_main_frame(&self, page: &PageId, frame: impl Into<String>) {
        if let Some(mut tab) = self.tabs.get_mut(page) {
            tab.main_frame = Some(frame.into());
        }
    }

    /// Whether `frame` belongs to the tab's main frame. Unknown main frames accept anything.
    pub fn is_main_frame(&self, page: &PageId, frame: Option<&str>) -> bool {
        let Some(tab) = self.tabs.get(page) else {
            return false;
        };
        match (tab.main_frame.as_deref(), frame) {
            (Some(main), Some(frame)) => main == frame,
            _ => true,
        }
    }

    /// An attached tab whose URL is on `host` or one of its subdomains.
    pub fn find_by_host(&self, host: &str) -> Option<PageId> {
        let wanted = host.trim_start_matches("www.").to_ascii_lowercase();
        let suffix = format!(".{wanted}");
        self.tabs.iter().find_map(|entry| {
            let tab = entry.value();
            tab.session.as_ref()?;
            let url = Url::parse(tab.url.as_deref()?).ok()?;
            let current = url.host_str()?.to_ascii_lowercase();
            (current == wanted || current.ends_with(&suffix)).then_some(*entry.key())
        })
    }

    pub fn pages(&self) -> Vec<PageId> {
        self.tabs.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}
