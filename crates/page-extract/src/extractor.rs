use std::time::Duration;

use cdp_adapter::{Cdp, PageId};
use tracing::{debug, instrument};

use crate::content::ExtractedContent;
use crate::errors::ExtractError;
use crate::kind::PageKind;
use crate::scripts::extraction_script;

#[derive(Clone, Debug)]
pub struct Extractor {
    pub max_chars: usize,
    pub ready_timeout: Duration,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            max_chars: 24_000,
            ready_timeout: Duration::from_secs(15),
        }
    }
}

impl Extractor {
    pub fn new(max_chars: usize) -> Self {
        Self {
            max_chars,
            ..Self::default()
        }
    }

    /// Capture the readable content of `page` using the script for its URL's kind.
    #[instrument(skip_all, fields(page = %page))]
    pub async fn extract(
        &self,
        cdp: &dyn Cdp,
        page: PageId,
    ) -> Result<ExtractedContent, ExtractError> {
        cdp.wait_dom_ready(page, self.ready_timeout).await?;
        let url = cdp.current_url(page).await?;
        let kind = PageKind::classify(&url);
        debug!(target: "page-extract", %url, kind = kind.as_str(), "extracting");

        let value = cdp.evaluate_script(page, &extraction_script(kind)).await?;
        let content = ExtractedContent::from_value(kind, url, value, self.max_chars)?;
        debug!(
            target: "page-extract",
            chars = content.char_count(),
            truncated = content.truncated,
            "extracted"
        );
        Ok(content)
    }
}
