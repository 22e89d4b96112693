use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Page shapes with a dedicated extraction script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Article,
    Reddit,
    FourChan,
    YouTube,
}

impl PageKind {
    /// Classify by URL alone. Anything unrecognised, including unparsable input, is an article.
    pub fn classify(url: &str) -> Self {
        let Ok(parsed) = Url::parse(url) else {
            return PageKind::Article;
        };
        let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
        let path = parsed.path();

        if host_is(&host, "reddit.com") && path.contains("/comments/") {
            return PageKind::Reddit;
        }
        if (host == "boards.4chan.org" || host == "boards.4channel.org") && path.contains("/thread/")
        {
            return PageKind::FourChan;
        }
        if host_is(&host, "youtube.com")
            && path == "/watch"
            && parsed.query_pairs().any(|(key, _)| key == "v")
        {
            return PageKind::YouTube;
        }
        if host == "youtu.be" && path.len() > 1 {
            return PageKind::YouTube;
        }
        PageKind::Article
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageKind::Article => "article",
            PageKind::Reddit => "reddit",
            PageKind::FourChan => "4chan",
            PageKind::YouTube => "youtube",
        }
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn host_is(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_layouts() {
        let cases = [
            ("https://www.reddit.com/r/rust/comments/abc123/some_title/", PageKind::Reddit),
            ("https://old.reddit.com/r/rust/comments/abc123/", PageKind::Reddit),
            ("https://www.reddit.com/r/rust/", PageKind::Article),
            ("https://boards.4chan.org/g/thread/123456", PageKind::FourChan),
            ("https://boards.4channel.org/v/thread/1", PageKind::FourChan),
            ("https://boards.4chan.org/g/catalog", PageKind::Article),
            ("https://www.youtube.com/watch?v=dQw4w9WgXcQ", PageKind::YouTube),
            ("https://m.youtube.com/watch?v=x&t=10", PageKind::YouTube),
            ("https://youtu.be/dQw4w9WgXcQ", PageKind::YouTube),
            ("https://www.youtube.com/@channel", PageKind::Article),
            ("https://blog.rust-lang.org/2024/01/01/post.html", PageKind::Article),
            ("not a url", PageKind::Article),
        ];
        for (url, expected) in cases {
            assert_eq!(PageKind::classify(url), expected, "{url}");
        }
    }
}
