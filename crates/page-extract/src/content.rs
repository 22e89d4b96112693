use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ExtractError;
use crate::kind::PageKind;

/// Readable content captured from one page.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    pub kind: PageKind,
    pub url: String,
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub meta: Value,
    /// Whether `body` was cut to fit the character limit.
    pub truncated: bool,
}

impl ExtractedContent {
    /// Build from the `{ title, body, meta }` object an extraction script returns.
    pub fn from_value(
        kind: PageKind,
        url: impl Into<String>,
        value: Value,
        max_chars: usize,
    ) -> Result<Self, ExtractError> {
        let url = url.into();
        let Value::Object(mut fields) = value else {
            return Err(ExtractError::UnexpectedShape(shape_of(&value).to_string()));
        };

        let title = fields
            .get("title")
            .and_then(Value::as_str)
            .map(normalize_whitespace)
            .unwrap_or_default();
        let body = fields
            .get("body")
            .and_then(Value::as_str)
            .map(normalize_block)
            .unwrap_or_default();
        if body.is_empty() {
            return Err(ExtractError::Empty { url });
        }
        let (body, truncated) = truncate_chars(&body, max_chars);
        let meta = fields.remove("meta").unwrap_or(Value::Null);

        Ok(Self {
            kind,
            url,
            title,
            body,
            meta,
            truncated,
        })
    }

    pub fn char_count(&self) -> usize {
        self.body.chars().count()
    }
}

fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Collapse whitespace runs into single spaces.
pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace inside each line and keep at most one blank line between paragraphs.
pub fn normalize_block(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut blank_run = 0usize;
    for line in input.lines() {
        let line = normalize_whitespace(line);
        if line.is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(&line);
        blank_run = 0;
    }
    out
}

/// Cut `input` to at most `max_chars` characters, never inside a UTF-8 sequence.
pub fn truncate_chars(input: &str, max_chars: usize) -> (String, bool) {
    match input.char_indices().nth(max_chars) {
        Some((cut, _)) => (input[..cut].trim_end().to_string(), true),
        None => (input.to_string(), false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_from_script_output() {
        let value = json!({
            "title": "  A   title \n",
            "body": "First   line\n\n\n\nSecond\tline\n   \nThird",
            "meta": {"author": "someone"},
        });
        let content =
            ExtractedContent::from_value(PageKind::Article, "https://x.test", value, 1_000)
                .unwrap();
        assert_eq!(content.title, "A title");
        assert_eq!(content.body, "First line\n\nSecond line\n\nThird");
        assert_eq!(content.meta["author"], "someone");
        assert!(!content.truncated);
    }

    #[test]
    fn truncates_on_char_boundary() {
        let (cut, truncated) = truncate_chars("héllo wörld", 7);
        assert_eq!(cut, "héllo w");
        assert!(truncated);

        let (same, truncated) = truncate_chars("日本語", 3);
        assert_eq!(same, "日本語");
        assert!(!truncated);
    }

    #[test]
    fn empty_body_and_bad_shapes_are_errors() {
        let err = ExtractedContent::from_value(
            PageKind::Reddit,
            "https://reddit.com/r/x/comments/1",
            json!({"title": "t", "body": "  \n "}),
            100,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractError::Empty { .. }));

        let err = ExtractedContent::from_value(PageKind::Article, "u", json!("text"), 100)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "extraction script returned a string, expected an object"
        );
    }
}
