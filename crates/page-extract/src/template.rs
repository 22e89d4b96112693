use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::content::ExtractedContent;

/// A prompt body with `{{title}}`, `{{url}}`, `{{content}}` and `{{kind}}` placeholders.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub body: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            body: body.into(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Substitute known placeholders. Unknown ones and unclosed braces are kept verbatim.
    pub fn render(&self, content: &ExtractedContent) -> String {
        let mut out = String::with_capacity(self.body.len() + content.body.len());
        let mut rest = self.body.as_str();
        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                out.push_str(&rest[open..]);
                return out;
            };
            if let Some(inner) = after[..close].find("{{") {
                // An unclosed `{{` before this placeholder; rescan from the inner one.
                out.push_str(&rest[open..open + 2 + inner]);
                rest = &after[inner..];
                continue;
            }
            let key = after[..close].trim();
            match value_for(key, content) {
                Some(value) => out.push_str(value),
                None => out.push_str(&rest[open..open + 2 + close + 2]),
            }
            rest = &after[close + 2..];
        }
        out.push_str(rest);
        out
    }
}

fn value_for<'a>(key: &str, content: &'a ExtractedContent) -> Option<&'a str> {
    match key {
        "title" => Some(&content.title),
        "url" => Some(&content.url),
        "content" => Some(&content.body),
        "kind" => Some(content.kind.as_str()),
        _ => None,
    }
}

/// Built-in templates plus user templates from config, looked up by name.
#[derive(Clone, Debug)]
pub struct TemplateSet {
    templates: BTreeMap<String, PromptTemplate>,
}

impl TemplateSet {
    pub fn builtin() -> Self {
        let templates = [
            PromptTemplate::new(
                "summarize",
                "Summarize the following {{kind}} page in a few short paragraphs.\n\nTitle: {{title}}\nURL: {{url}}\n\n{{content}}",
            )
            .with_description("Concise summary"),
            PromptTemplate::new(
                "explain",
                "Explain the following {{kind}} page in plain language, defining any jargon.\n\nTitle: {{title}}\nURL: {{url}}\n\n{{content}}",
            )
            .with_description("Plain-language explanation"),
            PromptTemplate::new(
                "key-points",
                "List the key points of the following {{kind}} page as bullets.\n\nTitle: {{title}}\nURL: {{url}}\n\n{{content}}",
            )
            .with_description("Bulleted key points"),
            PromptTemplate::new("raw", "{{content}}").with_description("Content only"),
        ];
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    /// Add or replace a template; user templates may shadow built-ins.
    pub fn insert(&mut self, template: PromptTemplate) {
        self.templates.insert(template.name.clone(), template);
    }

    pub fn extend(&mut self, templates: impl IntoIterator<Item = PromptTemplate>) {
        for template in templates {
            self.insert(template);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PromptTemplate> {
        self.templates.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptTemplate> {
        self.templates.values()
    }
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::PageKind;
    use serde_json::Value;

    fn content() -> ExtractedContent {
        ExtractedContent {
            kind: PageKind::Reddit,
            url: "https://reddit.com/r/rust/comments/1".into(),
            title: "Borrowck".into(),
            body: "Body text".into(),
            meta: Value::Null,
            truncated: false,
        }
    }

    #[test]
    fn renders_known_placeholders() {
        let template = PromptTemplate::new("t", "[{{kind}}] {{ title }} <{{url}}>\n{{content}}");
        assert_eq!(
            template.render(&content()),
            "[reddit] Borrowck <https://reddit.com/r/rust/comments/1>\nBody text"
        );
    }

    #[test]
    fn unknown_and_unclosed_placeholders_stay_verbatim() {
        let template = PromptTemplate::new("t", "{{author}} wrote {{title}} {{oops");
        assert_eq!(template.render(&content()), "{{author}} wrote Borrowck {{oops");
    }

    #[test]
    fn stray_open_braces_do_not_swallow_the_next_placeholder() {
        let template = PromptTemplate::new("t", "{{ note {{title}} and {{ {{ {{url}}");
        assert_eq!(
            template.render(&content()),
            "{{ note Borrowck and {{ {{ https://reddit.com/r/rust/comments/1"
        );
    }

    #[test]
    fn content_braces_are_not_re_expanded() {
        let mut c = content();
        c.body = "literal {{title}}".into();
        let template = PromptTemplate::new("t", "{{content}}");
        assert_eq!(template.render(&c), "literal {{title}}");
    }

    #[test]
    fn builtins_exist_and_users_can_shadow_them() {
        let mut set = TemplateSet::builtin();
        for name in ["summarize", "explain", "key-points", "raw"] {
            assert!(set.get(name).is_some(), "{name}");
        }
        set.insert(PromptTemplate::new("raw", "RAW: {{content}}"));
        assert_eq!(set.get("raw").unwrap().render(&content()), "RAW: Body text");
        assert_eq!(set.iter().count(), 4);
    }
}
