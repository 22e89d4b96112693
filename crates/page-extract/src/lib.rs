//! Content capture for the page a prompt is built from, and the templates that wrap it.

pub mod content;
pub mod errors;
pub mod extractor;
pub mod kind;
pub mod scripts;
pub mod template;

pub use content::{normalize_block, normalize_whitespace, truncate_chars, ExtractedContent};
pub use errors::ExtractError;
pub use extractor::Extractor;
pub use kind::PageKind;
pub use scripts::extraction_script;
pub use template::{PromptTemplate, TemplateSet};
