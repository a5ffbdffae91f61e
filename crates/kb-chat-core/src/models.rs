//! Core data models shared by the loader, ranker, and chat pipeline.
//!
//! Fragments and templates are built once at start-up and never mutated
//! afterwards; scored fragments and chat messages live for a single request.

use serde::{Deserialize, Serialize};

/// Source marker used for the built-in default corpus.
pub const DEFAULT_SOURCE: &str = "default";

/// A unit of retrievable knowledge-base text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fragment {
    /// Short label rendered as `[topic]` in the retrieval context.
    pub topic: String,
    /// Trimmed, non-empty body text.
    pub content: String,
    /// 1-based page number for real documents, `0` for synthetic defaults.
    pub page: u32,
    /// Origin file, or [`DEFAULT_SOURCE`] for synthetic data.
    pub source: String,
}

impl Fragment {
    /// Builds a fragment, trimming `content`.
    ///
    /// Returns `None` when the trimmed content is empty so that callers can
    /// never place a blank fragment into a corpus.
    pub fn new(
        topic: impl Into<String>,
        content: &str,
        page: u32,
        source: impl Into<String>,
    ) -> Option<Self> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        Some(Self {
            topic: topic.into(),
            content: content.to_string(),
            page,
            source: source.into(),
        })
    }

    pub fn is_synthetic(&self) -> bool {
        self.page == 0 && self.source == DEFAULT_SOURCE
    }
}

/// A fragment paired with its term-overlap score for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredFragment<'a> {
    pub fragment: &'a Fragment,
    pub score: usize,
    /// Position of the fragment in the corpus it was ranked from.
    pub index: usize,
}

/// Where a template was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// A code cell of a structured notebook (`*.ipynb`).
    Notebook,
    /// A standalone `*.prompt.md` file.
    File,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Notebook => "notebook",
            TemplateKind::File => "file",
        }
    }
}

/// A reusable, named system-prompt body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub name: String,
    pub content: String,
    pub source: String,
    pub kind: TemplateKind,
}

/// Listing entry for a template (content omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateInfo {
    pub name: String,
    pub source: String,
    #[serde(rename = "type")]
    pub kind: TemplateKind,
}

impl From<&Template> for TemplateInfo {
    fn from(t: &Template) -> Self {
        Self {
            name: t.name.clone(),
            source: t.source.clone(),
            kind: t.kind,
        }
    }
}

/// Chat message author.
///
/// Deserialization rejects any name other than the three below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of a conversation, in provider wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_new_trims_and_rejects_blank() {
        let f = Fragment::new("Topic", "  body text \n", 2, "doc.pdf").unwrap();
        assert_eq!(f.content, "body text");
        assert_eq!(f.page, 2);
        assert!(Fragment::new("Topic", " \n\t ", 1, "doc.pdf").is_none());
    }

    #[test]
    fn role_rejects_unknown_names() {
        let ok: ChatMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"hi"}"#).unwrap();
        assert_eq!(ok.role, Role::Assistant);

        let err = serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"hi"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn template_info_serializes_kind_as_type() {
        let t = Template {
            name: "intake".into(),
            content: "body".into(),
            source: ".ai/prompts/intake.prompt.md".into(),
            kind: TemplateKind::File,
        };
        let json = serde_json::to_value(TemplateInfo::from(&t)).unwrap();
        assert_eq!(json["type"], "file");
        assert_eq!(json["name"], "intake");
    }
}
