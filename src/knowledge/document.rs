use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a knowledge-base entry.
///
/// The common categories get their own variant; anything else is kept
/// verbatim so new content types need no code change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DocumentType {
    About,
    Research,
    Skills,
    Publications,
    Experience,
    Education,
    Awards,
    Other(String),
}

impl DocumentType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::About => "about",
            Self::Research => "research",
            Self::Skills => "skills",
            Self::Publications => "publications",
            Self::Experience => "experience",
            Self::Education => "education",
            Self::Awards => "awards",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "about" => Self::About,
            "research" => Self::Research,
            "skills" => Self::Skills,
            "publications" => Self::Publications,
            "experience" => Self::Experience,
            "education" => Self::Education,
            "awards" => Self::Awards,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<&str> for DocumentType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Where the entry came from (file name or `structured`)
    pub source: String,

    /// Heading of the section, when the entry is a markdown section
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    #[serde(rename = "type")]
    pub doc_type: DocumentType,

    /// Curated importance; higher ranks first on near-ties
    pub priority: i32,
}

/// One retrievable unit of the knowledge base.
///
/// Created at load time and never mutated afterwards, except for attaching
/// the embedding during index build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    pub metadata: DocumentMetadata,

    #[serde(default, skip_serializing)]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        source: impl Into<String>,
        section: Option<String>,
        doc_type: DocumentType,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: DocumentMetadata {
                source: source.into(),
                section,
                doc_type,
                priority,
            },
            embedding: None,
        }
    }

    /// Label used in context headers: the section when present, else the type.
    pub fn label(&self) -> &str {
        self.metadata
            .section
            .as_deref()
            .unwrap_or_else(|| self.metadata.doc_type.as_str())
    }

    pub fn priority(&self) -> i32 {
        self.metadata.priority
    }
}
