//! Corpus loading.
//!
//! Markdown sources are split into one document per `#` heading. Structured
//! entries from the config are appended after them. Document ids are derived
//! from the source and position so a rebuild produces the same ids.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::document::{Document, DocumentType};
use crate::config::{EntryConfig, KnowledgeConfig, SourceConfig};

const STRUCTURED_SOURCE: &str = "structured";

/// A heading-delimited slice of a markdown file.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Heading text without the leading `#`s; empty for a preamble
    pub title: String,
    /// The heading line followed by the body lines
    pub content: String,
}

/// Split markdown into sections at every line starting with `#`.
///
/// The heading line stays part of the section content. Whitespace-only
/// sections are dropped.
pub fn split_into_sections(markdown: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current = Section {
        title: String::new(),
        content: String::new(),
    };

    for line in markdown.lines() {
        if line.starts_with('#') {
            if !current.content.trim().is_empty() {
                sections.push(current);
            }
            current = Section {
                title: line.trim_start_matches('#').trim().to_string(),
                content: format!("{}\n", line),
            };
        } else {
            current.content.push_str(line);
            current.content.push('\n');
        }
    }

    if !current.content.trim().is_empty() {
        sections.push(current);
    }

    sections
}

/// Loads the knowledge base described by `[knowledge]`.
pub struct CorpusLoader<'a> {
    config: &'a KnowledgeConfig,
}

impl<'a> CorpusLoader<'a> {
    pub fn new(config: &'a KnowledgeConfig) -> Self {
        Self { config }
    }

    /// Load every source and structured entry.
    ///
    /// A configured source that cannot be read is skipped with a warning.
    /// With no configured sources, every `*.md` under `content_dir` is used,
    /// typed by its file stem.
    pub fn load(&self) -> Result<Vec<Document>> {
        let sources = if self.config.sources.is_empty() {
            self.discover_sources()?
        } else {
            self.config.sources.clone()
        };

        let mut documents = Vec::new();
        for source in &sources {
            let path = self.resolve(&source.path);
            match std::fs::read_to_string(&path) {
                Ok(markdown) => {
                    let before = documents.len();
                    documents.extend(self.documents_from_markdown(&markdown, source));
                    debug!(
                        source = %source.path,
                        sections = documents.len() - before,
                        "Loaded markdown source"
                    );
                }
                Err(e) => warn!("Skipping knowledge source {}: {}", path.display(), e),
            }
        }

        documents.extend(structured_documents(&self.config.entries));

        info!(
            documents = documents.len(),
            sources = sources.len(),
            entries = self.config.entries.len(),
            "Knowledge base loaded"
        );

        Ok(documents)
    }

    /// Turn one markdown file into documents, dropping short sections.
    pub fn documents_from_markdown(&self, markdown: &str, source: &SourceConfig) -> Vec<Document> {
        split_into_sections(markdown)
            .into_iter()
            .filter(|section| section.content.trim().chars().count() > self.config.min_section_chars)
            .enumerate()
            .map(|(n, section)| {
                let title = (!section.title.is_empty()).then_some(section.title);
                Document::new(
                    format!("{}#{}", source.path, n),
                    section.content,
                    source.path.clone(),
                    title,
                    source.doc_type.clone(),
                    source.priority,
                )
            })
            .collect()
    }

    fn discover_sources(&self) -> Result<Vec<SourceConfig>> {
        let dir = &self.config.content_dir;
        if !dir.exists() {
            warn!("Content directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut sources = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }

            let relative = path.strip_prefix(dir).unwrap_or(path);
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            sources.push(SourceConfig {
                path: relative.to_string_lossy().replace('\\', "/"),
                doc_type: DocumentType::from(stem),
                priority: 5,
            });
        }
        Ok(sources)
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.content_dir.join(path)
        }
    }
}

/// Documents for hand-written entries, in config order.
pub fn structured_documents(entries: &[EntryConfig]) -> Vec<Document> {
    entries
        .iter()
        .enumerate()
        .map(|(n, entry)| {
            Document::new(
                entry
                    .id
                    .clone()
                    .unwrap_or_else(|| format!("{}#{}", STRUCTURED_SOURCE, n)),
                entry.content.clone(),
                entry.source.clone().unwrap_or_else(|| STRUCTURED_SOURCE.to_string()),
                Some(entry.section.clone()),
                entry.doc_type.clone(),
                entry.priority,
            )
        })
        .collect()
}
