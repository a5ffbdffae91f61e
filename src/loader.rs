//! Knowledge-base document loader.
//!
//! Walks the knowledge-base directory, turns every matching file into
//! [`Fragment`]s, and builds the process-wide [`Corpus`].
//!
//! # Per-file policy
//!
//! | File | Result |
//! |------|--------|
//! | PDF with at least one non-empty page | one fragment per non-empty page (`page` is 1-based) |
//! | PDF that fails to parse, or has no text | read as raw UTF-8 text, one fragment with `page = 1` |
//! | any other matching file | read as raw UTF-8 text, one fragment with `page = 1` |
//! | unreadable, unparseable binary, non-UTF-8, or empty | skipped, recorded in [`LoadReport::failures`] |
//!
//! A failing file never aborts the load. A missing directory is created
//! empty. When nothing loads, [`build_corpus`] substitutes the default corpus.

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use kb_chat_core::corpus::Corpus;
use kb_chat_core::models::Fragment;

use crate::config::KnowledgeBaseConfig;
use crate::extract::{extract_pdf_pages, is_pdf, ExtractError};

/// Why a single file contributed nothing to the corpus.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path}: {source}")]
    Extract {
        path: PathBuf,
        #[source]
        source: ExtractError,
    },
    #[error("{path} is not valid UTF-8 text")]
    NotUtf8 { path: PathBuf },
    #[error("{path} contains no text")]
    Empty { path: PathBuf },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Extract { path, .. }
            | LoadError::NotUtf8 { path }
            | LoadError::Empty { path } => path,
        }
    }
}

/// Everything one load pass produced: the fragments plus per-file failures.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub fragments: Vec<Fragment>,
    pub failures: Vec<LoadError>,
    /// Number of files that contributed at least one fragment.
    pub files_loaded: usize,
}

/// Loads every file under `dir` matching `include_globs` (relative paths).
///
/// Files are visited in relative-path order. Only an invalid glob is an
/// error; per-file problems end up in [`LoadReport::failures`].
pub fn load_documents(dir: &Path, include_globs: &[String]) -> Result<LoadReport> {
    let include = build_globset(include_globs)?;
    let mut report = LoadReport::default();

    if !dir.exists() {
        match std::fs::create_dir_all(dir) {
            Ok(()) => tracing::info!(dir = %dir.display(), "created empty knowledge-base directory"),
            Err(e) => tracing::warn!(
                dir = %dir.display(),
                error = %e,
                "knowledge-base directory missing and could not be created"
            ),
        }
        return Ok(report);
    }

    let mut candidates: Vec<(PathBuf, String)> = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");
        if include.is_match(&rel_str) {
            candidates.push((path.to_path_buf(), rel_str));
        }
    }
    candidates.sort_by(|a, b| a.1.cmp(&b.1));

    for (path, rel) in candidates {
        match load_file(&path, &rel) {
            Ok(fragments) => {
                tracing::info!(file = %rel, fragments = fragments.len(), "loaded document");
                report.files_loaded += 1;
                report.fragments.extend(fragments);
            }
            Err(e) => {
                tracing::warn!(file = %rel, error = %e, "skipping document");
                report.failures.push(e);
            }
        }
    }

    Ok(report)
}

/// Turns one file into fragments; `source` is recorded on each fragment.
pub fn load_file(path: &Path, source: &str) -> Result<Vec<Fragment>, LoadError> {
    let bytes = std::fs::read(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let topic = topic_from_path(path);
    let mut parse_error = None;

    if is_pdf(path) {
        match extract_pdf_pages(&bytes) {
            Ok(pages) => {
                let fragments: Vec<Fragment> = pages
                    .iter()
                    .enumerate()
                    .filter_map(|(i, text)| Fragment::new(&topic, text, i as u32 + 1, source))
                    .collect();
                if !fragments.is_empty() {
                    return Ok(fragments);
                }
                tracing::debug!(file = %source, "PDF has no extractable text, reading as raw text");
            }
            Err(e) => {
                tracing::debug!(file = %source, error = %e, "PDF parse failed, reading as raw text");
                parse_error = Some(e);
            }
        }
    }

    // A PDF that neither parses nor reads as text reports the parser error.
    let text = String::from_utf8(bytes).map_err(|_| match parse_error {
        Some(e) => LoadError::Extract {
            path: path.to_path_buf(),
            source: e,
        },
        None => LoadError::NotUtf8 {
            path: path.to_path_buf(),
        },
    })?;
    Fragment::new(topic, &text, 1, source)
        .map(|f| vec![f])
        .ok_or_else(|| LoadError::Empty {
            path: path.to_path_buf(),
        })
}

/// `DFSA_Fee-Module.pdf` → `DFSA Fee Module`.
pub fn topic_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let words: Vec<&str> = stem
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    if words.is_empty() {
        stem
    } else {
        words.join(" ")
    }
}

/// Loads the configured knowledge base and substitutes the default corpus
/// when no document yields any text.
pub fn build_corpus(config: &KnowledgeBaseConfig) -> Result<Corpus> {
    let report = load_documents(&config.dir, &config.include_globs)?;
    if !report.failures.is_empty() {
        tracing::warn!(
            skipped = report.failures.len(),
            "some knowledge-base files could not be loaded"
        );
    }

    if report.fragments.is_empty() {
        tracing::info!(dir = %config.dir.display(), "no documents loaded, using default corpus");
    } else {
        tracing::info!(
            files = report.files_loaded,
            fragments = report.fragments.len(),
            "knowledge base loaded"
        );
    }
    Ok(Corpus::or_default(report.fragments))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
