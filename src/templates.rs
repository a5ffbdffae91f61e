//! Prompt-template registry.
//!
//! Two loaders feed one name-keyed store, both run once at start-up:
//!
//! - **Notebooks** (`*.ipynb` in `templates.notebooks_dir`): every code cell
//!   whose source mentions "prompt" (any case) and contains a `"""` string
//!   contributes the text between its first and last `"""`, keyed
//!   `{file_stem}_cell_{cell_index}`.
//! - **Prompt files** (`*.prompt.md` in `templates.prompts_dir`): the whole
//!   file is the body; `intake.prompt.md` is keyed `intake`.
//!
//! Notebooks load first, then prompt files. A later template with an
//! existing name replaces the earlier body but keeps its list position.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use kb_chat_core::models::{Template, TemplateInfo, TemplateKind};

use crate::config::TemplatesConfig;

const TRIPLE_QUOTE: &str = "\"\"\"";
const PROMPT_SUFFIX: &str = ".prompt.md";

#[derive(Debug, Error)]
pub enum TemplateLoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed notebook {path}: {source}")]
    Notebook {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable-after-start-up store of named templates.
#[derive(Debug, Default, Clone)]
pub struct TemplateRegistry {
    templates: Vec<Template>,
    index: HashMap<String, usize>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: impl IntoIterator<Item = Template>) -> Self {
        let mut registry = Self::new();
        for t in templates {
            registry.insert(t);
        }
        registry
    }

    /// Adds `template`, replacing any template with the same name in place.
    pub fn insert(&mut self, template: Template) {
        match self.index.get(&template.name) {
            Some(&i) => self.templates[i] = template,
            None => {
                self.index.insert(template.name.clone(), self.templates.len());
                self.templates.push(template);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.index.get(name).map(|&i| &self.templates[i])
    }

    /// Stored body for `name`.
    pub fn content(&self, name: &str) -> Option<&str> {
        self.get(name).map(|t| t.content.as_str())
    }

    /// Every template once, in insertion order.
    pub fn list(&self) -> Vec<TemplateInfo> {
        self.templates.iter().map(TemplateInfo::from).collect()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Templates from one loader plus the files it had to skip.
#[derive(Debug, Default)]
pub struct TemplateLoad {
    pub templates: Vec<Template>,
    pub failures: Vec<TemplateLoadError>,
}

/// Runs both loaders and merges the results. Never fails.
pub fn load_registry(config: &TemplatesConfig) -> TemplateRegistry {
    let mut registry = TemplateRegistry::new();

    for load in [
        load_notebook_templates(&config.notebooks_dir),
        load_prompt_files(&config.prompts_dir),
    ] {
        for failure in &load.failures {
            tracing::warn!(error = %failure, "skipping template source");
        }
        for template in load.templates {
            registry.insert(template);
        }
    }

    tracing::info!(templates = registry.len(), "template registry loaded");
    registry
}

#[derive(Debug, Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<NotebookCell>,
}

#[derive(Debug, Deserialize)]
struct NotebookCell {
    cell_type: String,
    #[serde(default)]
    source: CellSource,
}

/// Notebook cell sources are stored either as one string or as a list of lines.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Lines(Vec::new())
    }
}

impl CellSource {
    fn text(&self) -> String {
        match self {
            CellSource::Text(s) => s.clone(),
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// Body of a prompt cell: the trimmed text between the first and last `"""`.
///
/// `None` when the cell does not mention "prompt" or has no text span
/// between two triple-quote markers. A whitespace-only span yields an
/// empty body.
pub fn extract_cell_prompt(source: &str) -> Option<String> {
    if !source.to_lowercase().contains("prompt") {
        return None;
    }
    let start = source.find(TRIPLE_QUOTE)? + TRIPLE_QUOTE.len();
    let end = source.rfind(TRIPLE_QUOTE)?;
    if end <= start {
        return None;
    }
    Some(source[start..end].trim().to_string())
}

/// Parses one notebook document into templates keyed by `stem`.
pub fn notebook_templates(
    json: &str,
    stem: &str,
    source: &str,
) -> Result<Vec<Template>, serde_json::Error> {
    let notebook: Notebook = serde_json::from_str(json)?;
    Ok(notebook
        .cells
        .iter()
        .enumerate()
        .filter(|(_, cell)| cell.cell_type == "code")
        .filter_map(|(i, cell)| {
            extract_cell_prompt(&cell.source.text()).map(|content| Template {
                name: format!("{}_cell_{}", stem, i),
                content,
                source: source.to_string(),
                kind: TemplateKind::Notebook,
            })
        })
        .collect())
}

pub fn load_notebook_templates(dir: &Path) -> TemplateLoad {
    let mut load = TemplateLoad::default();

    for path in files_in(dir, |name| name.ends_with(".ipynb")) {
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) => {
                load.failures.push(TemplateLoadError::Io { path, source: e });
                continue;
            }
        };
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let source = path.display().to_string();

        match notebook_templates(&json, &stem, &source) {
            Ok(templates) => {
                tracing::debug!(notebook = %source, templates = templates.len(), "loaded notebook");
                load.templates.extend(templates);
            }
            Err(e) => load.failures.push(TemplateLoadError::Notebook { path, source: e }),
        }
    }

    load
}

/// `intake.prompt.md` → `intake`.
pub fn prompt_file_name(file_name: &str) -> String {
    file_name
        .strip_suffix(".md")
        .unwrap_or(file_name)
        .replace(".prompt", "")
}

pub fn load_prompt_files(dir: &Path) -> TemplateLoad {
    let mut load = TemplateLoad::default();

    for path in files_in(dir, |name| name.ends_with(PROMPT_SUFFIX)) {
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                load.failures.push(TemplateLoadError::Io { path, source: e });
                continue;
            }
        };
        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        load.templates.push(Template {
            name: prompt_file_name(&file_name),
            content,
            source: path.display().to_string(),
            kind: TemplateKind::File,
        });
    }

    load
}

/// Regular files directly inside `dir` whose name satisfies `matches`, by name.
fn files_in(dir: &Path, matches: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    if !dir.is_dir() {
        tracing::info!(dir = %dir.display(), "template directory not found, skipping");
        return Vec::new();
    }

    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable template entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| matches(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.into_path())
        .collect()
}
