//! Local documents: markdown files with optional YAML front matter.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use inkpost_core::{MappingRecord, PostId, RelPath, DEFAULT_WEIGHT};

use crate::error::{doc_io, DocumentError};
use crate::remote::PostContent;

/// A loaded document, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub body: String,
    pub date: Option<String>,
    pub tags: Vec<String>,
    pub categories: Vec<String>,
    pub weight: i64,
}

impl Document {
    pub fn to_post(&self) -> PostContent {
        PostContent {
            title: self.title.clone(),
            body: self.body.clone(),
            categories: self.categories.clone(),
            tags: self.tags.clone(),
        }
    }

    /// The store row for this document published at `path` under `id`.
    pub fn record(&self, path: &RelPath, id: &PostId) -> MappingRecord {
        MappingRecord {
            path: path.clone(),
            remote_id: id.clone(),
            title: self.title.clone(),
            date: self.date.clone(),
            tags: self.tags.clone(),
            weight: self.weight,
        }
    }
}

/// Where documents are read from.
pub trait DocumentSource {
    fn load(&self, path: &RelPath) -> Result<Document, DocumentError>;

    /// Whether a document is still present at `path`.
    fn exists(&self, path: &RelPath) -> bool;
}

/// Markdown files under a repository root.
#[derive(Debug, Clone)]
pub struct MarkdownDocuments {
    root: PathBuf,
}

impl MarkdownDocuments {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DocumentSource for MarkdownDocuments {
    fn load(&self, path: &RelPath) -> Result<Document, DocumentError> {
        let abs = self.root.join(path.as_str());
        let content = std::fs::read_to_string(&abs).map_err(|e| doc_io(&abs, e))?;
        parse_document(&content, &abs)
    }

    fn exists(&self, path: &RelPath) -> bool {
        self.root.join(path.as_str()).is_file()
    }
}

// ---------------------------------------------------------------------------
// Front matter
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct FrontMatter {
    title: Option<String>,
    date: Option<serde_yaml::Value>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    categories: Vec<String>,
    weight: Option<i64>,
}

/// Split `---`-fenced YAML off the top of `content`. `None` when the
/// document has no front matter block.
fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let stripped = content.trim_start_matches('\u{feff}');
    let rest = stripped.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    if let Some(body) = rest.strip_prefix("---") {
        return Some(("", skip_newline(body)));
    }
    let idx = rest.find("\n---")?;
    let yaml = rest[..idx].trim_end();
    let after = &rest[idx + 4..];
    Some((yaml, skip_newline(after)))
}

fn skip_newline(s: &str) -> &str {
    s.strip_prefix("\r\n")
        .or_else(|| s.strip_prefix('\n'))
        .unwrap_or(s)
}

/// Parse a document read from `path` (used for the fallback title and
/// error messages only).
pub fn parse_document(content: &str, path: &Path) -> Result<Document, DocumentError> {
    let (meta, body) = match split_front_matter(content) {
        Some((yaml, body)) if yaml.trim().is_empty() => (FrontMatter::default(), body),
        Some((yaml, body)) => {
            let meta = serde_yaml::from_str(yaml).map_err(|source| DocumentError::FrontMatter {
                path: path.to_path_buf(),
                source,
            })?;
            (meta, body)
        }
        None => (FrontMatter::default(), content),
    };

    let title = meta
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });

    Ok(Document {
        title,
        body: body.to_string(),
        date: meta.date.as_ref().and_then(yaml_scalar),
        tags: meta.tags,
        categories: meta.categories,
        weight: meta.weight.unwrap_or(DEFAULT_WEIGHT),
    })
}

/// Dates come through as strings or bare numbers depending on quoting.
fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
