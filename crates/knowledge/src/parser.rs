//! Document loading and text extraction.

use crate::types::Document;
use ragchat_core::{AppError, AppResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Content type classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    PlainText,
    Markdown,
    Html,
    Unknown,
}

impl ContentType {
    /// Detect content type from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("txt") | Some("text") => Self::PlainText,
            Some("md") | Some("markdown") => Self::Markdown,
            Some("html") | Some("htm") => Self::Html,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Unknown => "unknown",
        }
    }
}

/// Read one document. Text and Markdown are kept verbatim; HTML is reduced
/// to its visible text.
pub fn load_document(path: &Path) -> AppResult<Document> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Knowledge(format!("Failed to read {:?}: {}", path, e)))?;

    if raw.contains('\0') {
        return Err(AppError::Knowledge(format!(
            "{:?} looks like a binary file",
            path
        )));
    }

    let text = match ContentType::from_path(path) {
        ContentType::Html => clean_html(&raw),
        _ => raw,
    };

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    Ok(Document {
        filename,
        path: path.to_path_buf(),
        text,
    })
}

/// Read every document named by `paths`.
///
/// Files are read whatever their extension. Directories are walked and
/// every text, Markdown or HTML file under them becomes one document, in
/// path order. Any unreadable file aborts the whole load.
pub fn load_documents(paths: &[PathBuf]) -> AppResult<Vec<Document>> {
    let mut documents = Vec::new();

    for path in paths {
        if path.is_file() {
            documents.push(load_document(path)?);
        } else if path.is_dir() {
            let entries = WalkDir::new(path)
                .follow_links(false)
                .into_iter()
                .map(|entry| {
                    entry.map_err(|e| {
                        AppError::Knowledge(format!("Failed to walk {:?}: {}", path, e))
                    })
                })
                .collect::<AppResult<Vec<_>>>()?;

            let mut files: Vec<PathBuf> = entries
                .into_iter()
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| ContentType::from_path(p) != ContentType::Unknown)
                .collect();
            files.sort();

            tracing::debug!("Found {} documents under {:?}", files.len(), path);

            for file in files {
                documents.push(load_document(&file)?);
            }
        } else {
            return Err(AppError::Knowledge(format!(
                "Document path not found: {:?}",
                path
            )));
        }
    }

    Ok(documents)
}

/// Strip tags, scripts and styles from HTML and collapse whitespace.
fn clean_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_tag = false;
    let mut skip_until: Option<&str> = None;

    let lower = text.to_ascii_lowercase();

    for (i, ch) in text.char_indices() {
        if let Some(closing) = skip_until {
            if lower[i..].starts_with(closing) {
                skip_until = None;
                in_tag = true;
            }
            continue;
        }

        if ch == '<' {
            in_tag = true;
            if lower[i..].starts_with("<script") {
                skip_until = Some("</script");
            } else if lower[i..].starts_with("<style") {
                skip_until = Some("</style");
            }
        } else if ch == '>' {
            in_tag = false;
            result.push(' ');
        } else if !in_tag {
            result.push(ch);
        }
    }

    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
