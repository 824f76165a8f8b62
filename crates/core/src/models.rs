use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PREVIEW_CHARS: usize = 300;
pub const ELLIPSIS: &str = "...";

/// One indexed page of one PDF file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDocument {
    pub filename: String,
    pub file_path: String,
    pub content: String,
    pub page_number: u32,
    pub indexed_at: DateTime<Utc>,
}

impl PageDocument {
    pub fn document_id(&self) -> String {
        document_id(&self.filename, self.page_number)
    }
}

pub fn document_id(filename: &str, page_number: u32) -> String {
    format!("{filename}_page_{page_number}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub filename: String,
    pub file_path: String,
    pub page_number: u32,
    pub score: f64,
    pub content_preview: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_pages: u64,
    pub unique_files: u64,
    pub index_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: PathBuf,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryReport {
    pub succeeded: Vec<PathBuf>,
    pub failed: Vec<FailedFile>,
    pub total: usize,
}

/// Keeps the first `max_chars` characters of `text`, appending an ellipsis
/// when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}{ELLIPSIS}", &text[..byte_index]),
        None => text.to_string(),
    }
}

pub fn content_preview(content: &str) -> String {
    truncate_with_ellipsis(content, PREVIEW_CHARS)
}
