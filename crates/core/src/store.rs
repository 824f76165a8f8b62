use crate::models::{content_preview, SearchResult};

/// A raw match as returned by a backend, before result shaping.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreHit {
    pub filename: String,
    pub file_path: String,
    pub page_number: u32,
    pub content: String,
    pub score: f64,
    pub highlights: Option<Vec<String>>,
}

impl StoreHit {
    pub fn into_result(self) -> SearchResult {
        SearchResult {
            content_preview: content_preview(&self.content),
            filename: self.filename,
            file_path: self.file_path,
            page_number: self.page_number,
            score: self.score,
            highlights: self.highlights,
        }
    }
}
