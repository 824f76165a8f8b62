use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("search request failed: {0}")]
    Request(String),
}

/// Why a single file could not be indexed. Every variant is a soft failure
/// scoped to that file.
#[derive(Debug, Error)]
pub enum IndexFailure {
    #[error("file not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("no pages extracted from {}: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("store rejected page {page} of {}: {source}", .path.display())]
    Upsert {
        path: PathBuf,
        page: u32,
        #[source]
        source: SearchError,
    },
}
