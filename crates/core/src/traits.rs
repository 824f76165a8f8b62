use crate::store::StoreHit;
use crate::{PageDocument, SearchError};
use async_trait::async_trait;

/// A full-text backend holding one document per (file, page) pair.
#[async_trait]
pub trait DocumentStore {
    fn index_name(&self) -> &str;

    /// Inserts or fully replaces the document stored under `id`.
    async fn upsert_document(&self, id: &str, document: &PageDocument) -> Result<(), SearchError>;

    /// Matches `query` against page content and returns at most `size` hits,
    /// best score first.
    async fn search_documents(&self, query: &str, size: usize)
        -> Result<Vec<StoreHit>, SearchError>;

    async fn document_count(&self) -> Result<u64, SearchError>;

    async fn unique_file_count(&self) -> Result<u64, SearchError>;
}
