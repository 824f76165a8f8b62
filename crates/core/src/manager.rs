use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::ingest::{discover_pdf_files, file_name_of, modified_at};
use crate::store::StoreHit;
use crate::traits::DocumentStore;
use crate::{
    DirectoryReport, FailedFile, IndexFailure, IndexStats, IndexedFile, PageDocument,
    SearchError, SearchResult,
};
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Sequences extraction, document construction and store writes, and shapes
/// store hits into search results.
pub struct SearchManager<S, E = LopdfExtractor>
where
    S: DocumentStore,
    E: PdfExtractor,
{
    store: S,
    extractor: E,
}

impl<S> SearchManager<S>
where
    S: DocumentStore + Send + Sync,
{
    pub fn new(store: S) -> Self {
        Self::with_extractor(store, LopdfExtractor)
    }
}

impl<S, E> SearchManager<S, E>
where
    S: DocumentStore + Send + Sync,
    E: PdfExtractor,
{
    pub fn with_extractor(store: S, extractor: E) -> Self {
        Self { store, extractor }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index_name(&self) -> &str {
        self.store.index_name()
    }

    /// Extracts every readable page of `path` and upserts it.
    ///
    /// Stops at the first rejected page; pages written before it stay in the
    /// store.
    pub async fn index_file(&self, path: &Path) -> Result<IndexedFile, IndexFailure> {
        if !path.exists() {
            warn!(path = %path.display(), "file not found");
            return Err(IndexFailure::Missing(path.to_path_buf()));
        }

        let documents = self.build_documents(path).map_err(|reason| {
            warn!(path = %path.display(), %reason, "no pages extracted");
            IndexFailure::Extraction {
                path: path.to_path_buf(),
                reason,
            }
        })?;

        for document in &documents {
            let id = document.document_id();
            if let Err(source) = self.store.upsert_document(&id, document).await {
                error!(path = %path.display(), page = document.page_number, error = %source, "upsert rejected");
                return Err(IndexFailure::Upsert {
                    path: path.to_path_buf(),
                    page: document.page_number,
                    source,
                });
            }
        }

        info!(path = %path.display(), pages = documents.len(), "indexed pdf");
        Ok(IndexedFile {
            path: path.to_path_buf(),
            pages: documents.len(),
        })
    }

    /// Indexes every `.pdf` below `folder`, one file at a time. A failing file
    /// never stops the remaining ones.
    pub async fn index_directory(&self, folder: &Path) -> DirectoryReport {
        if !folder.is_dir() {
            warn!(folder = %folder.display(), "directory not found");
            return DirectoryReport::default();
        }

        let files = discover_pdf_files(folder);
        let mut report = DirectoryReport {
            total: files.len(),
            ..DirectoryReport::default()
        };

        for path in files {
            match self.index_file(&path).await {
                Ok(_) => report.succeeded.push(path),
                Err(failure) => report.failed.push(FailedFile {
                    reason: failure.to_string(),
                    path,
                }),
            }
        }

        info!(
            folder = %folder.display(),
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            total = report.total,
            "directory indexed"
        );
        report
    }

    pub async fn try_search(&self, query: &str, size: usize) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let hits = self.store.search_documents(query, size).await?;
        debug!(%query, size, hits = hits.len(), "search finished");

        Ok(hits.into_iter().take(size).map(StoreHit::into_result).collect())
    }

    /// Like [`Self::try_search`], but a failed query is logged and reported as
    /// no results.
    pub async fn search(&self, query: &str, size: usize) -> Vec<SearchResult> {
        match self.try_search(query, size).await {
            Ok(results) => results,
            Err(error) => {
                error!(%query, %error, "search failed");
                Vec::new()
            }
        }
    }

    pub async fn try_stats(&self) -> Result<IndexStats, SearchError> {
        let total_pages = self.store.document_count().await?;
        let unique_files = self.store.unique_file_count().await?;

        Ok(IndexStats {
            total_pages,
            unique_files,
            index_name: self.store.index_name().to_string(),
        })
    }

    pub async fn stats(&self) -> Option<IndexStats> {
        match self.try_stats().await {
            Ok(stats) => Some(stats),
            Err(error) => {
                error!(%error, "stats failed");
                None
            }
        }
    }

    fn build_documents(&self, path: &Path) -> Result<Vec<PageDocument>, String> {
        let filename = file_name_of(path).map_err(|error| error.to_string())?;
        let pages = self
            .extractor
            .extract_pages(path)
            .map_err(|error| error.to_string())?;
        let indexed_at = modified_at(path);
        let file_path = path.to_string_lossy().to_string();

        let documents: Vec<PageDocument> = pages
            .into_iter()
            .filter(|page| page.number >= 1 && !page.text.trim().is_empty())
            .map(|page| PageDocument {
                filename: filename.clone(),
                file_path: file_path.clone(),
                content: page.text,
                page_number: page.number,
                indexed_at,
            })
            .collect();

        if documents.is_empty() {
            return Err("pdf had no readable page text".to_string());
        }

        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PageText;
    use crate::stores::MemoryStore;
    use crate::IngestError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::tempdir;

    /// Serves canned pages keyed by file name; anything else is unreadable.
    #[derive(Default)]
    struct FakeExtractor {
        pages: HashMap<String, Vec<PageText>>,
    }

    impl FakeExtractor {
        fn with(mut self, filename: &str, pages: &[(u32, &str)]) -> Self {
            self.pages.insert(
                filename.to_string(),
                pages
                    .iter()
                    .map(|(number, text)| PageText {
                        number: *number,
                        text: text.to_string(),
                    })
                    .collect(),
            );
            self
        }
    }

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let name = file_name_of(path)?;
            self.pages
                .get(&name)
                .cloned()
                .ok_or_else(|| IngestError::PdfParse(format!("cannot read {name}")))
        }
    }

    fn red_cluster() -> SearchError {
        SearchError::BackendResponse {
            backend: "flaky".to_string(),
            details: "cluster is red".to_string(),
        }
    }

    /// Accepts writes until it sees `reject_page`, and fails every query.
    struct FlakyStore {
        inner: MemoryStore,
        reject_page: u32,
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        fn index_name(&self) -> &str {
            self.inner.index_name()
        }

        async fn upsert_document(&self, id: &str, document: &PageDocument) -> Result<(), SearchError> {
            if document.page_number == self.reject_page {
                return Err(SearchError::BackendResponse {
                    backend: "flaky".to_string(),
                    details: "400 Bad Request".to_string(),
                });
            }
            self.inner.upsert_document(id, document).await
        }

        async fn search_documents(&self, _query: &str, _size: usize) -> Result<Vec<StoreHit>, SearchError> {
            Err(red_cluster())
        }

        async fn document_count(&self) -> Result<u64, SearchError> {
            Err(red_cluster())
        }

        async fn unique_file_count(&self) -> Result<u64, SearchError> {
            Err(red_cluster())
        }
    }

    fn touch(dir: &Path, relative: &str) -> std::path::PathBuf {
        let path = dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("fixture dir");
        }
        fs::write(&path, b"%PDF-1.4\n%fixture").expect("fixture file");
        path
    }

    fn fixture_extractor() -> FakeExtractor {
        FakeExtractor::default()
            .with("A.pdf", &[(1, "alpha page one"), (2, "   \n\t "), (3, "alpha page three")])
            .with("B.pdf", &[(1, "bravo quick brown fox")])
    }

    #[tokio::test]
    async fn empty_pages_are_never_stored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = touch(dir.path(), "A.pdf");
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());

        let indexed = manager.index_file(&path).await?;

        assert_eq!(indexed.pages, 2);
        let store = manager.store();
        assert_eq!(store.count(), 2);
        assert!(store.get("A.pdf_page_1").is_some());
        assert!(store.get("A.pdf_page_2").is_none());
        assert_eq!(
            store.get("A.pdf_page_3").map(|document| document.page_number),
            Some(3)
        );
        Ok(())
    }

    #[tokio::test]
    async fn reindexing_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = touch(dir.path(), "A.pdf");
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());

        manager.index_file(&path).await?;
        let first = manager.store().get("A.pdf_page_1");
        manager.index_file(&path).await?;

        assert_eq!(manager.store().count(), 2);
        assert_eq!(manager.store().get("A.pdf_page_1"), first);
        Ok(())
    }

    #[tokio::test]
    async fn missing_path_fails_softly() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());

        let result = manager.index_file(&dir.path().join("absent.pdf")).await;

        assert!(matches!(result, Err(IndexFailure::Missing(_))));
        assert_eq!(manager.store().count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_file_is_an_extraction_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = touch(dir.path(), "corrupt.pdf");
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());

        let result = manager.index_file(&path).await;

        assert!(matches!(result, Err(IndexFailure::Extraction { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn all_blank_file_is_an_extraction_failure() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = touch(dir.path(), "blank.pdf");
        let extractor = FakeExtractor::default().with("blank.pdf", &[(1, " "), (2, "\n")]);
        let manager = SearchManager::with_extractor(MemoryStore::default(), extractor);

        let result = manager.index_file(&path).await;

        assert!(matches!(result, Err(IndexFailure::Extraction { .. })));
        assert_eq!(manager.store().count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn upsert_failure_keeps_earlier_pages_and_stops() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = touch(dir.path(), "C.pdf");
        let extractor =
            FakeExtractor::default().with("C.pdf", &[(1, "one"), (2, "two"), (3, "three")]);
        let store = FlakyStore {
            inner: MemoryStore::default(),
            reject_page: 2,
        };
        let manager = SearchManager::with_extractor(store, extractor);

        let result = manager.index_file(&path).await;

        assert!(matches!(result, Err(IndexFailure::Upsert { page: 2, .. })));
        let inner = &manager.store().inner;
        assert!(inner.get("C.pdf_page_1").is_some());
        assert!(inner.get("C.pdf_page_3").is_none());
        Ok(())
    }

    #[tokio::test]
    async fn directory_only_attempts_pdfs() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        touch(dir.path(), "A.pdf");
        touch(dir.path(), "nested/B.PDF");
        touch(dir.path(), "nested/deeper/corrupt.pdf");
        fs::write(dir.path().join("readme.txt"), b"text")?;
        fs::write(dir.path().join("nested/image.png"), b"png")?;
        let extractor = fixture_extractor().with("B.PDF", &[(1, "bravo")]);
        let manager = SearchManager::with_extractor(MemoryStore::default(), extractor);

        let report = manager.index_directory(dir.path()).await;

        assert_eq!(report.total, 3);
        assert_eq!(report.succeeded.len() + report.failed.len(), report.total);
        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].path.ends_with("corrupt.pdf"));
        assert!(!report.failed[0].reason.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_reports_nothing() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());

        let report = manager.index_directory(&dir.path().join("absent")).await;

        assert_eq!(report, DirectoryReport::default());
        Ok(())
    }

    #[tokio::test]
    async fn stats_count_pages_and_files() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());
        manager.index_file(&touch(dir.path(), "A.pdf")).await?;
        manager.index_file(&touch(dir.path(), "B.pdf")).await?;

        let stats = manager.stats().await.expect("memory stats never fail");

        assert_eq!(stats.total_pages, 3);
        assert_eq!(stats.unique_files, 2);
        assert_eq!(stats.index_name, "pdf_documents");
        Ok(())
    }

    #[tokio::test]
    async fn search_shapes_results() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());
        manager.index_file(&touch(dir.path(), "A.pdf")).await?;
        manager.index_file(&touch(dir.path(), "B.pdf")).await?;

        let results = manager.search("quick", 10).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].filename, "B.pdf");
        assert!(results[0].file_path.ends_with("B.pdf"));
        assert_eq!(results[0].page_number, 1);
        assert!(results[0].score >= 1.0);
        assert!(results[0]
            .highlights
            .as_ref()
            .is_some_and(|fragments| fragments[0].contains("<em>quick</em>")));

        let limited = manager.search("alpha", 1).await;
        assert_eq!(limited.len(), 1);
        assert!(manager.search("zebra", 10).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let manager = SearchManager::with_extractor(MemoryStore::default(), fixture_extractor());

        assert!(matches!(
            manager.try_search("   ", 10).await,
            Err(SearchError::Request(_))
        ));
        assert!(manager.search("", 10).await.is_empty());
    }

    #[tokio::test]
    async fn store_failures_become_empty_results() {
        let store = FlakyStore {
            inner: MemoryStore::default(),
            reject_page: 0,
        };
        let manager = SearchManager::with_extractor(store, fixture_extractor());

        assert!(manager.search("anything", 10).await.is_empty());
        assert!(manager.try_search("anything", 10).await.is_err());
        assert!(manager.stats().await.is_none());
    }
}
