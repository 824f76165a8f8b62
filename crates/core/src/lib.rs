pub mod config;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod manager;
pub mod models;
pub mod store;
pub mod stores;
pub mod traits;

pub use config::StoreConfig;
pub use error::{IndexFailure, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::discover_pdf_files;
pub use manager::SearchManager;
pub use models::{
    document_id, DirectoryReport, FailedFile, IndexStats, IndexedFile, PageDocument, SearchResult,
};
pub use store::StoreHit;
pub use stores::{MemoryStore, OpenSearchStore};
pub use traits::DocumentStore;
