use crate::models::{truncate_with_ellipsis, SearchResult};
use crate::store::StoreHit;
use crate::traits::DocumentStore;
use crate::{PageDocument, SearchError};
use async_trait::async_trait;
use parking_lot::RwLock;
use regex::RegexBuilder;
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const HIGHLIGHT_CHARS: usize = 200;
pub const HIGHLIGHT_OPEN: &str = "<em>";
pub const HIGHLIGHT_CLOSE: &str = "</em>";

/// In-process substitute for OpenSearch.
///
/// Scores are occurrence counts of the lowercased query in the lowercased
/// content, not relevance scores, so they are never comparable with hits from
/// [`crate::OpenSearchStore`].
#[derive(Debug)]
pub struct MemoryStore {
    index_name: String,
    entries: RwLock<Entries>,
}

#[derive(Debug, Default)]
struct Entries {
    slots: HashMap<String, usize>,
    documents: Vec<(String, PageDocument)>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_INDEX_NAME)
    }
}

impl MemoryStore {
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            entries: RwLock::new(Entries::default()),
        }
    }

    /// Inserts or overwrites the entry at `id`. An overwritten entry keeps its
    /// first position, which is the tie-break order for equal scores.
    pub fn index_document(&self, id: impl Into<String>, document: PageDocument) {
        let id = id.into();
        let mut entries = self.entries.write();
        match entries.slots.get(&id).copied() {
            Some(slot) => entries.documents[slot].1 = document,
            None => {
                let slot = entries.documents.len();
                entries.slots.insert(id.clone(), slot);
                entries.documents.push((id.clone(), document));
            }
        }
        debug!(%id, "document stored in memory");
    }

    pub fn get(&self, id: &str) -> Option<PageDocument> {
        let entries = self.entries.read();
        entries
            .slots
            .get(id)
            .map(|slot| entries.documents[*slot].1.clone())
    }

    /// Returns at most `size` pages containing `query`, best score first.
    ///
    /// An empty query matches nothing. Both front ends reject empty queries
    /// before they reach the store.
    pub fn search(&self, query: &str, size: usize) -> Vec<SearchResult> {
        self.matching_hits(query, size)
            .into_iter()
            .map(StoreHit::into_result)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.entries.read().documents.len()
    }

    pub fn unique_file_count(&self) -> usize {
        let entries = self.entries.read();
        entries
            .documents
            .iter()
            .map(|(_, document)| document.filename.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    fn matching_hits(&self, query: &str, size: usize) -> Vec<StoreHit> {
        if query.is_empty() || size == 0 {
            return Vec::new();
        }

        let needle = query.to_lowercase();
        let entries = self.entries.read();

        let mut hits: Vec<StoreHit> = entries
            .documents
            .iter()
            .filter_map(|(_, document)| {
                let occurrences = document.content.to_lowercase().matches(&needle).count();
                if occurrences == 0 {
                    return None;
                }

                Some(StoreHit {
                    filename: document.filename.clone(),
                    file_path: document.file_path.clone(),
                    page_number: document.page_number,
                    content: document.content.clone(),
                    score: occurrences as f64,
                    highlights: Some(vec![highlight(&document.content, query)]),
                })
            })
            .collect();

        // Stable sort: equal scores stay in insertion order.
        hits.sort_by(|left, right| right.score.total_cmp(&left.score));
        hits.truncate(size);
        hits
    }
}

/// Wraps every case-insensitive occurrence of `query` in emphasis markers and
/// cuts the marked text down to [`HIGHLIGHT_CHARS`].
pub fn highlight(content: &str, query: &str) -> String {
    let marked = match RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern
            .replace_all(content, |captures: &regex::Captures<'_>| {
                format!("{HIGHLIGHT_OPEN}{}{HIGHLIGHT_CLOSE}", &captures[0])
            })
            .into_owned(),
        Err(_) => content.to_string(),
    };

    truncate_with_ellipsis(&marked, HIGHLIGHT_CHARS)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn upsert_document(&self, id: &str, document: &PageDocument) -> Result<(), SearchError> {
        self.index_document(id, document.clone());
        Ok(())
    }

    async fn search_documents(
        &self,
        query: &str,
        size: usize,
    ) -> Result<Vec<StoreHit>, SearchError> {
        Ok(self.matching_hits(query, size))
    }

    async fn document_count(&self) -> Result<u64, SearchError> {
        Ok(self.count() as u64)
    }

    async fn unique_file_count(&self) -> Result<u64, SearchError> {
        Ok(MemoryStore::unique_file_count(self) as u64)
    }
}
