use crate::config::StoreConfig;
use crate::store::StoreHit;
use crate::traits::DocumentStore;
use crate::{PageDocument, SearchError};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

const BACKEND: &str = "opensearch";
const HIGHLIGHT_FRAGMENT_SIZE: usize = 200;
const HIGHLIGHT_FRAGMENTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster_name: String,
    pub version: String,
}

pub struct OpenSearchStore {
    client: Arc<Client>,
    endpoint: Url,
    index_name: String,
}

impl OpenSearchStore {
    pub fn new(config: &StoreConfig) -> Result<Self, SearchError> {
        Ok(Self {
            client: Arc::new(Client::new()),
            endpoint: config.endpoint()?,
            index_name: config.index_name.clone(),
        })
    }

    /// Builds the store, checks the cluster answers and makes sure the index
    /// exists. Any error here means the cluster is unusable.
    pub async fn connect(config: &StoreConfig) -> Result<Self, SearchError> {
        let store = Self::new(config)?;
        let cluster = store.cluster_info().await?;
        info!(
            endpoint = %store.endpoint,
            cluster = %cluster.cluster_name,
            version = %cluster.version,
            "connected to opensearch"
        );
        store.ensure_index().await?;
        Ok(store)
    }

    pub async fn cluster_info(&self) -> Result<ClusterInfo, SearchError> {
        let response = self.client.get(self.endpoint.clone()).send().await?;
        let body = json_body(response).await?;
        Ok(parse_cluster_info(&body))
    }

    pub async fn ensure_index(&self) -> Result<(), SearchError> {
        let index_url = self.url(&[self.index_name.as_str()])?;
        let response = self.client.head(index_url.clone()).send().await?;

        if response.status() == StatusCode::OK {
            return Ok(());
        }

        if response.status() != StatusCode::NOT_FOUND {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        let response = self
            .client
            .put(index_url)
            .json(&index_mapping())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::Request(format!(
                "open-search index setup failed with {}",
                response.status()
            )));
        }

        info!(index = %self.index_name, "created index");
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, SearchError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| SearchError::Request(format!("endpoint cannot be a base: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl DocumentStore for OpenSearchStore {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn upsert_document(&self, id: &str, document: &PageDocument) -> Result<(), SearchError> {
        let url = self.url(&[self.index_name.as_str(), "_doc", id])?;
        let response = self.client.put(url).json(document).send().await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        debug!(%id, "document upserted");
        Ok(())
    }

    async fn search_documents(
        &self,
        query: &str,
        size: usize,
    ) -> Result<Vec<StoreHit>, SearchError> {
        let url = self.url(&[self.index_name.as_str(), "_search"])?;
        let response = self
            .client
            .post(url)
            .json(&search_body(query, size))
            .send()
            .await?;

        let body = json_body(response).await?;
        Ok(parse_search_hits(&body))
    }

    async fn document_count(&self) -> Result<u64, SearchError> {
        let url = self.url(&[self.index_name.as_str(), "_count"])?;
        let response = self.client.get(url).send().await?;
        let body = json_body(response).await?;

        body.pointer("/count")
            .and_then(Value::as_u64)
            .ok_or_else(|| missing_field("count"))
    }

    async fn unique_file_count(&self) -> Result<u64, SearchError> {
        let url = self.url(&[self.index_name.as_str(), "_search"])?;
        let response = self
            .client
            .post(url)
            .json(&unique_files_body())
            .send()
            .await?;
        let body = json_body(response).await?;

        body.pointer("/aggregations/unique_files/value")
            .and_then(Value::as_u64)
            .ok_or_else(|| missing_field("aggregations.unique_files.value"))
    }
}

async fn json_body(response: Response) -> Result<Value, SearchError> {
    if !response.status().is_success() {
        return Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: response.status().to_string(),
        });
    }
    Ok(response.json().await?)
}

fn missing_field(field: &str) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: format!("response has no {field}"),
    }
}

pub fn index_mapping() -> Value {
    json!({
        "mappings": {
            "properties": {
                "filename": {"type": "keyword"},
                "file_path": {"type": "keyword"},
                "content": {"type": "text", "analyzer": "standard"},
                "page_number": {"type": "integer"},
                "indexed_at": {"type": "date"}
            }
        }
    })
}

/// Conjunctive match on `content`: every analyzed term must appear.
pub fn search_body(query: &str, size: usize) -> Value {
    json!({
        "query": {
            "match": {
                "content": {
                    "query": query,
                    "operator": "and"
                }
            }
        },
        "highlight": {
            "fields": {
                "content": {
                    "fragment_size": HIGHLIGHT_FRAGMENT_SIZE,
                    "number_of_fragments": HIGHLIGHT_FRAGMENTS
                }
            }
        },
        "size": size,
        "_source": ["filename", "file_path", "page_number", "content"]
    })
}

pub fn unique_files_body() -> Value {
    json!({
        "aggs": {
            "unique_files": {
                "cardinality": {
                    "field": "filename"
                }
            }
        },
        "size": 0
    })
}

fn parse_cluster_info(body: &Value) -> ClusterInfo {
    ClusterInfo {
        cluster_name: body
            .pointer("/cluster_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        version: body
            .pointer("/version/number")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    }
}

pub fn parse_search_hits(body: &Value) -> Vec<StoreHit> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    hits.into_iter()
        .map(|raw| {
            let source = raw.get("_source").cloned().unwrap_or(Value::Null);
            let text = |field: &str| {
                source
                    .get(field)
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            // A hit without a highlight section means no fragments, which is
            // different from an empty fragment list.
            let highlights = raw.get("highlight").map(|highlight| {
                highlight
                    .get("content")
                    .and_then(Value::as_array)
                    .map(|fragments| {
                        fragments
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default()
            });

            StoreHit {
                filename: text("filename"),
                file_path: text("file_path"),
                page_number: source
                    .get("page_number")
                    .and_then(Value::as_u64)
                    .and_then(|page| u32::try_from(page).ok())
                    .unwrap_or(1),
                content: text("content"),
                score: raw.get("_score").and_then(Value::as_f64).unwrap_or(0.0),
                highlights,
            }
        })
        .collect()
}
