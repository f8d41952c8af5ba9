//! Pinecone-backed vector index (REST data plane).
//!
//! Chunk text is stored in the vector metadata under `text`, next to the
//! chunk's own metadata fields.

use crate::types::{IndexEntry, ScoredEntry};
use crate::vector_index::{metadata_object, rank, VectorIndex};
use ragchat_core::{AppError, AppResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

const API_VERSION: &str = "2024-07";
const TEXT_KEY: &str = "text";

/// Vectors per upsert request
const UPSERT_BATCH_SIZE: usize = 100;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Pinecone index client bound to one index host.
pub struct PineconeIndex {
    client: Client,
    host: String,
    api_key: String,
    index_name: String,
    dimension: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    dimension: Option<usize>,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: Vec<PineconeVector<'a>>,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct PineconeVector<'a> {
    id: &'a str,
    values: &'a [f32],
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceSummary {
    #[serde(default)]
    vector_count: u64,
}

impl PineconeIndex {
    /// Connect to an existing index.
    ///
    /// When `host` is `None` the data-plane host is looked up through the
    /// control plane at `api_url`. A missing index is an error; indexes are
    /// never created here.
    pub async fn connect(
        index_name: &str,
        api_key: &str,
        host: Option<&str>,
        api_url: &str,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::VectorStore(format!("Failed to create HTTP client for Pinecone: {}", e))
            })?;

        let (host, dimension) = match host {
            Some(host) => (host.to_string(), None),
            None => {
                let url = format!("{}/indexes/{}", api_url.trim_end_matches('/'), index_name);
                tracing::debug!("Resolving Pinecone host for index '{}'", index_name);

                let request = client
                    .get(&url)
                    .header("Api-Key", api_key)
                    .header("X-Pinecone-API-Version", API_VERSION);
                let description: IndexDescription = send(request, index_name).await?;
                (description.host, description.dimension)
            }
        };

        Ok(Self {
            client,
            host: normalize_host(&host),
            api_key: api_key.to_string(),
            index_name: index_name.to_string(),
            dimension,
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.host, path))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        match self.dimension {
            Some(dimension) if dimension != vector.len() => Err(AppError::VectorStore(format!(
                "Vector dimension mismatch: Pinecone index '{}' has {}, got {}",
                self.index_name,
                dimension,
                vector.len()
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl VectorIndex for PineconeIndex {
    fn backend_name(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<()> {
        // Reject the whole write before any batch is sent
        for entry in entries {
            self.check_dimensions(&entry.vector)?;
        }

        for batch in entries.chunks(UPSERT_BATCH_SIZE) {
            let request = UpsertRequest {
                vectors: batch.iter().map(to_vector).collect(),
                namespace,
            };

            let _: serde_json::Value =
                send(self.post("/vectors/upsert").json(&request), &self.index_name).await?;

            tracing::debug!(
                "Upserted {} vectors into Pinecone namespace '{}'",
                batch.len(),
                namespace
            );
        }

        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredEntry>> {
        self.check_dimensions(vector)?;

        let request = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };

        let response: QueryResponse =
            send(self.post("/query").json(&request), &self.index_name).await?;

        let hits = response.matches.into_iter().map(from_match).collect();
        Ok(rank(hits, top_k))
    }

    async fn count(&self, namespace: &str) -> AppResult<u64> {
        let stats: IndexStats = send(
            self.post("/describe_index_stats")
                .json(&serde_json::json!({})),
            &self.index_name,
        )
        .await?;

        Ok(stats
            .namespaces
            .get(namespace)
            .map_or(0, |ns| ns.vector_count))
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder, index_name: &str) -> AppResult<T> {
    let response = request
        .send()
        .await
        .map_err(|e| AppError::VectorStore(format!("Failed to reach Pinecone: {}", e)))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(AppError::VectorStore(format!(
            "Pinecone index '{}' not found",
            index_name
        )));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AppError::VectorStore(format!(
            "Pinecone API error ({}): {}",
            status, body
        )));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::VectorStore(format!("Failed to parse Pinecone response: {}", e)))
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn to_vector(entry: &IndexEntry) -> PineconeVector<'_> {
    let mut metadata = metadata_object(Some(entry.metadata.clone()));
    if let Some(map) = metadata.as_object_mut() {
        map.insert(TEXT_KEY.to_string(), serde_json::Value::String(entry.text.clone()));
    }

    PineconeVector {
        id: &entry.id,
        values: &entry.vector,
        metadata,
    }
}

fn from_match(m: QueryMatch) -> ScoredEntry {
    let mut metadata = metadata_object(m.metadata);
    let text = metadata
        .as_object_mut()
        .and_then(|map| map.remove(TEXT_KEY))
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();

    ScoredEntry {
        id: m.id,
        text,
        metadata,
        score: m.score,
    }
}
