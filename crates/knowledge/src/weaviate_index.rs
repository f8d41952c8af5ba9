//! Weaviate-backed vector index.
//!
//! Entries are objects of one class (default `Document`) carrying the chunk
//! text, a `namespace` property used as a `where` filter, and the chunk
//! metadata serialized as JSON in `metadataJson`. Writes go through the
//! batch REST endpoint; reads through GraphQL `nearVector`.

use crate::types::{IndexEntry, ScoredEntry};
use crate::vector_index::{metadata_object, rank, VectorIndex};
use ragchat_core::{AppError, AppResult};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const NAMESPACE_PROPERTY: &str = "namespace";
const METADATA_PROPERTY: &str = "metadataJson";

/// Objects per batch request
const BATCH_SIZE: usize = 100;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Weaviate client bound to one class.
pub struct WeaviateIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    class_name: String,
    text_key: String,
}

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    objects: Vec<BatchObject<'a>>,
}

#[derive(Debug, Serialize)]
struct BatchObject<'a> {
    class: &'a str,
    id: &'a str,
    vector: &'a [f32],
    properties: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct BatchResult {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    result: Option<BatchResultStatus>,
}

#[derive(Debug, Deserialize)]
struct BatchResultStatus {
    #[serde(default)]
    errors: Option<BatchErrors>,
}

#[derive(Debug, Deserialize)]
struct BatchErrors {
    #[serde(default)]
    error: Vec<ErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct ErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<ErrorMessage>>,
}

impl WeaviateIndex {
    pub fn new(
        base_url: &str,
        api_key: Option<&str>,
        class_name: &str,
        text_key: &str,
    ) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                AppError::VectorStore(format!("Failed to create HTTP client for Weaviate: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.map(str::to_string),
            class_name: class_name.to_string(),
            text_key: text_key.to_string(),
        })
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn to_object<'a>(&'a self, namespace: &str, entry: &'a IndexEntry) -> AppResult<BatchObject<'a>> {
        let mut properties = serde_json::Map::new();
        properties.insert(self.text_key.clone(), Value::String(entry.text.clone()));
        properties.insert(
            NAMESPACE_PROPERTY.to_string(),
            Value::String(namespace.to_string()),
        );
        properties.insert(
            METADATA_PROPERTY.to_string(),
            Value::String(serde_json::to_string(&entry.metadata)?),
        );

        Ok(BatchObject {
            class: &self.class_name,
            id: &entry.id,
            vector: &entry.vector,
            properties,
        })
    }

    fn near_vector_query(&self, namespace: &str, vector: &[f32], top_k: usize) -> AppResult<String> {
        Ok(format!(
            "{{ Get {{ {class}(nearVector: {{vector: [{vector}]}}, limit: {limit}, where: {filter}) {{ {text} {meta} _additional {{ id distance }} }} }} }}",
            class = self.class_name,
            vector = format_vector(vector)?,
            limit = top_k,
            filter = namespace_filter(namespace),
            text = self.text_key,
            meta = METADATA_PROPERTY,
        ))
    }

    fn count_query(&self, namespace: &str) -> String {
        format!(
            "{{ Aggregate {{ {class}(where: {filter}) {{ meta {{ count }} }} }} }}",
            class = self.class_name,
            filter = namespace_filter(namespace),
        )
    }

    async fn graphql(&self, query: String) -> AppResult<Value> {
        let response = self
            .post("/v1/graphql")
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to reach Weaviate: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::VectorStore(format!(
                "Weaviate API error ({}): {}",
                status, body
            )));
        }

        let body: GraphQlResponse = response.json().await.map_err(|e| {
            AppError::VectorStore(format!("Failed to parse Weaviate response: {}", e))
        })?;

        graphql_data(body)
    }

    fn parse_hits(&self, data: &Value) -> Vec<ScoredEntry> {
        data.pointer(&format!("/Get/{}", self.class_name))
            .and_then(Value::as_array)
            .map(|objects| {
                objects
                    .iter()
                    .map(|object| {
                        let text = object
                            .get(&self.text_key)
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let metadata = metadata_object(
                            object
                                .get(METADATA_PROPERTY)
                                .and_then(Value::as_str)
                                .and_then(|s| serde_json::from_str(s).ok()),
                        );
                        let id = object
                            .pointer("/_additional/id")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        let distance = object
                            .pointer("/_additional/distance")
                            .and_then(Value::as_f64)
                            .unwrap_or(1.0);

                        ScoredEntry {
                            id,
                            text,
                            metadata,
                            score: 1.0 - distance as f32,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl VectorIndex for WeaviateIndex {
    fn backend_name(&self) -> &str {
        "weaviate"
    }

    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<()> {
        for batch in entries.chunks(BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|entry| self.to_object(namespace, entry))
                .collect::<AppResult<Vec<_>>>()?;

            let response = self
                .post("/v1/batch/objects")
                .json(&BatchRequest { objects })
                .send()
                .await
                .map_err(|e| AppError::VectorStore(format!("Failed to reach Weaviate: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(AppError::VectorStore(format!(
                    "Weaviate batch error ({}): {}",
                    status, body
                )));
            }

            let results: Vec<BatchResult> = response.json().await.map_err(|e| {
                AppError::VectorStore(format!("Failed to parse Weaviate batch response: {}", e))
            })?;
            check_batch_results(&results)?;

            tracing::debug!(
                "Upserted {} objects into Weaviate class '{}' namespace '{}'",
                batch.len(),
                self.class_name,
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
        let data = self
            .graphql(self.near_vector_query(namespace, vector, top_k)?)
            .await?;
        Ok(rank(self.parse_hits(&data), top_k))
    }

    async fn count(&self, namespace: &str) -> AppResult<u64> {
        let data = self.graphql(self.count_query(namespace)).await?;
        Ok(data
            .pointer(&format!("/Aggregate/{}/0/meta/count", self.class_name))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }
}

/// GraphQL float list; NaN and infinities have no literal form.
fn format_vector(vector: &[f32]) -> AppResult<String> {
    if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
        return Err(AppError::Embedding(format!(
            "Query vector has a non-finite value at position {}",
            position
        )));
    }

    Ok(vector
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(","))
}

fn namespace_filter(namespace: &str) -> String {
    // A JSON string literal is also a valid GraphQL string literal
    let literal = Value::String(namespace.to_string()).to_string();
    format!(
        "{{path: [\"{}\"], operator: Equal, valueText: {}}}",
        NAMESPACE_PROPERTY, literal
    )
}

fn graphql_data(body: GraphQlResponse) -> AppResult<Value> {
    if let Some(errors) = body.errors.filter(|e| !e.is_empty()) {
        let messages: Vec<_> = errors.into_iter().map(|e| e.message).collect();
        return Err(AppError::VectorStore(format!(
            "Weaviate query failed: {}",
            messages.join("; ")
        )));
    }

    body.data
        .ok_or_else(|| AppError::VectorStore("Weaviate returned no data".to_string()))
}

fn check_batch_results(results: &[BatchResult]) -> AppResult<()> {
    let failures: Vec<String> = results
        .iter()
        .filter_map(|r| {
            let errors = r.result.as_ref()?.errors.as_ref()?;
            let message = errors
                .error
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Some(format!("{}: {}", r.id.as_deref().unwrap_or("?"), message))
        })
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(AppError::VectorStore(format!(
            "Weaviate rejected {} objects: {}",
            failures.len(),
            failures.join("; ")
        )))
    }
}
