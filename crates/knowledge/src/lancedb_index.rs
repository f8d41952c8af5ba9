//! LanceDB-backed vector index implementation.
//!
//! A local embedded index: one table per index name, with a `namespace`
//! column used as a prefilter on every query.

use crate::types::{IndexEntry, ScoredEntry};
use crate::vector_index::{cosine_similarity, metadata_object, rank, VectorIndex};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use ragchat_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// LanceDB-backed vector index.
pub struct LanceDbIndex {
    table: Table,
    embedding_dim: usize,
}

impl LanceDbIndex {
    /// Create or open a LanceDB index at the specified path.
    ///
    /// # Arguments
    /// * `db_path` - Directory path for the LanceDB database
    /// * `table_name` - Name of the table (the index name)
    /// * `embedding_dim` - Dimension of embedding vectors (e.g., 1536)
    pub async fn new(db_path: &Path, table_name: &str, embedding_dim: usize) -> AppResult<Self> {
        std::fs::create_dir_all(db_path).map_err(|e| {
            AppError::VectorStore(format!("Failed to create index directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy().to_string();
        let conn = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_names = conn
            .table_names()
            .execute()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to list tables: {}", e)))?;

        let table = if table_names.iter().any(|name| name == table_name) {
            conn.open_table(table_name)
                .execute()
                .await
                .map_err(|e| AppError::VectorStore(format!("Failed to open table: {}", e)))?
        } else {
            let schema = Self::create_schema(embedding_dim);
            let empty_batch = RecordBatch::new_empty(schema.clone());

            conn.create_table(
                table_name,
                RecordBatchIterator::new(vec![Ok(empty_batch)], schema),
            )
            .execute()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to create table: {}", e)))?
        };

        tracing::debug!("Initialized LanceDB index '{}' at {:?}", table_name, db_path);

        Ok(Self {
            table,
            embedding_dim,
        })
    }

    fn create_schema(embedding_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("namespace", DataType::Utf8, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("metadata", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    embedding_dim as i32,
                ),
                false,
            ),
        ]))
    }

    fn check_dimensions(&self, vector: &[f32]) -> AppResult<()> {
        if vector.len() != self.embedding_dim {
            return Err(AppError::VectorStore(format!(
                "Vector dimension mismatch: index has {}, got {}",
                self.embedding_dim,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Convert entries to a single Arrow RecordBatch.
    fn entries_to_batch(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<RecordBatch> {
        let schema = Self::create_schema(self.embedding_dim);

        let mut values = Vec::with_capacity(entries.len() * self.embedding_dim);
        let mut metadata = Vec::with_capacity(entries.len());
        for entry in entries {
            self.check_dimensions(&entry.vector)?;
            values.extend_from_slice(&entry.vector);
            metadata.push(serde_json::to_string(&entry.metadata)?);
        }

        let id_array = StringArray::from_iter_values(entries.iter().map(|e| e.id.as_str()));
        let namespace_array = StringArray::from_iter_values(entries.iter().map(|_| namespace));
        let text_array = StringArray::from_iter_values(entries.iter().map(|e| e.text.as_str()));
        let metadata_array = StringArray::from_iter_values(metadata.iter().map(String::as_str));
        let vector_array = FixedSizeListArray::new(
            Arc::new(Field::new("item", DataType::Float32, true)),
            self.embedding_dim as i32,
            Arc::new(Float32Array::from(values)),
            None,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(id_array),
                Arc::new(namespace_array),
                Arc::new(text_array),
                Arc::new(metadata_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| AppError::VectorStore(format!("Failed to create RecordBatch: {}", e)))
    }

    /// Convert one result row to a scored entry.
    fn row_to_entry(batch: &RecordBatch, row_idx: usize, query: &[f32]) -> AppResult<ScoredEntry> {
        let string_column = |name: &str| -> AppResult<String> {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .map(|c| c.value(row_idx).to_string())
                .ok_or_else(|| AppError::VectorStore(format!("Invalid {} column", name)))
        };

        let vectors = batch
            .column_by_name("vector")
            .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
            .ok_or_else(|| AppError::VectorStore("Invalid vector column".to_string()))?;
        let vector_ref = vectors.value(row_idx);
        let vector = vector_ref
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| AppError::VectorStore("Invalid vector values".to_string()))?;

        let metadata = metadata_object(serde_json::from_str(&string_column("metadata")?).ok());

        Ok(ScoredEntry {
            id: string_column("id")?,
            text: string_column("text")?,
            metadata,
            score: cosine_similarity(query, vector.values()),
        })
    }
}

/// SQL string literal for a LanceDB filter.
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait::async_trait]
impl VectorIndex for LanceDbIndex {
    fn backend_name(&self) -> &str {
        "lancedb"
    }

    async fn upsert(&self, namespace: &str, entries: &[IndexEntry]) -> AppResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let batch = self.entries_to_batch(namespace, entries)?;

        // Replace rows whose id is being written again
        let ids: Vec<String> = entries.iter().map(|e| sql_literal(&e.id)).collect();
        self.table
            .delete(&format!(
                "namespace = {} AND id IN ({})",
                sql_literal(namespace),
                ids.join(", ")
            ))
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to replace entries: {}", e)))?;

        let schema = batch.schema();
        self.table
            .add(RecordBatchIterator::new(vec![Ok(batch)], schema))
            .execute()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to add entries: {}", e)))?;

        tracing::debug!(
            "Inserted {} entries into LanceDB namespace '{}'",
            entries.len(),
            namespace
        );
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> AppResult<Vec<ScoredEntry>> {
        self.check_dimensions(vector)?;

        if self.count(namespace).await? == 0 {
            return Ok(Vec::new());
        }

        let batches = self
            .table
            .query()
            .nearest_to(vector.to_vec())
            .map_err(|e| AppError::VectorStore(format!("Failed to create query: {}", e)))?
            .distance_type(DistanceType::Cosine)
            .only_if(format!("namespace = {}", sql_literal(namespace)))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to execute search: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to collect results: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            for row_idx in 0..batch.num_rows() {
                hits.push(Self::row_to_entry(batch, row_idx, vector)?);
            }
        }

        Ok(rank(hits, top_k))
    }

    async fn count(&self, namespace: &str) -> AppResult<u64> {
        let count = self
            .table
            .count_rows(Some(format!("namespace = {}", sql_literal(namespace))))
            .await
            .map_err(|e| AppError::VectorStore(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }
}
