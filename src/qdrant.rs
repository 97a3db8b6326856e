//! Qdrant vector store backend.
//!
//! This module is only available when the `qdrant` feature is enabled.
//! Writes are issued with `wait(true)` so they are fully applied before
//! the call returns, which preserves the store contract's read-after-write
//! guarantee. Listing and document-scoped deletion follow the
//! list-then-delete-by-keys shape so a deleted count can be reported.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointId,
    PointStruct, PointsIdsList, ScrollPointsBuilder, SearchPointsBuilder, UpsertPointsBuilder,
    Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use tracing::debug;
use uuid::Uuid;

use crate::document::{Chunk, DocumentSummary, ScoredChunk};
use crate::error::{RagError, Result};
use crate::store::VectorStore;

/// Page size for scroll-based listing.
const SCROLL_LIMIT: u32 = 500;

/// A [`VectorStore`] backed by [Qdrant](https://qdrant.tech/).
///
/// Chunk keys are strings like `report.pdf_chunk_3`, while Qdrant point
/// IDs must be UUIDs or integers; the store derives a deterministic
/// UUIDv5 from each key so upserts stay idempotent, and keeps the
/// original key in the payload.
pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    /// Create a new store connecting to the given URL and collection.
    pub fn new(url: &str, collection: impl Into<String>) -> Result<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| Self::unavailable("connect", e))?;
        Ok(Self { client, collection: collection.into() })
    }

    /// Create a new store from an existing client.
    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self { client, collection: collection.into() }
    }

    /// Ensure the backing collection exists with the given vector
    /// dimensionality. No-op when it already exists.
    pub async fn ensure_collection(&self, dimensions: usize) -> Result<()> {
        let collections = self
            .client
            .list_collections()
            .await
            .map_err(|e| Self::unavailable("list_collections", e))?;
        if collections.collections.iter().any(|c| c.name == self.collection) {
            debug!(collection = %self.collection, "collection already exists, skipping creation");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(&self.collection)
                    .vectors_config(VectorParamsBuilder::new(dimensions as u64, Distance::Cosine)),
            )
            .await
            .map_err(|e| Self::unavailable("create_collection", e))?;
        debug!(collection = %self.collection, dimensions, "created collection");
        Ok(())
    }

    fn unavailable(operation: &str, e: impl std::fmt::Display) -> RagError {
        RagError::StoreUnavailable { operation: operation.to_string(), message: e.to_string() }
    }

    /// Deterministic Qdrant point ID for a chunk key.
    fn point_id(key: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string()
    }

    fn extract_string(value: &QdrantValue) -> Option<String> {
        match &value.kind {
            Some(Kind::StringValue(s)) => Some(s.clone()),
            _ => None,
        }
    }

    fn extract_integer(value: &QdrantValue) -> Option<i64> {
        match &value.kind {
            Some(Kind::IntegerValue(n)) => Some(*n),
            _ => None,
        }
    }

    fn chunk_payload(chunk: &Chunk) -> Payload {
        let mut map = serde_json::Map::new();
        map.insert("key".to_string(), chunk.key.clone().into());
        map.insert("document".to_string(), chunk.document.clone().into());
        map.insert("page".to_string(), i64::from(chunk.page).into());
        if let Some(end) = chunk.page_end {
            map.insert("page_end".to_string(), i64::from(end).into());
        }
        map.insert("ordinal".to_string(), (chunk.ordinal as i64).into());
        map.insert("text".to_string(), chunk.text.clone().into());
        map.insert("created_at".to_string(), chunk.created_at.to_rfc3339().into());
        Payload::try_from(serde_json::Value::Object(map)).unwrap_or_default()
    }

    /// Rebuild a chunk (without its vector) from a point payload.
    fn chunk_from_payload(
        payload: &std::collections::HashMap<String, QdrantValue>,
    ) -> Chunk {
        let get_str =
            |field: &str| payload.get(field).and_then(Self::extract_string).unwrap_or_default();
        let get_int = |field: &str| payload.get(field).and_then(Self::extract_integer);

        Chunk {
            key: get_str("key"),
            document: get_str("document"),
            page: get_int("page").unwrap_or(1) as u32,
            page_end: get_int("page_end").map(|n| n as u32),
            ordinal: get_int("ordinal").unwrap_or(0) as usize,
            text: get_str("text"),
            embedding: Vec::new(),
            created_at: DateTime::parse_from_rfc3339(&get_str("created_at"))
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }
    }

    /// Scroll every point matching `filter`, returning payload-only chunks
    /// with their Qdrant point IDs.
    async fn scroll_all(&self, filter: Option<Filter>) -> Result<Vec<(PointId, Chunk)>> {
        let mut points = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(SCROLL_LIMIT)
                .with_payload(true);
            if let Some(filter) = filter.clone() {
                builder = builder.filter(filter);
            }
            if let Some(offset_id) = offset.take() {
                builder = builder.offset(offset_id);
            }

            let response =
                self.client.scroll(builder).await.map_err(|e| Self::unavailable("list", e))?;
            for point in response.result {
                let Some(id) = point.id.clone() else { continue };
                points.push((id, Self::chunk_from_payload(&point.payload)));
            }
            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }
        Ok(points)
    }

    async fn delete_points(&self, ids: Vec<PointId>) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let count = ids.len();
        self.client
            .delete_points(
                DeletePointsBuilder::new(&self.collection)
                    .points(PointsIdsList { ids })
                    .wait(true),
            )
            .await
            .map_err(|e| Self::unavailable("delete", e))?;
        Ok(count)
    }

    fn document_filter(document: &str) -> Filter {
        Filter::must([Condition::matches("document", document.to_string())])
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }

        let points: Vec<PointStruct> = chunks
            .iter()
            .map(|chunk| {
                PointStruct::new(
                    Self::point_id(&chunk.key),
                    chunk.embedding.clone(),
                    Self::chunk_payload(chunk),
                )
            })
            .collect();

        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map_err(|e| Self::unavailable("upsert", e))?;

        debug!(collection = %self.collection, count = chunks.len(), "upserted chunks");
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        document: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, embedding.to_vec(), top_k as u64)
                .with_payload(true);
        if let Some(document) = document {
            builder = builder.filter(Self::document_filter(document));
        }

        let response =
            self.client.search_points(builder).await.map_err(|e| Self::unavailable("query", e))?;

        let mut results: Vec<ScoredChunk> = response
            .result
            .into_iter()
            .map(|scored| ScoredChunk {
                chunk: Self::chunk_from_payload(&scored.payload),
                score: scored.score,
            })
            .collect();

        // Qdrant orders by score; re-sort to pin the key tie-break.
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.key.cmp(&b.chunk.key))
        });
        results.truncate(top_k);
        Ok(results)
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = keys.iter().map(|key| Self::point_id(key).into()).collect();
        self.delete_points(ids).await?;
        Ok(())
    }

    async fn delete_by_document(&self, document: &str) -> Result<usize> {
        let points = self.scroll_all(Some(Self::document_filter(document))).await?;
        let deleted =
            self.delete_points(points.into_iter().map(|(id, _)| id).collect()).await?;
        debug!(collection = %self.collection, document, deleted, "deleted document chunks");
        Ok(deleted)
    }

    async fn delete_all(&self) -> Result<usize> {
        let points = self.scroll_all(None).await?;
        let deleted = self.delete_points(points.into_iter().map(|(id, _)| id).collect()).await?;
        debug!(collection = %self.collection, deleted, "deleted all chunks");
        Ok(deleted)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let points = self.scroll_all(None).await?;

        let mut grouped: std::collections::BTreeMap<
            String,
            (usize, BTreeSet<u32>, Option<DateTime<Utc>>),
        > = std::collections::BTreeMap::new();
        for (_, chunk) in points {
            let entry = grouped.entry(chunk.document.clone()).or_default();
            entry.0 += 1;
            entry.1.insert(chunk.page);
            if let Some(end) = chunk.page_end {
                entry.1.insert(end);
            }
            entry.2 = match entry.2 {
                Some(earliest) => Some(earliest.min(chunk.created_at)),
                None => Some(chunk.created_at),
            };
        }

        Ok(grouped
            .into_iter()
            .map(|(document, (chunk_count, pages, first_indexed_at))| DocumentSummary {
                document,
                chunk_count,
                page_count: pages.len(),
                pages: pages.into_iter().collect(),
                first_indexed_at,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_ids_are_deterministic_per_key() {
        let a = QdrantVectorStore::point_id("doc.pdf_chunk_0");
        let b = QdrantVectorStore::point_id("doc.pdf_chunk_0");
        let c = QdrantVectorStore::point_id("doc.pdf_chunk_1");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn chunk_rebuilds_from_payload_fields() {
        let created_at = Utc::now();
        let mut map = std::collections::HashMap::new();
        map.insert("key".to_string(), QdrantValue::from("doc.pdf_chunk_2".to_string()));
        map.insert("document".to_string(), QdrantValue::from("doc.pdf".to_string()));
        map.insert("page".to_string(), QdrantValue::from(3i64));
        map.insert("page_end".to_string(), QdrantValue::from(4i64));
        map.insert("ordinal".to_string(), QdrantValue::from(2i64));
        map.insert("text".to_string(), QdrantValue::from("hello".to_string()));
        map.insert("created_at".to_string(), QdrantValue::from(created_at.to_rfc3339()));

        let restored = QdrantVectorStore::chunk_from_payload(&map);
        assert_eq!(restored.key, "doc.pdf_chunk_2");
        assert_eq!(restored.document, "doc.pdf");
        assert_eq!(restored.page, 3);
        assert_eq!(restored.page_end, Some(4));
        assert_eq!(restored.ordinal, 2);
        assert_eq!(restored.text, "hello");
        assert!(restored.embedding.is_empty());
        assert_eq!(restored.created_at.timestamp(), created_at.timestamp());
    }
}
