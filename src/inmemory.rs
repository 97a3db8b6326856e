//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] is a zero-dependency backend over a `HashMap`
//! protected by a `tokio::sync::RwLock`, suitable for development and
//! tests. Being process-local it is trivially strongly consistent.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, DocumentSummary, ScoredChunk};
use crate::error::Result;
use crate::store::VectorStore;

/// An in-memory [`VectorStore`] keyed by chunk key.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    chunks: RwLock<HashMap<String, Chunk>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
        let mut store = self.chunks.write().await;
        for chunk in chunks {
            store.insert(chunk.key.clone(), chunk.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        document: Option<&str>,
    ) -> Result<Vec<ScoredChunk>> {
        let store = self.chunks.read().await;
        let mut scored: Vec<ScoredChunk> = store
            .values()
            .filter(|chunk| document.is_none_or(|d| chunk.document == d))
            .map(|chunk| {
                let score = cosine_similarity(&chunk.embedding, embedding);
                let mut chunk = chunk.clone();
                chunk.embedding = Vec::new();
                ScoredChunk { chunk, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.key.cmp(&b.chunk.key))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete(&self, keys: &[&str]) -> Result<()> {
        let mut store = self.chunks.write().await;
        for key in keys {
            store.remove(*key);
        }
        Ok(())
    }

    async fn delete_by_document(&self, document: &str) -> Result<usize> {
        let mut store = self.chunks.write().await;
        let before = store.len();
        store.retain(|_, chunk| chunk.document != document);
        Ok(before - store.len())
    }

    async fn delete_all(&self) -> Result<usize> {
        let mut store = self.chunks.write().await;
        let count = store.len();
        store.clear();
        Ok(count)
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let store = self.chunks.read().await;
        let mut grouped: BTreeMap<&str, (usize, BTreeSet<u32>, Option<chrono::DateTime<chrono::Utc>>)> =
            BTreeMap::new();
        for chunk in store.values() {
            let entry = grouped.entry(&chunk.document).or_default();
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
                document: document.to_string(),
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
    use chrono::Utc;

    use super::*;
    use crate::document::chunk_key;

    fn chunk(document: &str, ordinal: usize, page: u32, embedding: Vec<f32>) -> Chunk {
        Chunk {
            key: chunk_key(document, ordinal),
            document: document.to_string(),
            page,
            page_end: None,
            ordinal,
            text: format!("chunk {ordinal} of {document}"),
            embedding,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_by_key() {
        let store = InMemoryVectorStore::new();
        let c = chunk("a.pdf", 0, 1, vec![1.0, 0.0]);
        store.upsert(&[c.clone()]).await.unwrap();
        store.upsert(&[c]).await.unwrap();

        let results = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 1);

        // Re-upserting with new content overwrites, never duplicates.
        let mut updated = chunk("a.pdf", 0, 1, vec![0.0, 1.0]);
        updated.text = "rewritten".to_string();
        store.upsert(&[updated]).await.unwrap();
        let results = store.query(&[0.0, 1.0], 10, None).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.text, "rewritten");
    }

    #[tokio::test]
    async fn query_orders_by_score_then_key_and_caps_top_k() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                chunk("a.pdf", 1, 1, vec![1.0, 0.0]),
                chunk("a.pdf", 0, 1, vec![1.0, 0.0]), // tie with ordinal 1
                chunk("a.pdf", 2, 1, vec![0.0, 1.0]),
                chunk("a.pdf", 3, 1, vec![0.7, 0.7]),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 3, None).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].chunk.key, "a.pdf_chunk_0");
        assert_eq!(results[1].chunk.key, "a.pdf_chunk_1");
        assert_eq!(results[2].chunk.key, "a.pdf_chunk_3");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        // Stored vectors do not travel back to the caller.
        assert!(results.iter().all(|r| r.chunk.embedding.is_empty()));
    }

    #[tokio::test]
    async fn query_filters_by_document() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                chunk("a.pdf", 0, 1, vec![1.0, 0.0]),
                chunk("b.pdf", 0, 1, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.query(&[1.0, 0.0], 10, Some("b.pdf")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document, "b.pdf");
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = InMemoryVectorStore::new();
        store.upsert(&[chunk("a.pdf", 0, 1, vec![1.0])]).await.unwrap();
        store.delete(&["a.pdf_chunk_0", "missing_key"]).await.unwrap();
        store.delete(&["a.pdf_chunk_0"]).await.unwrap();
        assert!(store.query(&[1.0], 10, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_by_document_is_immediately_visible() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                chunk("a.pdf", 0, 1, vec![1.0, 0.0]),
                chunk("a.pdf", 1, 2, vec![0.9, 0.1]),
                chunk("b.pdf", 0, 1, vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let deleted = store.delete_by_document("a.pdf").await.unwrap();
        assert_eq!(deleted, 2);

        // Strong consistency: a query right after the delete never sees
        // chunks of the deleted document.
        let results = store.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert!(results.iter().all(|r| r.chunk.document != "a.pdf"));

        let docs = store.list_documents().await.unwrap();
        assert!(docs.iter().all(|d| d.document != "a.pdf"));

        assert_eq!(store.delete_by_document("unknown.pdf").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_documents_groups_and_counts() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[
                chunk("b.pdf", 0, 1, vec![1.0]),
                chunk("a.pdf", 0, 1, vec![1.0]),
                chunk("a.pdf", 1, 1, vec![1.0]),
                chunk("a.pdf", 2, 2, vec![1.0]),
            ])
            .await
            .unwrap();

        let docs = store.list_documents().await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].document, "a.pdf");
        assert_eq!(docs[0].chunk_count, 3);
        assert_eq!(docs[0].pages, vec![1, 2]);
        assert_eq!(docs[0].page_count, 2);
        assert!(docs[0].first_indexed_at.is_some());
        assert_eq!(docs[1].document, "b.pdf");
        assert_eq!(docs[1].chunk_count, 1);
    }

    #[tokio::test]
    async fn delete_all_empties_the_index() {
        let store = InMemoryVectorStore::new();
        store
            .upsert(&[chunk("a.pdf", 0, 1, vec![1.0]), chunk("b.pdf", 0, 1, vec![1.0])])
            .await
            .unwrap();
        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.list_documents().await.unwrap().is_empty());
        assert_eq!(store.delete_all().await.unwrap(), 0);
    }
}
